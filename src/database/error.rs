use thiserror::Error as ThisError;
use warp::reject::Rejection;

/* the single rejection payload surfaced to clients */
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("http error {code}: {}", info.as_deref().unwrap_or("-"))]
pub struct Error {
    pub code: u16,
    pub info: Option<String>,
}

impl warp::reject::Reject for Error {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpError {
    InvalidRequest,
    InvalidSession,
    Unauthorized,
    NotFound,
    InternalServerError,
}

impl HttpError {
    pub fn code(self) -> u16 {
        match self {
            HttpError::InvalidRequest => 400,
            HttpError::InvalidSession => 401,
            HttpError::Unauthorized => 403,
            HttpError::NotFound => 404,
            HttpError::InternalServerError => 500,
        }
    }

    pub fn new(self, info: &str) -> Error {
        Error {
            code: self.code(),
            info: Some(info.to_string()),
        }
    }

    pub fn default(self) -> Error {
        Error {
            code: self.code(),
            info: None,
        }
    }
}

#[derive(Debug, ThisError)]
#[error("{info}")]
pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::RowNotFound => Self::new("Row not found".to_string()),
            sqlx::Error::PoolTimedOut => Self::new("Pool timed out".to_string()),
            sqlx::Error::PoolClosed => Self::new("Pool closed".to_string()),
            sqlx::Error::WorkerCrashed => Self::new("Worker crashed".to_string()),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnNotFound(column) => {
                Self::new(format!("Column not found: {column}"))
            }
            other => Self::new(format!("{other}")),
        }
    }
}

impl Into<Error> for QueryError {
    fn into(self) -> Error {
        log::error!("query failed: {}", self.info);
        HttpError::InternalServerError.new(&self.info)
    }
}

#[derive(Debug, ThisError)]
#[error("({info})")]
pub struct TypeError {
    info: String,
}

impl TypeError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl Into<Error> for TypeError {
    fn into(self) -> Error {
        HttpError::InvalidRequest.new(&self.info)
    }
}

impl Into<Rejection> for TypeError {
    fn into(self) -> Rejection {
        HttpError::InvalidRequest.new(&self.info).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_codes() {
        assert_eq!(HttpError::InvalidRequest.code(), 400);
        assert_eq!(HttpError::InvalidSession.code(), 401);
        assert_eq!(HttpError::Unauthorized.code(), 403);
        assert_eq!(HttpError::NotFound.code(), 404);
        assert_eq!(HttpError::InternalServerError.code(), 500);
    }

    #[test]
    fn test_new_carries_message() {
        let error = HttpError::InvalidRequest.new("Tags cannot repeat");
        assert_eq!(error.code, 400);
        assert_eq!(error.info.as_deref(), Some("Tags cannot repeat"));
    }

    #[test]
    fn test_default_has_no_message() {
        let error = HttpError::Unauthorized.default();
        assert_eq!(error.code, 403);
        assert!(error.info.is_none());
    }

    #[test]
    fn test_type_error_converts_to_invalid_request() {
        let error: Error = TypeError::new("Invalid author id").into();
        assert_eq!(error.code, 400);
        assert_eq!(error.info.as_deref(), Some("Invalid author id"));
    }

    #[test]
    fn test_query_error_converts_to_server_error() {
        let error: Error = QueryError::from(sqlx::Error::RowNotFound).into();
        assert_eq!(error.code, 500);
    }

    /* the conversion chain every action uses to propagate query failures */
    fn query(result: Result<i32, sqlx::Error>) -> Result<i32, Error> {
        let value = result.map_err(|e| QueryError::from(e).into())?;
        Ok(value)
    }

    #[test]
    fn test_query_errors_convert_through_map_err() {
        let error = query(Err(sqlx::Error::PoolClosed)).unwrap_err();
        assert_eq!(error.code, 500);
        assert_eq!(error.info.as_deref(), Some("Pool closed"));

        assert_eq!(query(Ok(7)).unwrap(), 7);
    }

    #[test]
    fn test_error_rejections_carry_the_error_payload() {
        let rejection = Rejection::from(HttpError::NotFound.default());

        let error = rejection.find::<Error>().unwrap();
        assert_eq!(error.code, 404);
        assert!(error.info.is_none());
    }
}
