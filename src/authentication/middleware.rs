use warp::{reject::Rejection, Filter};

use crate::constants::SESSION_COOKIE;
use crate::error::HttpError;

use super::jwt::{verify_jwt_session, SessionData};

fn token_from_header(header: &str) -> Option<&str> {
    header
        .strip_prefix("Token ")
        .or_else(|| header.strip_prefix("Bearer "))
}

/* the session cookie wins over the Authorization header */
fn session_from_parts(
    cookie: Option<String>,
    header: Option<String>,
    secret: &[u8],
) -> Option<SessionData> {
    let token = cookie.or_else(|| {
        header
            .as_deref()
            .and_then(token_from_header)
            .map(str::to_string)
    })?;

    verify_jwt_session(&token, secret).ok().map(Into::into)
}

pub fn with_session(
    secret: String,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::cookie::optional::<String>(SESSION_COOKIE)
        .and(warp::header::optional::<String>("authorization"))
        .and_then(move |cookie: Option<String>, header: Option<String>| {
            let secret = secret.clone();
            async move {
                match session_from_parts(cookie, header, secret.as_bytes()) {
                    Some(session) => Ok(session),
                    None => Err(Rejection::from(HttpError::InvalidSession.new(
                        "Authentication credentials were not provided",
                    ))),
                }
            }
        })
}

pub fn with_possible_session(
    secret: String,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::cookie::optional::<String>(SESSION_COOKIE)
        .and(warp::header::optional::<String>("authorization"))
        .and_then(move |cookie: Option<String>, header: Option<String>| {
            let secret = secret.clone();
            async move {
                Ok::<Option<SessionData>, Rejection>(session_from_parts(
                    cookie,
                    header,
                    secret.as_bytes(),
                ))
            }
        })
}
