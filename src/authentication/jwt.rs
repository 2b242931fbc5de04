use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::constants::SESSION_LIFETIME_HOURS;
use crate::database::schema::User;
use crate::error::{Error, HttpError};
use crate::schema::UserRole;

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: i32,
    pub username: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: i32, username: String, role: UserRole) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(SESSION_LIFETIME_HOURS)).timestamp();

        Self {
            user_id: id,
            username,
            role,
            iat,
            exp,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: i32,
    pub username: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), Error> {
        if !action.authenticate(self) {
            return Err(
                HttpError::Unauthorized.new("You don't have permission to perform this action")
            );
        }
        Ok(())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(data: JwtSessionData) -> Self {
        Self {
            user_id: data.user_id,
            username: data.username,
            is_admin: data.role == UserRole::Admin,
            role: data.role,
        }
    }
}

pub fn generate_jwt_session(user: &User, secret: &[u8]) -> Result<String, Error> {
    let key: Hmac<Sha256> = Hmac::new_from_slice(secret)
        .map_err(|_| HttpError::InternalServerError.new("Invalid session signing key"))?;
    let claims = JwtSessionData::new(user.id, user.username.to_owned(), user.role.to_owned());

    claims
        .sign_with_key(&key)
        .map_err(|_| HttpError::InternalServerError.new("Failed to sign session token"))
}

pub fn verify_jwt_session(token: &str, secret: &[u8]) -> Result<JwtSessionData, Error> {
    let key: Hmac<Sha256> = Hmac::new_from_slice(secret)
        .map_err(|_| HttpError::InternalServerError.new("Invalid session signing key"))?;

    token
        .verify_with_key(&key)
        .map_err(|_| HttpError::InvalidSession.new("Invalid session; Invalid token"))
        .map(|session: JwtSessionData| {
            let now = Local::now().timestamp();

            if (session.exp - now).is_negative() {
                return Err(HttpError::InvalidSession.new("Invalid session; Token expired"));
            }
            Ok(session)
        })?
}
