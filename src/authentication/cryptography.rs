use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::{Error, HttpError};

pub fn hash_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| HttpError::InternalServerError.new("Failed to hash password"))
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, Error> {
    let argon2 = Argon2::default();
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|_| HttpError::InternalServerError.new("Stored password hash is malformed"))?;

    Ok(argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let hash = hash_password("hunter22").unwrap();

        assert_ne!(hash, "hunter22");
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn test_hashing_is_salted() {
        let first = hash_password("hunter22").unwrap();
        let second = hash_password("hunter22").unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(verify_password("hunter22", "not-a-hash").is_err());
    }
}
