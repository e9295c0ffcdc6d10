use bcrypt::{hash, verify};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::models::Identity;

/// Minimum password length accepted at sign-up.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub uid: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: i64,
}

impl UserRecord {
    pub fn identity(&self) -> Identity {
        Identity {
            uid: self.uid.clone(),
            email: self.email.clone(),
        }
    }
}

/// Claims of the persisted session token.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SessionClaims {
    pub sub: String, // uid
    pub email: String,
    pub exp: u64,
}

/// Lower-case and trim an email so lookups are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, StoreError> {
    Ok(hash(password, cost)?)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, StoreError> {
    Ok(verify(password, hash)?)
}

pub fn create_session_token(identity: &Identity, secret: &str, ttl_secs: u64) -> Result<String, StoreError> {
    let exp = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default() + ttl_secs;
    let claims = SessionClaims {
        sub: identity.uid.clone(),
        email: identity.email.clone(),
        exp,
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

/// Decode a session token. Expired or tampered tokens are errors.
pub fn validate_session_token(token: &str, secret: &str) -> Result<Identity, StoreError> {
    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(Identity {
        uid: data.claims.sub,
        email: data.claims.email,
    })
}
