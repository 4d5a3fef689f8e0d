//! Token service: signed session tokens plus one-time password-reset tokens.
//!
//! Session tokens are HS256 JWTs carrying the user id and username, valid for
//! 7 days; expiry is the only invalidation mechanism. Reset tokens are random
//! values whose plaintext is only ever emailed — the store keeps a SHA-256
//! digest and an expiry 10 minutes out.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use plaza_types::api::Claims;

pub const SESSION_TTL_DAYS: i64 = 7;
pub const RESET_TTL_MINUTES: i64 = 10;

pub fn create_session_token(secret: &str, user_id: Uuid, username: &str) -> Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (Utc::now() + Duration::days(SESSION_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn decode_session_token(secret: &str, token: &str) -> Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(data.claims)
}

pub struct ResetToken {
    /// Emailed to the user, never persisted.
    pub plain: String,
    /// Stored on the user record.
    pub hash: String,
    pub expires: DateTime<Utc>,
}

pub fn issue_reset_token() -> ResetToken {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    let plain = hex::encode(bytes);

    ResetToken {
        hash: hash_reset_token(&plain),
        plain,
        expires: Utc::now() + Duration::minutes(RESET_TTL_MINUTES),
    }
}

/// Deterministic one-way hash; verification recomputes this over the supplied
/// plaintext and looks the digest up in the store.
pub fn hash_reset_token(plain: &str) -> String {
    hex::encode(Sha256::digest(plain.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_token_round_trips_identity() {
        let user_id = Uuid::new_v4();
        let token = create_session_token("secret", user_id, "alice").unwrap();

        let claims = decode_session_token("secret", &token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.username, "alice");
        assert!(claims.exp > Utc::now().timestamp() as usize);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_session_token("secret", Uuid::new_v4(), "alice").unwrap();
        assert!(decode_session_token("other-secret", &token).is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(decode_session_token("secret", "not-a-jwt").is_err());
    }

    #[test]
    fn reset_token_hash_is_deterministic_and_one_way() {
        let issued = issue_reset_token();
        assert_eq!(issued.plain.len(), 64);
        assert_eq!(issued.hash, hash_reset_token(&issued.plain));
        assert_ne!(issued.hash, issued.plain);
        assert!(issued.expires > Utc::now());
    }

    #[test]
    fn reset_tokens_are_unique() {
        let a = issue_reset_token();
        let b = issue_reset_token();
        assert_ne!(a.plain, b.plain);
        assert_ne!(a.hash, b.hash);
    }
}
