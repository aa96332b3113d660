use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::warn;

use vista_types::api::Claims;

/// Password hashing and bearer token signing.
pub struct Credentials {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    ttl: Duration,
}

impl Credentials {
    pub fn new(secret: &str, algorithm: Algorithm, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            algorithm,
            ttl,
        }
    }

    /// Argon2id with a fresh random salt, in PHC string format.
    pub fn hash_password(&self, password: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
            .to_string();
        Ok(hash)
    }

    pub fn verify_password(&self, password: &str, digest: &str) -> bool {
        let parsed = match PasswordHash::new(digest) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Stored password hash is unreadable: {}", e);
                return false;
            }
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// Sign a token for `subject` valid for the configured lifetime.
    pub fn issue_token(&self, subject: &str) -> anyhow::Result<String> {
        self.issue_token_with_ttl(subject, self.ttl)
    }

    pub fn issue_token_with_ttl(&self, subject: &str, ttl: Duration) -> anyhow::Result<String> {
        let claims = Claims {
            sub: subject.to_string(),
            exp: (Utc::now() + ttl).timestamp().max(0) as usize,
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding)?;
        Ok(token)
    }

    /// Verify signature, algorithm and expiry.
    pub fn decode_token(&self, token: &str) -> jsonwebtoken::errors::Result<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::new(self.algorithm))
            .map(|data| data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials::new("test-secret", Algorithm::HS256, Duration::minutes(30))
    }

    #[test]
    fn hash_then_verify() {
        let creds = credentials();
        let digest = creds.hash_password("hunter22").unwrap();
        assert_ne!(digest, "hunter22");
        assert!(creds.verify_password("hunter22", &digest));
        assert!(!creds.verify_password("hunter23", &digest));
    }

    #[test]
    fn garbage_digest_does_not_verify() {
        assert!(!credentials().verify_password("pw", "not-a-phc-string"));
    }

    #[test]
    fn token_subject_round_trips() {
        let creds = credentials();
        let token = creds.issue_token("ada@example.com").unwrap();
        let claims = creds.decode_token(&token).unwrap();
        assert_eq!(claims.sub, "ada@example.com");
        assert!(claims.exp as i64 > Utc::now().timestamp());
    }

    #[test]
    fn expired_token_is_rejected() {
        let creds = credentials();
        let token = creds
            .issue_token_with_ttl("ada@example.com", Duration::minutes(-10))
            .unwrap();
        assert!(creds.decode_token(&token).is_err());
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let other = Credentials::new("other-secret", Algorithm::HS256, Duration::minutes(30));
        let token = other.issue_token("ada@example.com").unwrap();
        assert!(credentials().decode_token(&token).is_err());
    }

    #[test]
    fn algorithm_mismatch_is_rejected() {
        let hs512 = Credentials::new("test-secret", Algorithm::HS512, Duration::minutes(30));
        let token = hs512.issue_token("ada@example.com").unwrap();
        assert!(credentials().decode_token(&token).is_err());
        assert!(hs512.decode_token(&token).is_ok());
    }
}
