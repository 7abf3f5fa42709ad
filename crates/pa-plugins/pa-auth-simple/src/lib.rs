//! # pa-auth-simple
//!
//! Argon2-based implementation of `AuthProvider`.
//! Handles password hashing, signed bearer tokens and the admin credential check.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use hmac::digest::Key;
use hmac::{Hmac, Mac};
use pa_core::error::{AppError, Result};
use pa_core::traits::AuthProvider;
use sha2::{Digest, Sha256};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Lifetime of an issued token unless configured otherwise.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

pub struct SimpleAuthProvider {
    /// HMAC keyed with the token secret; cloned for every signature
    signer: HmacSha256,
    /// Argon2 hash of the admin credential; `None` disables admin endpoints
    admin_hash: Option<String>,
    token_ttl: Duration,
}

impl SimpleAuthProvider {
    /// Accepts the token secret and the admin hash (e.g., from configuration)
    pub fn new(token_secret: &str, admin_hash: Option<String>) -> Self {
        if admin_hash.is_none() {
            log::warn!("no admin credential configured: admin endpoints will reject every request");
        }
        // SHA-256 of the secret, zero padded to the block size, is a valid HMAC key of any input.
        let mut key = Key::<HmacSha256>::default();
        key[..32].copy_from_slice(&Sha256::digest(token_secret.as_bytes()));

        Self {
            signer: <HmacSha256 as Mac>::new(&key),
            admin_hash,
            token_ttl: Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
        }
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    fn keyed(&self, payload: &str) -> HmacSha256 {
        let mut mac = self.signer.clone();
        mac.update(payload.as_bytes());
        mac
    }

    fn sign(&self, payload: &str) -> String {
        hex::encode(self.keyed(payload).finalize().into_bytes())
    }

    /// Constant-time signature check.
    fn verify(&self, payload: &str, signature: &str) -> bool {
        match hex::decode(signature) {
            Ok(raw) => self.keyed(payload).verify_slice(&raw).is_ok(),
            Err(_) => false,
        }
    }
}

/// Stand-alone argon2 hashing, used to produce the configured admin hash.
pub fn hash_secret(secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(AppError::internal)
}

fn verify_secret(secret: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(p) => p,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed_hash)
        .is_ok()
}

#[async_trait]
impl AuthProvider for SimpleAuthProvider {
    fn hash_password(&self, password: &str) -> Result<String> {
        hash_secret(password)
    }

    /// Verifies a password against a stored PHC-format Argon2 hash.
    fn verify_password(&self, password: &str, hash: &str) -> bool {
        verify_secret(password, hash)
    }

    /// Token format: base64url("<user id>:<issued at, unix seconds>:<hex hmac-sha256>").
    fn issue_token(&self, user_id: Uuid) -> String {
        let payload = format!("{user_id}:{}", Utc::now().timestamp());
        URL_SAFE_NO_PAD.encode(format!("{payload}:{}", self.sign(&payload)))
    }

    fn authenticate(&self, token: &str) -> Option<Uuid> {
        let decoded = URL_SAFE_NO_PAD.decode(token.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (payload, signature) = decoded.rsplit_once(':')?;
        if !self.verify(payload, signature) {
            return None;
        }

        let (id, issued_at) = payload.split_once(':')?;
        let issued_at: i64 = issued_at.parse().ok()?;
        if Utc::now().timestamp() >= issued_at.saturating_add(self.token_ttl.num_seconds()) {
            log::debug!("expired token for user {id}");
            return None;
        }
        Uuid::parse_str(id).ok()
    }

    async fn verify_admin(&self, credential: &str) -> bool {
        match &self.admin_hash {
            Some(hash) => verify_secret(credential, hash),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_round_trip() {
        let auth = SimpleAuthProvider::new("secret", None);
        let hash = auth.hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(auth.verify_password("hunter22", &hash));
        assert!(!auth.verify_password("hunter23", &hash));
        assert!(!auth.verify_password("hunter22", "not a hash"));
    }

    #[test]
    fn test_token_identifies_user() {
        let auth = SimpleAuthProvider::new("secret", None);
        let user = Uuid::new_v4();
        let token = auth.issue_token(user);
        assert_eq!(auth.authenticate(&token), Some(user));
    }

    #[test]
    fn test_foreign_or_forged_tokens_are_rejected() {
        let auth = SimpleAuthProvider::new("secret", None);
        let other = SimpleAuthProvider::new("other secret", None);
        let user = Uuid::new_v4();

        assert_eq!(auth.authenticate(&other.issue_token(user)), None);
        let issued = Utc::now().timestamp();
        let forged = URL_SAFE_NO_PAD.encode(format!("{user}:{issued}:{}", "0".repeat(64)));
        assert_eq!(auth.authenticate(&forged), None);
        assert_eq!(auth.authenticate("garbage!"), None);
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let auth = SimpleAuthProvider::new("secret", None);
        let token = auth.issue_token(Uuid::new_v4());
        let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(&token).unwrap()).unwrap();
        let (_, rest) = decoded.split_once(':').unwrap();

        let swapped = URL_SAFE_NO_PAD.encode(format!("{}:{rest}", Uuid::new_v4()));
        assert_eq!(auth.authenticate(&swapped), None);
    }

    #[test]
    fn test_signature_is_full_hmac_sha256() {
        let auth = SimpleAuthProvider::new("secret", None);
        let payload = "user:0";
        let signature = auth.sign(payload);
        assert_eq!(signature.len(), 64);
        assert!(auth.verify(payload, &signature));
        assert!(!auth.verify(payload, &signature[..32]));
        assert!(!auth.verify("user:1", &signature));
        assert!(!auth.verify(payload, "not hex"));
    }

    #[test]
    fn test_tokens_expire() {
        let user = Uuid::new_v4();
        let short = SimpleAuthProvider::new("secret", None).with_token_ttl(Duration::zero());
        assert_eq!(short.authenticate(&short.issue_token(user)), None);

        let long = SimpleAuthProvider::new("secret", None).with_token_ttl(Duration::hours(1));
        assert_eq!(long.authenticate(&long.issue_token(user)), Some(user));

        // a token that claims to be from two hours ago is past a one hour ttl
        let payload = format!("{user}:{}", Utc::now().timestamp() - 7200);
        let stale = URL_SAFE_NO_PAD.encode(format!("{payload}:{}", long.sign(&payload)));
        assert_eq!(long.authenticate(&stale), None);
    }

    #[tokio::test]
    async fn test_admin_credential() {
        let hash = hash_secret("let-me-in").unwrap();
        let auth = SimpleAuthProvider::new("secret", Some(hash));
        assert!(auth.verify_admin("let-me-in").await);
        assert!(!auth.verify_admin("let-me-out").await);

        let locked = SimpleAuthProvider::new("secret", None);
        assert!(!locked.verify_admin("let-me-in").await);
    }
}
