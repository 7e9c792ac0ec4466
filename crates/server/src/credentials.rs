//! Bearer credential verification.
//!
//! A credential is `base64url(payload).base64url(tag)` where the payload is
//! JSON `{ "sub": ..., "exp": <unix seconds> }` and the tag is HMAC-SHA256 of
//! the encoded payload under the server secret.
//!
//! Secret resolution: `--auth-secret` / `THREADLINE_AUTH_SECRET` (base64) →
//! `<data_dir>/auth-secret` (raw bytes) → generated on first start.

use std::fs::{self, OpenOptions};
use std::io::Write as IoWrite;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use base64::engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD as BASE64URL};
use base64::Engine;
use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

const SECRET_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Malformed credential")]
    Malformed,

    #[error("Credential signature mismatch")]
    BadSignature,

    #[error("Credential expired")]
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    /// Unix seconds
    pub exp: i64,
}

pub struct Credentials {
    key: hmac::Key,
}

impl Credentials {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
        }
    }

    /// Check signature first, then expiry against `now_secs`.
    pub fn verify(&self, token: &str, now_secs: i64) -> Result<Claims, AuthError> {
        let (payload_b64, tag_b64) = token.trim().split_once('.').ok_or(AuthError::Malformed)?;
        let tag = BASE64URL
            .decode(tag_b64)
            .map_err(|_| AuthError::Malformed)?;

        hmac::verify(&self.key, payload_b64.as_bytes(), &tag)
            .map_err(|_| AuthError::BadSignature)?;

        let payload = BASE64URL
            .decode(payload_b64)
            .map_err(|_| AuthError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| AuthError::Malformed)?;

        if claims.exp <= now_secs {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }

    /// Sign `claims` into a credential string.
    pub fn issue(&self, claims: &Claims) -> String {
        // Claims always serialize: two plain fields.
        let payload = serde_json::to_vec(claims).unwrap_or_default();
        let payload_b64 = BASE64URL.encode(payload);
        let tag = hmac::sign(&self.key, payload_b64.as_bytes());
        format!("{payload_b64}.{}", BASE64URL.encode(tag.as_ref()))
    }
}

/// Resolve the server secret, generating and persisting one if needed.
pub fn load_or_create_secret(explicit_b64: Option<&str>, path: &Path) -> anyhow::Result<Vec<u8>> {
    if let Some(encoded) = explicit_b64.map(str::trim).filter(|s| !s.is_empty()) {
        let secret = BASE64.decode(encoded)?;
        anyhow::ensure!(
            secret.len() >= 16,
            "auth secret must decode to at least 16 bytes, got {}",
            secret.len()
        );
        return Ok(secret);
    }

    match fs::read(path) {
        Ok(bytes) if bytes.len() == SECRET_LEN => return Ok(bytes),
        Ok(bytes) => anyhow::bail!(
            "auth secret file {} has {} bytes, expected {SECRET_LEN}",
            path.display(),
            bytes.len()
        ),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let mut secret = [0u8; SECRET_LEN];
    SystemRandom::new()
        .fill(&mut secret)
        .map_err(|_| anyhow::anyhow!("failed to generate auth secret"))?;

    // Created 0600 in one step; a concurrent creator wins and we read theirs.
    match OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
    {
        Ok(mut file) => file.write_all(&secret)?,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(fs::read(path)?),
        Err(e) => return Err(e.into()),
    }

    info!(
        component = "credentials",
        event = "credentials.secret_generated",
        path = %path.display(),
        "Generated auth secret"
    );
    Ok(secret.to_vec())
}
