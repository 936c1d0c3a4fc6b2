//! HMAC-SHA256 request signing for the OKX v5 API.
//!
//! The prehash string is `timestamp + METHOD + requestPath + body`, where
//! `requestPath` includes the query string. The signature is base64-encoded.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;

use super::error::OkxError;
use crate::config::Credentials;

type HmacSha256 = Hmac<Sha256>;

/// REST timestamp format, e.g. `2020-12-08T09:08:57.715Z`
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

pub fn sign(
    secret: &str,
    timestamp: &str,
    method: &str,
    request_path: &str,
    body: &str,
) -> Result<String, OkxError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| OkxError::Signing(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(method.as_bytes());
    mac.update(request_path.as_bytes());
    mac.update(body.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Private-channel login frame. WebSocket logins sign unix seconds.
pub fn login_payload(credentials: &Credentials, now: DateTime<Utc>) -> Result<Value, OkxError> {
    let ts = now.timestamp().to_string();
    let sign = sign(&credentials.secret_key, &ts, "GET", "/users/self/verify", "")?;
    Ok(json!({
        "op": "login",
        "args": [{
            "apiKey": credentials.api_key,
            "passphrase": credentials.passphrase,
            "timestamp": ts,
            "sign": sign,
        }]
    }))
}
