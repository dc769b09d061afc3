use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::config::GoogleConfig;

/// Identity asserted by the external provider, after verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaim {
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("invalid assertion: {0}")]
    Invalid(String),
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, raw_token: &str) -> Result<IdentityClaim, VerifyError>;
}

/// Subset of the tokeninfo payload. Google encodes numbers and booleans as strings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TokenInfo {
    aud: Option<String>,
    email: Option<String>,
    email_verified: Option<Value>,
    exp: Option<Value>,
    name: Option<String>,
    picture: Option<String>,
}

fn as_bool(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true",
        _ => false,
    }
}

fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn check_token_info(
    info: TokenInfo,
    client_id: &str,
    now: OffsetDateTime,
) -> Result<IdentityClaim, VerifyError> {
    if client_id.is_empty() || info.aud.as_deref() != Some(client_id) {
        return Err(VerifyError::Invalid("audience mismatch".into()));
    }
    let exp = info.exp.as_ref().and_then(as_i64).unwrap_or(0);
    if exp <= now.unix_timestamp() {
        return Err(VerifyError::Invalid("token expired".into()));
    }
    if !info.email_verified.as_ref().is_some_and(as_bool) {
        return Err(VerifyError::Invalid("email not verified".into()));
    }
    let email = info
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| VerifyError::Invalid("missing email".into()))?;
    let name = info.name.unwrap_or_else(|| {
        email
            .split('@')
            .next()
            .unwrap_or_default()
            .to_string()
    });
    Ok(IdentityClaim {
        email,
        name,
        picture: info.picture,
    })
}

/// Verifies Google ID tokens against the tokeninfo endpoint for one client id.
pub struct GoogleVerifier {
    client: reqwest::Client,
    tokeninfo_url: String,
    client_id: String,
}

impl GoogleVerifier {
    pub fn new(cfg: &GoogleConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build google http client")?;
        Ok(Self {
            client,
            tokeninfo_url: cfg.tokeninfo_url.clone(),
            client_id: cfg.client_id.clone(),
        })
    }
}

#[async_trait]
impl IdentityVerifier for GoogleVerifier {
    async fn verify(&self, raw_token: &str) -> Result<IdentityClaim, VerifyError> {
        if raw_token.trim().is_empty() {
            return Err(VerifyError::Invalid("empty token".into()));
        }
        let resp = self
            .client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", raw_token)])
            .send()
            .await
            .context("google tokeninfo request")?;

        let status = resp.status();
        if status.is_client_error() {
            warn!(%status, "google rejected id token");
            return Err(VerifyError::Invalid(format!("tokeninfo status {status}")));
        }
        if !status.is_success() {
            return Err(VerifyError::Transport(anyhow::anyhow!(
                "google tokeninfo unavailable (status={status})"
            )));
        }
        let info: TokenInfo = resp.json().await.context("decode tokeninfo")?;
        let claim = check_token_info(info, &self.client_id, OffsetDateTime::now_utc())?;
        debug!(email = %claim.email, "google id token verified");
        Ok(claim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn info(v: Value) -> TokenInfo {
        serde_json::from_value(v).unwrap()
    }

    fn future_exp() -> String {
        (OffsetDateTime::now_utc().unix_timestamp() + 600).to_string()
    }

    #[test]
    fn accepts_verified_token_for_our_audience() {
        let claim = check_token_info(
            info(json!({
                "aud": "client-1",
                "email": "ada@gmail.com",
                "email_verified": "true",
                "exp": future_exp(),
                "name": "Ada Lovelace",
                "picture": "https://pics/ada.png"
            })),
            "client-1",
            OffsetDateTime::now_utc(),
        )
        .unwrap();
        assert_eq!(claim.email, "ada@gmail.com");
        assert_eq!(claim.name, "Ada Lovelace");
        assert_eq!(claim.picture.as_deref(), Some("https://pics/ada.png"));
    }

    #[test]
    fn rejects_other_audience() {
        let err = check_token_info(
            info(json!({
                "aud": "someone-else",
                "email": "ada@gmail.com",
                "email_verified": true,
                "exp": future_exp()
            })),
            "client-1",
            OffsetDateTime::now_utc(),
        )
        .unwrap_err();
        assert!(matches!(err, VerifyError::Invalid(_)));
    }

    #[test]
    fn rejects_expired_or_unverified() {
        let now = OffsetDateTime::now_utc();
        let expired = check_token_info(
            info(json!({
                "aud": "c", "email": "a@b.com", "email_verified": "true",
                "exp": (now.unix_timestamp() - 1).to_string()
            })),
            "c",
            now,
        );
        assert!(matches!(expired, Err(VerifyError::Invalid(_))));

        let unverified = check_token_info(
            info(json!({
                "aud": "c", "email": "a@b.com", "email_verified": "false",
                "exp": future_exp()
            })),
            "c",
            now,
        );
        assert!(matches!(unverified, Err(VerifyError::Invalid(_))));
    }

    #[test]
    fn empty_client_id_rejects_everything() {
        let err = check_token_info(
            info(json!({"aud": "", "email": "a@b.com", "email_verified": "true", "exp": future_exp()})),
            "",
            OffsetDateTime::now_utc(),
        );
        assert!(matches!(err, Err(VerifyError::Invalid(_))));
    }

    #[test]
    fn name_falls_back_to_local_part() {
        let claim = check_token_info(
            info(json!({"aud": "c", "email": "grace@navy.mil", "email_verified": true, "exp": future_exp()})),
            "c",
            OffsetDateTime::now_utc(),
        )
        .unwrap();
        assert_eq!(claim.name, "grace");
    }
}
