use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{auth::claims::Claims, config::JwtConfig, state::AppState};

/// Signs and validates stateless session tokens.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::from_secs((cfg.ttl_minutes.max(0) as u64) * 60),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn sign(&self, user_id: Uuid) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        // An elapsed `exp` fails immediately.
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::from(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 60,
            cookie_secure: false,
        })
    }

    #[test]
    fn sign_and_verify_session_token() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let user_id = Uuid::new_v4();
        let token = keys.sign(user_id).expect("sign");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good_keys = make_keys("same-secret", "good-iss", "good-aud");
        let bad_keys = make_keys("same-secret", "bad-iss", "bad-aud");
        let token = good_keys.sign(Uuid::new_v4()).expect("sign");
        assert!(bad_keys.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_foreign_signature() {
        let a = make_keys("secret-a", "iss", "aud");
        let b = make_keys("secret-b", "iss", "aud");
        let token = a.sign(Uuid::new_v4()).expect("sign");
        assert!(b.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_expired_token() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let past = OffsetDateTime::now_utc() - TimeDuration::hours(2);
        let claims = Claims {
            sub: Uuid::new_v4(),
            iat: past.unix_timestamp() as usize,
            exp: (past + TimeDuration::hours(1)).unix_timestamp() as usize,
            iss: "iss".into(),
            aud: "aud".into(),
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn token_expired_one_second_ago_is_rejected() {
        let keys = make_keys("s3cr3t", "iss", "aud");
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: Uuid::new_v4(),
            iat: (now - TimeDuration::minutes(5)).unix_timestamp() as usize,
            exp: (now - TimeDuration::seconds(1)).unix_timestamp() as usize,
            iss: "iss".into(),
            aud: "aud".into(),
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).unwrap();
        assert!(keys.verify(&token).is_err());
    }
}
