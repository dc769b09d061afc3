use rand::Rng;
use time::{Duration, OffsetDateTime};

use crate::auth::repo::UserStore;
use crate::auth::repo_types::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpOutcome {
    Valid,
    NotFound,
    Mismatch,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneTimeCode {
    pub code: String,
    pub expires_at: OffsetDateTime,
}

/// Generates and checks six-digit verification codes.
///
/// The issuer never clears a code itself: whoever acts on a `Valid` outcome
/// performs the clear together with its own state transition.
#[derive(Debug, Clone)]
pub struct OtpIssuer {
    ttl: Duration,
}

impl OtpIssuer {
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    pub fn ttl_minutes(&self) -> i64 {
        self.ttl.whole_minutes().max(1)
    }

    pub fn generate(&self, now: OffsetDateTime) -> OneTimeCode {
        let n: u32 = rand::thread_rng().gen_range(100_000..=999_999);
        OneTimeCode {
            code: n.to_string(),
            expires_at: now + self.ttl,
        }
    }

    /// Generate a code and attach it to the record for `email`, creating the record if absent.
    pub async fn issue(
        &self,
        store: &dyn UserStore,
        email: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<(User, OneTimeCode)> {
        let otp = self.generate(now);
        let user = store.upsert_otp(email, &otp.code, otp.expires_at).await?;
        Ok((user, otp))
    }

    pub fn validate(&self, user: &User, submitted: &str, now: OffsetDateTime) -> OtpOutcome {
        let (Some(code), Some(expires_at)) = (&user.otp, user.otp_expires_at) else {
            return OtpOutcome::NotFound;
        };
        if code != submitted {
            return OtpOutcome::Mismatch;
        }
        if now > expires_at {
            return OtpOutcome::Expired;
        }
        OtpOutcome::Valid
    }
}
