use std::sync::Arc;
use std::time::Duration;

use crate::auth::google::{GoogleVerifier, IdentityVerifier};
use crate::auth::otp::OtpIssuer;
use crate::auth::password::SecretHasher;
use crate::auth::repo::{PgUserStore, UserStore};
use crate::config::AppConfig;
use crate::db;
use crate::mailer::{HttpMailer, LogMailer, Mailer};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn UserStore>,
    pub mailer: Arc<dyn Mailer>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub hasher: SecretHasher,
    pub otp: OtpIssuer,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let pool = db::connect(&config.database_url).await?;
        db::migrate(&pool).await;

        let timeout = Duration::from_secs(config.outbound_timeout_seconds);
        let mailer: Arc<dyn Mailer> = match &config.mail.api_key {
            Some(key) => Arc::new(HttpMailer::new(&config.mail, key.clone(), timeout)?),
            None => {
                tracing::warn!("MAIL_API_KEY not set; outgoing mail is logged, not delivered");
                Arc::new(LogMailer)
            }
        };
        let identity = Arc::new(GoogleVerifier::new(&config.google, timeout)?);

        Ok(Self {
            store: Arc::new(PgUserStore::new(pool)),
            mailer,
            identity,
            hasher: SecretHasher::new(&config.password)?,
            otp: OtpIssuer::new(config.otp.ttl_seconds),
            config,
        })
    }
}
