use serde::Deserialize;

const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    /// Adds `Secure` to the session cookie; enable when served over HTTPS.
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    /// Argon2 iteration count.
    pub cost: u32,
    pub memory_kib: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    pub ttl_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub tokeninfo_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub api_url: String,
    /// `None` selects the logging mailer.
    pub api_key: Option<String>,
    pub sender: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub cors_origin: String,
    pub outbound_timeout_seconds: u64,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub otp: OtpConfig,
    pub google: GoogleConfig,
    pub mail: MailConfig,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "taskdesk".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "taskdesk-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60),
            cookie_secure: env_or("COOKIE_SECURE", false),
        };
        let password = PasswordConfig {
            cost: env_or("PASSWORD_HASH_COST", 2),
            memory_kib: env_or("PASSWORD_HASH_MEMORY_KIB", 19 * 1024),
        };
        let otp = OtpConfig {
            ttl_seconds: env_or("OTP_TTL_SECONDS", 5 * 60),
        };
        let google = GoogleConfig {
            client_id: std::env::var("GOOGLE_CLIENT_ID").unwrap_or_default(),
            tokeninfo_url: std::env::var("GOOGLE_TOKENINFO_URL")
                .unwrap_or_else(|_| GOOGLE_TOKENINFO_URL.into()),
        };
        if google.client_id.is_empty() {
            tracing::warn!("GOOGLE_CLIENT_ID not set; google login will reject every token");
        }
        let mail = MailConfig {
            api_url: std::env::var("MAIL_API_URL")
                .unwrap_or_else(|_| "https://api.brevo.com/v3/smtp/email".into()),
            api_key: std::env::var("MAIL_API_KEY").ok().filter(|v| !v.trim().is_empty()),
            sender: std::env::var("MAIL_SENDER").unwrap_or_else(|_| "no-reply@taskdesk.local".into()),
        };
        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("APP_PORT", 8080),
            database_url,
            cors_origin: std::env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".into()),
            outbound_timeout_seconds: env_or("OUTBOUND_TIMEOUT_SECONDS", 10),
            jwt,
            password,
            otp,
            google,
            mail,
        })
    }
}
