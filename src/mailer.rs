//! Out-of-band delivery of verification codes.
//!
//! `HttpMailer` posts to a transactional email relay (Brevo-compatible JSON body,
//! `api-key` header). `LogMailer` is the local-dev fallback and only logs that a
//! message would have been sent.
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::config::MailConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

impl EmailMessage {
    pub fn otp(to: &str, code: &str, ttl_minutes: i64) -> Self {
        Self {
            to: to.to_string(),
            subject: "Your OTP Code".into(),
            text: format!(
                "Your verification code is {code}. It expires in {ttl_minutes} minutes."
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()>;
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendBody<'a> {
    sender: Address<'a>,
    to: Vec<Address<'a>>,
    subject: &'a str,
    text_content: &'a str,
}

pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    sender: String,
}

impl HttpMailer {
    pub fn new(cfg: &MailConfig, api_key: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build mail http client")?;
        Ok(Self {
            client,
            api_url: cfg.api_url.clone(),
            api_key,
            sender: cfg.sender.clone(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        let body = SendBody {
            sender: Address {
                email: &self.sender,
            },
            to: vec![Address { email: &message.to }],
            subject: &message.subject,
            text_content: &message.text,
        };
        let resp = self
            .client
            .post(&self.api_url)
            .header("api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .context("mail relay request")?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let text = resp.text().await.unwrap_or_default();
        anyhow::bail!("mail relay rejected message (status={status}): {text}")
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        info!(to = %message.to, subject = %message.subject, "mail send stub");
        Ok(())
    }
}
