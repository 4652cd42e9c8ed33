//! Confirmation email delivery.
//!
//! The registration workflow talks to a [`Mailer`]. The production mailer,
//! [`OutboxMailer`], does not talk SMTP itself: it writes a row into
//! `email_outbox` and returns. A background worker (see [`outbox`]) drains the
//! table through an [`EmailSender`], retrying with exponential backoff.

pub mod outbox;

pub use outbox::{spawn_outbox_worker, EmailMessage, EmailSender, EmailWorkerConfig, LogEmailSender};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use sqlx::PgPool;
use tracing::{info_span, instrument, Instrument};
use url::Url;

pub const USER_CONFIRMATION_TEMPLATE: &str = "user_confirmation";

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Dispatch the confirmation message for `identity`.
    ///
    /// # Errors
    /// Returns an error if the message could not be handed to the transport.
    async fn send_confirmation(&self, identity: &str, encoded_token: &str) -> Result<()>;
}

/// Queues confirmation emails in the `email_outbox` table.
#[derive(Clone, Debug)]
pub struct OutboxMailer {
    pool: PgPool,
    frontend_base_url: String,
}

impl OutboxMailer {
    #[must_use]
    pub fn new(pool: PgPool, frontend_base_url: String) -> Self {
        Self {
            pool,
            frontend_base_url,
        }
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    #[instrument(skip(self, encoded_token))]
    async fn send_confirmation(&self, identity: &str, encoded_token: &str) -> Result<()> {
        let confirm_url = build_confirm_url(&self.frontend_base_url, encoded_token)?;
        let payload = json!({ "confirm_url": confirm_url });

        let query = r"
            INSERT INTO email_outbox (to_email, template, payload_json)
            VALUES ($1, $2, $3)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(identity)
            .bind(USER_CONFIRMATION_TEMPLATE)
            .bind(payload)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to enqueue confirmation email")?;

        Ok(())
    }
}

/// Build the frontend link included in confirmation emails.
///
/// # Errors
/// Returns an error if the frontend base URL cannot be parsed.
pub fn build_confirm_url(frontend_base_url: &str, encoded_token: &str) -> Result<String> {
    let base = frontend_base_url.trim_end_matches('/');
    let mut url = Url::parse(&format!("{base}/confirm"))
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    url.query_pairs_mut().append_pair("token", encoded_token);
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_url_appends_token_query() -> Result<()> {
        let url = build_confirm_url("https://wallet.example.com/", "abc.def")?;
        assert_eq!(url, "https://wallet.example.com/confirm?token=abc.def");
        Ok(())
    }

    #[test]
    fn confirm_url_keeps_base_path() -> Result<()> {
        let url = build_confirm_url("https://example.com/app", "t-_1")?;
        assert_eq!(url, "https://example.com/app/confirm?token=t-_1");
        Ok(())
    }

    #[test]
    fn confirm_url_rejects_invalid_base() {
        assert!(build_confirm_url("not a url", "abc").is_err());
    }
}
