//! Background delivery for the `email_outbox` table.
//!
//! Rows start `pending`. Each tick the worker locks a batch with
//! `FOR UPDATE SKIP LOCKED` (so several replicas can poll side by side), hands
//! every row to the configured [`EmailSender`] and records the result:
//! `sent`, `pending` again with a later `next_attempt_at`, or `failed` once the
//! attempt budget is spent.

use anyhow::{Context, Result};
use rand::Rng;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub template: String,
    pub payload_json: String,
}

/// Transport used by the outbox worker.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error so the row is retried.
    ///
    /// # Errors
    /// Any transport failure.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Sender for local development: logs the message and reports success.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            template = %message.template,
            payload = %message.payload_json,
            "email outbox send stub"
        );
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmailWorkerConfig {
    poll_interval: Duration,
    batch_size: usize,
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl EmailWorkerConfig {
    /// 5s poll, batches of 10, 5 attempts, backoff from 5s up to 5m.
    #[must_use]
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 10,
            max_attempts: 5,
            backoff_base: Duration::from_secs(5),
            backoff_max: Duration::from_secs(300),
        }
    }

    #[must_use]
    pub fn with_poll_interval_seconds(mut self, seconds: u64) -> Self {
        self.poll_interval = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_backoff_base_seconds(mut self, seconds: u64) -> Self {
        self.backoff_base = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_backoff_max_seconds(mut self, seconds: u64) -> Self {
        self.backoff_max = Duration::from_secs(seconds);
        self
    }

    /// Replace zero values with the smallest usable ones and keep `max >= base`.
    #[must_use]
    pub fn normalize(self) -> Self {
        let one_second = Duration::from_secs(1);
        let backoff_base = self.backoff_base.max(one_second);
        Self {
            poll_interval: self.poll_interval.max(one_second),
            batch_size: self.batch_size.max(1),
            max_attempts: self.max_attempts.max(1),
            backoff_base,
            backoff_max: self.backoff_max.max(backoff_base),
        }
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for EmailWorkerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// What happens to a row after one delivery attempt.
#[derive(Debug, PartialEq, Eq)]
enum Transition {
    Sent,
    Retry { delay: Duration },
    Failed,
}

fn next_transition(attempt: u32, delivered: bool, config: &EmailWorkerConfig) -> Transition {
    if delivered {
        Transition::Sent
    } else if attempt >= config.max_attempts {
        Transition::Failed
    } else {
        Transition::Retry {
            delay: jitter(backoff(attempt, config.backoff_base, config.backoff_max)),
        }
    }
}

/// `base * 2^(attempt - 1)`, capped at `max`.
fn backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    let shift = attempt.saturating_sub(1).min(31);
    base.checked_mul(1u32 << shift).unwrap_or(max).min(max)
}

/// Uniform in `[delay / 2, delay]`.
fn jitter(delay: Duration) -> Duration {
    let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    if millis < 2 {
        return delay;
    }
    let half = millis / 2;
    Duration::from_millis(half + rand::thread_rng().gen_range(0..=half))
}

/// Spawn the polling loop. The handle is detached by the server; the task lives
/// as long as the runtime.
pub fn spawn_outbox_worker(
    pool: PgPool,
    sender: Arc<dyn EmailSender>,
    config: EmailWorkerConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let config = config.normalize();
        loop {
            match process_batch(&pool, sender.as_ref(), &config).await {
                Ok(0) => {}
                Ok(count) => info!(count, "email outbox batch processed"),
                Err(err) => error!("email outbox batch failed: {err:#}"),
            }
            sleep(config.poll_interval()).await;
        }
    })
}

async fn process_batch(
    pool: &PgPool,
    sender: &dyn EmailSender,
    config: &EmailWorkerConfig,
) -> Result<usize> {
    let mut tx = pool
        .begin()
        .await
        .context("failed to start email outbox transaction")?;

    let query = r"
        SELECT id, to_email, template, payload_json::text AS payload_json, attempts
        FROM email_outbox
        WHERE status = 'pending'
          AND next_attempt_at <= NOW()
        ORDER BY next_attempt_at ASC, created_at ASC
        LIMIT $1
        FOR UPDATE SKIP LOCKED
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(i64::try_from(config.batch_size()).unwrap_or(i64::MAX))
        .fetch_all(&mut *tx)
        .instrument(span)
        .await
        .context("failed to load email outbox batch")?;

    let count = rows.len();
    for row in rows {
        let id: Uuid = row.try_get("id")?;
        let attempts: i32 = row.try_get("attempts")?;
        let message = EmailMessage {
            to_email: row.try_get("to_email")?,
            template: row.try_get("template")?,
            payload_json: row.try_get("payload_json")?,
        };

        let attempt = u32::try_from(attempts).unwrap_or(0).saturating_add(1);
        let result = sender.send(&message);
        if let Err(err) = &result {
            warn!(%id, attempt, "email delivery failed: {err:#}");
        }
        let transition = next_transition(attempt, result.is_ok(), config);
        record_transition(&mut tx, id, attempt, transition, result.err()).await?;
    }

    // Commit even when empty so the locks are released.
    tx.commit()
        .await
        .context("failed to commit email outbox batch")?;

    Ok(count)
}

async fn record_transition(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    attempt: u32,
    transition: Transition,
    error: Option<anyhow::Error>,
) -> Result<()> {
    let (status, delay_seconds) = match transition {
        Transition::Sent => ("sent", 0.0),
        Transition::Failed => ("failed", 0.0),
        Transition::Retry { delay } => ("pending", delay.as_secs_f64()),
    };

    let query = r"
        UPDATE email_outbox
        SET status = $2,
            attempts = $3,
            last_error = $4,
            sent_at = CASE WHEN $2 = 'sent' THEN NOW() ELSE sent_at END,
            next_attempt_at = NOW() + ($5 * INTERVAL '1 second')
        WHERE id = $1
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .bind(status)
        .bind(i32::try_from(attempt).unwrap_or(i32::MAX))
        .bind(error.map(|err| format!("{err:#}")))
        .bind(delay_seconds)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .with_context(|| format!("failed to mark email outbox row {id} as {status}"))?;

    Ok(())
}
