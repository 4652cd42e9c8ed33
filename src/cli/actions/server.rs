use crate::{
    api::{self, HostEnvironment},
    email::{self, EmailWorkerConfig, OutboxMailer},
    membership::PgMembership,
    registration::Registrar,
    seed::PgSeedLoader,
    token::HmacTokenCodec,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub frontend_base_url: String,
    pub token_secret: SecretString,
    pub debug: bool,
    pub min_password_length: usize,
    pub email_worker: EmailWorkerConfig,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("port", &self.port)
            .field("dsn", &"***")
            .field("frontend_base_url", &self.frontend_base_url)
            .field("token_secret", &"***")
            .field("debug", &self.debug)
            .field("min_password_length", &self.min_password_length)
            .field("email_worker", &self.email_worker)
            .finish()
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the signing key is unusable, the database is unreachable,
/// or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let codec =
        HmacTokenCodec::new(args.token_secret).context("Invalid confirmation token secret")?;

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&args.dsn)
        .await
        .context("Failed to connect to database")?;

    let registrar = Arc::new(Registrar::new(
        Arc::new(PgMembership::new(pool.clone(), args.min_password_length)),
        Arc::new(codec),
        Arc::new(OutboxMailer::new(
            pool.clone(),
            args.frontend_base_url.clone(),
        )),
        Arc::new(PgSeedLoader::new(pool.clone())),
    ));

    // Queued confirmation emails are delivered by this worker, never by the request.
    email::spawn_outbox_worker(pool.clone(), Arc::new(email::LogEmailSender), args.email_worker);

    if args.debug {
        info!("Debug mode: new accounts are activated without email confirmation");
    }

    api::new(
        args.port,
        pool,
        registrar,
        HostEnvironment::new(args.debug),
        &args.frontend_base_url,
    )
    .await
}
