use crate::email::EmailWorkerConfig;
use clap::{Arg, ArgMatches, Command};

pub const ARG_POLL_SECONDS: &str = "email-outbox-poll-seconds";
pub const ARG_BATCH_SIZE: &str = "email-outbox-batch-size";
pub const ARG_MAX_ATTEMPTS: &str = "email-outbox-max-attempts";
pub const ARG_BACKOFF_BASE_SECONDS: &str = "email-outbox-backoff-base-seconds";
pub const ARG_BACKOFF_MAX_SECONDS: &str = "email-outbox-backoff-max-seconds";

/// Worker settings, falling back to the worker defaults for anything unset.
#[must_use]
pub fn worker_config(matches: &ArgMatches) -> EmailWorkerConfig {
    let mut config = EmailWorkerConfig::new();

    if let Some(seconds) = matches.get_one::<u64>(ARG_POLL_SECONDS) {
        config = config.with_poll_interval_seconds(*seconds);
    }
    if let Some(batch_size) = matches.get_one::<usize>(ARG_BATCH_SIZE) {
        config = config.with_batch_size(*batch_size);
    }
    if let Some(max_attempts) = matches.get_one::<u32>(ARG_MAX_ATTEMPTS) {
        config = config.with_max_attempts(*max_attempts);
    }
    if let Some(seconds) = matches.get_one::<u64>(ARG_BACKOFF_BASE_SECONDS) {
        config = config.with_backoff_base_seconds(*seconds);
    }
    if let Some(seconds) = matches.get_one::<u64>(ARG_BACKOFF_MAX_SECONDS) {
        config = config.with_backoff_max_seconds(*seconds);
    }

    config.normalize()
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_POLL_SECONDS)
                .long(ARG_POLL_SECONDS)
                .help("Email outbox poll interval in seconds")
                .env("SIGNUP_EMAIL_OUTBOX_POLL_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_BATCH_SIZE)
                .long(ARG_BATCH_SIZE)
                .help("Email outbox batch size per poll")
                .env("SIGNUP_EMAIL_OUTBOX_BATCH_SIZE")
                .default_value("10")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_MAX_ATTEMPTS)
                .long(ARG_MAX_ATTEMPTS)
                .help("Max attempts before marking an email as failed")
                .env("SIGNUP_EMAIL_OUTBOX_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_BACKOFF_BASE_SECONDS)
                .long(ARG_BACKOFF_BASE_SECONDS)
                .help("Base delay for email outbox retry backoff")
                .env("SIGNUP_EMAIL_OUTBOX_BACKOFF_BASE_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_BACKOFF_MAX_SECONDS)
                .long(ARG_BACKOFF_MAX_SECONDS)
                .help("Max delay for email outbox retry backoff")
                .env("SIGNUP_EMAIL_OUTBOX_BACKOFF_MAX_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
}
