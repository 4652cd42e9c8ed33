use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_TOKEN_SECRET: &str = "token-secret";
pub const ARG_DEBUG: &str = "debug";
pub const ARG_MIN_PASSWORD_LENGTH: &str = "min-password-length";

#[derive(Debug)]
pub struct Options {
    pub frontend_base_url: String,
    pub token_secret: SecretString,
    pub debug: bool,
    pub min_password_length: usize,
}

impl Options {
    /// # Errors
    /// Returns an error if the token secret is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let token_secret = matches
            .get_one::<String>(ARG_TOKEN_SECRET)
            .cloned()
            .map(SecretString::from)
            .with_context(|| format!("missing required argument: --{ARG_TOKEN_SECRET}"))?;

        Ok(Self {
            frontend_base_url: matches
                .get_one::<String>(ARG_FRONTEND_BASE_URL)
                .cloned()
                .unwrap_or_else(|| "http://localhost:8080".to_string()),
            token_secret,
            debug: matches.get_flag(ARG_DEBUG),
            min_password_length: matches
                .get_one::<usize>(ARG_MIN_PASSWORD_LENGTH)
                .copied()
                .unwrap_or(6),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL used for confirmation links")
                .env("SIGNUP_FRONTEND_BASE_URL")
                .default_value("http://localhost:8080"),
        )
        .arg(
            Arg::new(ARG_TOKEN_SECRET)
                .long(ARG_TOKEN_SECRET)
                .help("Key used to sign confirmation tokens (at least 32 bytes)")
                .env("SIGNUP_TOKEN_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_DEBUG)
                .long(ARG_DEBUG)
                .help("Activate new accounts immediately and load seed data instead of sending confirmation emails")
                .env("SIGNUP_DEBUG")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_MIN_PASSWORD_LENGTH)
                .long(ARG_MIN_PASSWORD_LENGTH)
                .help("Minimum password length accepted by the membership backend")
                .env("SIGNUP_MIN_PASSWORD_LENGTH")
                .default_value("6")
                .value_parser(clap::value_parser!(usize)),
        )
}
