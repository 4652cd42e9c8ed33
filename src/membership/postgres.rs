//! Postgres-backed membership store.

use super::{valid_identity, AccountCreationOutcome, FailureReason, Membership};
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use sqlx::{PgPool, Row};
use tracing::{debug, info_span, instrument, Instrument};
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";
const CHECK_VIOLATION: &str = "23514";

#[derive(Clone, Debug)]
pub struct PgMembership {
    pool: PgPool,
    min_password_length: usize,
}

impl PgMembership {
    #[must_use]
    pub fn new(pool: PgPool, min_password_length: usize) -> Self {
        Self {
            pool,
            min_password_length,
        }
    }

    fn check_request(&self, identity: &str, credential: &SecretString) -> Option<FailureReason> {
        if !valid_identity(identity) {
            return Some(FailureReason::InvalidIdentity);
        }
        if !valid_credential(credential.expose_secret(), self.min_password_length) {
            return Some(FailureReason::InvalidCredential);
        }
        None
    }
}

#[async_trait]
impl Membership for PgMembership {
    #[instrument(skip(self, credential))]
    async fn create_account(
        &self,
        identity: &str,
        credential: &SecretString,
        require_confirmation: bool,
    ) -> Result<AccountCreationOutcome> {
        if let Some(reason) = self.check_request(identity, credential) {
            debug!(?reason, "account rejected before insert");
            return Ok(AccountCreationOutcome::Failure(reason));
        }

        let activation_token = if require_confirmation {
            generate_activation_token()?
        } else {
            String::new()
        };

        // A single INSERT keeps creation atomic: either the row exists or nothing does.
        let query = r"
            INSERT INTO users (email, password_hash, confirmation_token, confirmed_at)
            VALUES (
                $1,
                crypt($2, gen_salt('bf')),
                NULLIF($3, ''),
                CASE WHEN $4 THEN NULL ELSE NOW() END
            )
            RETURNING id
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(identity)
            .bind(credential.expose_secret())
            .bind(&activation_token)
            .bind(require_confirmation)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(row) => {
                let user_id: Uuid = row.try_get("id").context("missing user id")?;
                debug!(%user_id, "account created");
                Ok(AccountCreationOutcome::Success { activation_token })
            }
            Err(err) => match failure_from_db_error(&err) {
                Some(reason) => Ok(AccountCreationOutcome::Failure(reason)),
                None => Err(err).context("failed to insert user"),
            },
        }
    }
}

fn valid_credential(credential: &str, min_length: usize) -> bool {
    !credential.trim().is_empty() && credential.chars().count() >= min_length
}

/// Random 32 bytes, base64url without padding.
fn generate_activation_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate activation token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

fn failure_from_db_error(err: &sqlx::Error) -> Option<FailureReason> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };
    match db_err.code().as_deref() {
        Some(UNIQUE_VIOLATION) => Some(FailureReason::DuplicateIdentity),
        Some(CHECK_VIOLATION) => Some(FailureReason::Other(db_err.message().to_string())),
        _ => None,
    }
}
