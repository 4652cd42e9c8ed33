//! Registration workflow.
//!
//! [`Registrar::register`] creates the account through the [`Membership`]
//! backend and then runs exactly one of two follow-ups:
//!
//! - **Confirmation required** (production): the identity and the backend
//!   activation token are signed into a URL-safe string and handed to the
//!   [`Mailer`]. The dispatch is awaited, but a failure is only logged; the
//!   account already exists and the client still gets a success.
//! - **Debug mode**: the [`SeedLoader`] activates the account immediately. A seed
//!   failure leaves a half-activated account, so it is escalated as an error.
//!
//! Backend refusals never reach the follow-ups; they are translated into
//! [`ValidationErrors`].

mod validation;

pub use validation::{
    failure_errors, ValidationErrors, DUPLICATE_EMAIL_MESSAGE, GENERAL_FIELD,
    INVALID_EMAIL_MESSAGE, INVALID_PASSWORD_MESSAGE, UNEXPECTED_ERROR_MESSAGE,
};

use crate::{
    email::Mailer,
    membership::{AccountCreationOutcome, Membership},
    seed::SeedLoader,
    token::{ConfirmationPayload, SecureTokenCodec, TokenError},
};
use secrecy::SecretString;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument};

/// A signup request that already passed structural validation.
#[derive(Debug)]
pub struct AccountCreationRequest {
    pub email: String,
    pub password: SecretString,
}

impl AccountCreationRequest {
    #[must_use]
    pub fn new(email: impl Into<String>, password: SecretString) -> Self {
        Self {
            email: email.into(),
            password,
        }
    }

    /// Lower-cased identity used as the storage key.
    #[must_use]
    pub fn identity(&self) -> String {
        normalize_email(&self.email)
    }
}

/// Normalize an email for lookup/uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Per-request activation policy derived from the host's debug flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegistrationMode {
    require_confirmation: bool,
}

impl RegistrationMode {
    /// Unknown host context resolves to `debug_active = false`.
    #[must_use]
    pub const fn from_debug(debug_active: Option<bool>) -> Self {
        let debug_active = match debug_active {
            Some(active) => active,
            None => false,
        };
        Self {
            require_confirmation: !debug_active,
        }
    }

    #[must_use]
    pub const fn require_confirmation(self) -> bool {
        self.require_confirmation
    }
}

impl Default for RegistrationMode {
    fn default() -> Self {
        Self::from_debug(None)
    }
}

/// Which follow-up ran after the account was created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    /// Confirmation email dispatched; `delivered` is false when the mailer failed.
    PendingConfirmation { delivered: bool },
    /// Seed data loaded, account usable right away.
    Activated,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RegistrationResult {
    Registered(Activation),
    Rejected(ValidationErrors),
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("membership backend failed")]
    Membership(#[source] anyhow::Error),
    #[error("failed to encode confirmation token")]
    Token(#[from] TokenError),
    #[error("failed to load seed data for {identity}")]
    Seed {
        identity: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Orchestrates account creation and the follow-up for one request at a time.
/// Holds only shared handles, so a single instance serves all requests.
#[derive(Clone)]
pub struct Registrar {
    membership: Arc<dyn Membership>,
    codec: Arc<dyn SecureTokenCodec>,
    mailer: Arc<dyn Mailer>,
    seeds: Arc<dyn SeedLoader>,
}

impl std::fmt::Debug for Registrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registrar").finish_non_exhaustive()
    }
}

impl Registrar {
    #[must_use]
    pub fn new(
        membership: Arc<dyn Membership>,
        codec: Arc<dyn SecureTokenCodec>,
        mailer: Arc<dyn Mailer>,
        seeds: Arc<dyn SeedLoader>,
    ) -> Self {
        Self {
            membership,
            codec,
            mailer,
            seeds,
        }
    }

    /// Create the account and run the follow-up selected by `mode`.
    ///
    /// # Errors
    /// Returns an error when the backend itself fails, when the confirmation
    /// token cannot be encoded, or when seeding fails. Backend refusals are not
    /// errors; they come back as [`RegistrationResult::Rejected`].
    #[instrument(skip_all, fields(require_confirmation = mode.require_confirmation()))]
    pub async fn register(
        &self,
        request: &AccountCreationRequest,
        mode: RegistrationMode,
    ) -> Result<RegistrationResult, RegistrationError> {
        let identity = request.identity();
        let require_confirmation = mode.require_confirmation();

        let outcome = self
            .membership
            .create_account(&identity, &request.password, require_confirmation)
            .await
            .map_err(RegistrationError::Membership)?;

        let activation_token = match outcome {
            AccountCreationOutcome::Success { activation_token } => activation_token,
            AccountCreationOutcome::Failure(reason) => {
                debug!(?reason, "account creation rejected");
                return Ok(RegistrationResult::Rejected(failure_errors(&reason)));
            }
        };

        let activation = if require_confirmation {
            let payload = ConfirmationPayload {
                normalized_email: identity,
                activation_token,
            };
            let encoded = self.codec.encode(&payload)?;
            let delivered = self
                .dispatch_confirmation(&payload.normalized_email, &encoded)
                .await;
            Activation::PendingConfirmation { delivered }
        } else {
            self.seeds
                .load(&identity)
                .await
                .map_err(|source| RegistrationError::Seed {
                    identity: identity.clone(),
                    source,
                })?;
            Activation::Activated
        };

        info!(?activation, "account registered");

        Ok(RegistrationResult::Registered(activation))
    }

    /// Await the mailer and swallow its error. This is the only place a
    /// delivery failure is handled.
    async fn dispatch_confirmation(&self, identity: &str, encoded: &str) -> bool {
        match self.mailer.send_confirmation(identity, encoded).await {
            Ok(()) => true,
            Err(err) => {
                error!(identity, "failed to dispatch confirmation email: {err:#}");
                false
            }
        }
    }
}
