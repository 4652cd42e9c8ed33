//! Membership backend: the owner of account storage.
//!
//! The registration workflow only sees the [`Membership`] trait. It hands over an
//! already-normalized identity and receives an [`AccountCreationOutcome`]; the
//! backend is responsible for uniqueness and for creating the row atomically.

mod postgres;

pub use postgres::PgMembership;

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use secrecy::SecretString;

/// Longest identity the `users.email` column accepts.
pub const MAX_IDENTITY_LENGTH: usize = 320;

static EMAIL_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

/// Email shape check shared by the HTTP layer and the backend, so nothing
/// accepted over the wire is refused later by a column constraint.
#[must_use]
pub fn valid_identity(identity: &str) -> bool {
    identity.len() <= MAX_IDENTITY_LENGTH
        && EMAIL_RE
            .as_ref()
            .is_some_and(|re| re.is_match(identity))
}

/// Why the backend refused to create an account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureReason {
    /// Username, email or provider key already taken.
    DuplicateIdentity,
    /// Malformed username or email.
    InvalidIdentity,
    /// Credential rejected by the backend policy.
    InvalidCredential,
    /// Anything else the backend reports; carries a detail for logs only.
    Other(String),
}

/// Result of a single `create_account` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccountCreationOutcome {
    /// Account row exists. The token is empty when no confirmation is required.
    Success { activation_token: String },
    Failure(FailureReason),
}

#[async_trait]
pub trait Membership: Send + Sync {
    /// Create the account or fail without leaving a partial row behind.
    ///
    /// # Errors
    /// Returns an error only for infrastructure failures (connection lost, etc.).
    /// Refusals are reported through [`AccountCreationOutcome::Failure`].
    async fn create_account(
        &self,
        identity: &str,
        credential: &SecretString,
        require_confirmation: bool,
    ) -> Result<AccountCreationOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_identity_accepts_basic_format() {
        assert!(valid_identity("a@b.com"));
        assert!(valid_identity("name.surname@example.co"));
    }

    #[test]
    fn valid_identity_rejects_malformed() {
        assert!(!valid_identity(""));
        assert!(!valid_identity("no-at-sign"));
        assert!(!valid_identity("a b@example.com"));
        assert!(!valid_identity("a@nodot"));
    }

    #[test]
    fn valid_identity_enforces_column_length() {
        let local = "a".repeat(MAX_IDENTITY_LENGTH - "@example.com".len());
        assert!(valid_identity(&format!("{local}@example.com")));
        assert!(!valid_identity(&format!("{local}a@example.com")));
        assert!(!valid_identity(&format!("{}@example.com", "a".repeat(320))));
    }
}
