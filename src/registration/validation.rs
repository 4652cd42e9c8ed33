//! Field-scoped validation errors returned to the client.

use crate::membership::FailureReason;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Field name used for errors that do not belong to a specific input.
pub const GENERAL_FIELD: &str = "";

pub const DUPLICATE_EMAIL_MESSAGE: &str = "User with same email already exists.";
pub const INVALID_EMAIL_MESSAGE: &str = "Invalid email address.";
pub const INVALID_PASSWORD_MESSAGE: &str = "Invalid password.";
pub const UNEXPECTED_ERROR_MESSAGE: &str = "Unexpected error.";

/// Ordered map of field name to messages, built fresh for every request.
#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    #[must_use]
    pub fn with(mut self, field: &str, message: impl Into<String>) -> Self {
        self.add(field, message);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of fields carrying at least one message.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn messages(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }
}

/// Translate a backend refusal into exactly one field error.
#[must_use]
pub fn failure_errors(reason: &FailureReason) -> ValidationErrors {
    let (field, message) = match reason {
        FailureReason::DuplicateIdentity => ("email", DUPLICATE_EMAIL_MESSAGE),
        FailureReason::InvalidIdentity => ("email", INVALID_EMAIL_MESSAGE),
        FailureReason::InvalidCredential => ("password", INVALID_PASSWORD_MESSAGE),
        FailureReason::Other(_) => (GENERAL_FIELD, UNEXPECTED_ERROR_MESSAGE),
    };
    ValidationErrors::new().with(field, message)
}
