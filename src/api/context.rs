//! Request-scoped context resolved from what the hosting layer attaches.

use crate::registration::RegistrationMode;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

/// Flags set by the hosting layer and attached to every request as an extension.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HostEnvironment {
    pub debug: bool,
}

impl HostEnvironment {
    #[must_use]
    pub const fn new(debug: bool) -> Self {
        Self { debug }
    }
}

/// Registration mode resolved once, when the request is extracted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestContext {
    mode: RegistrationMode,
}

impl RequestContext {
    #[must_use]
    pub fn from_parts(parts: &Parts) -> Self {
        // No host flag means production behavior.
        let debug = parts
            .extensions
            .get::<HostEnvironment>()
            .map(|host| host.debug);
        Self {
            mode: RegistrationMode::from_debug(debug),
        }
    }

    #[must_use]
    pub const fn mode(&self) -> RegistrationMode {
        self.mode
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}
