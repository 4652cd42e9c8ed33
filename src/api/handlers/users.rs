use crate::{
    api::context::RequestContext,
    membership::valid_identity,
    registration::{
        AccountCreationRequest, RegistrationResult, Registrar, ValidationErrors, GENERAL_FIELD,
    },
};
use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::ToSchema;

pub const INVALID_REQUEST_MESSAGE: &str = "The request is invalid.";

/// Missing keys deserialize as empty strings so `validate` can name them.
#[derive(ToSchema, Serialize, Deserialize)]
pub struct CreateUser {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for CreateUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateUser")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

impl CreateUser {
    /// Structural checks that run before the workflow is involved.
    #[must_use]
    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();

        let email = self.email.trim();
        if email.is_empty() {
            errors.add("email", "The email field is required.");
        } else if !valid_identity(email) {
            errors.add("email", "The email field is not a valid e-mail address.");
        }

        if self.password.is_empty() {
            errors.add("password", "The password field is required.");
        }

        errors
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub message: String,
    #[schema(value_type = Object)]
    pub errors: ValidationErrors,
}

impl ErrorResponse {
    #[must_use]
    pub fn invalid(errors: ValidationErrors) -> Self {
        Self {
            message: INVALID_REQUEST_MESSAGE.to_string(),
            errors,
        }
    }
}

fn bad_request(errors: ValidationErrors) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::invalid(errors))).into_response()
}

#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUser,
    responses (
        (status = 204, description = "Account created; confirmation email queued or account activated"),
        (status = 400, description = "Invalid input or account rejected by the membership backend", body = ErrorResponse),
        (status = 500, description = "Account could not be created or activated", body = String),
    ),
    tag = "users"
)]
// axum handler for account registration
#[instrument(skip_all, fields(require_confirmation = context.mode().require_confirmation()))]
pub async fn register(
    context: RequestContext,
    registrar: Extension<Arc<Registrar>>,
    payload: Result<Json<CreateUser>, JsonRejection>,
) -> impl IntoResponse {
    let user: CreateUser = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            return bad_request(ValidationErrors::new().with(GENERAL_FIELD, rejection.body_text()));
        }
    };

    let errors = user.validate();
    if !errors.is_empty() {
        return bad_request(errors);
    }

    let request = AccountCreationRequest::new(user.email, SecretString::from(user.password));

    match registrar.register(&request, context.mode()).await {
        Ok(RegistrationResult::Registered(_)) => StatusCode::NO_CONTENT.into_response(),
        Ok(RegistrationResult::Rejected(errors)) => bad_request(errors),
        Err(err) => {
            error!("Registration failed: {:#}", anyhow::Error::from(err));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Registration failed".to_string(),
            )
                .into_response()
        }
    }
}
