use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use secrecy::SecretString;
use signup::{
    api::{self, HostEnvironment},
    email::Mailer,
    membership::{AccountCreationOutcome, FailureReason, Membership},
    registration::Registrar,
    seed::SeedLoader,
    token::{HmacTokenCodec, SecureTokenCodec},
};
use std::sync::{Arc, Mutex, PoisonError};
use tower::ServiceExt;

const KEY: &str = "integration-test-signing-key-0123456789";

#[derive(Default)]
struct Journal {
    created: Vec<(String, bool)>,
    mailed: Vec<(String, String)>,
    seeded: Vec<String>,
}

type Shared = Arc<Mutex<Journal>>;

fn journal(shared: &Shared) -> std::sync::MutexGuard<'_, Journal> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

struct ScriptedMembership {
    journal: Shared,
    outcome: AccountCreationOutcome,
}

#[async_trait]
impl Membership for ScriptedMembership {
    async fn create_account(
        &self,
        identity: &str,
        _credential: &SecretString,
        require_confirmation: bool,
    ) -> Result<AccountCreationOutcome> {
        journal(&self.journal)
            .created
            .push((identity.to_string(), require_confirmation));
        Ok(self.outcome.clone())
    }
}

struct RecordingMailer {
    journal: Shared,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_confirmation(&self, identity: &str, encoded_token: &str) -> Result<()> {
        journal(&self.journal)
            .mailed
            .push((identity.to_string(), encoded_token.to_string()));
        Ok(())
    }
}

struct RecordingSeeds {
    journal: Shared,
}

#[async_trait]
impl SeedLoader for RecordingSeeds {
    async fn load(&self, identity: &str) -> Result<()> {
        journal(&self.journal).seeded.push(identity.to_string());
        Ok(())
    }
}

fn codec() -> Result<HmacTokenCodec> {
    Ok(HmacTokenCodec::new(SecretString::from(KEY.to_string()))?)
}

fn app(outcome: AccountCreationOutcome, host: Option<HostEnvironment>) -> Result<(Router, Shared)> {
    let shared = Shared::default();
    let registrar = Arc::new(Registrar::new(
        Arc::new(ScriptedMembership {
            journal: shared.clone(),
            outcome,
        }),
        Arc::new(codec()?),
        Arc::new(RecordingMailer {
            journal: shared.clone(),
        }),
        Arc::new(RecordingSeeds {
            journal: shared.clone(),
        }),
    ));
    // Without a host flag the request must behave like production.
    let app = match host {
        Some(host) => api::app(registrar, host),
        None => {
            let (router, _) = api::router().split_for_parts();
            router.layer(axum::Extension(registrar))
        }
    };
    Ok((app, shared))
}

fn post_users(body: &str) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method(Method::POST)
        .uri("/users")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))?)
}

fn success() -> AccountCreationOutcome {
    AccountCreationOutcome::Success {
        activation_token: "act-123".to_string(),
    }
}

#[tokio::test]
async fn confirmation_email_carries_a_verifiable_token() -> Result<()> {
    let (app, shared) = app(success(), Some(HostEnvironment::new(false)))?;

    let response = app
        .oneshot(post_users(r#"{"email":"  User@Example.COM ","password":"p1"}"#)?)
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let journal = journal(&shared);
    assert_eq!(journal.created, vec![("user@example.com".to_string(), true)]);
    assert!(journal.seeded.is_empty());
    assert_eq!(journal.mailed.len(), 1);

    let (identity, token) = &journal.mailed[0];
    assert_eq!(identity, "user@example.com");
    let payload = codec()?.decode(token)?;
    assert_eq!(payload.normalized_email, "user@example.com");
    assert_eq!(payload.activation_token, "act-123");
    Ok(())
}

#[tokio::test]
async fn debug_host_activates_and_seeds() -> Result<()> {
    let (app, shared) = app(success(), Some(HostEnvironment::new(true)))?;

    let response = app
        .oneshot(post_users(r#"{"email":"a@b.com","password":"p1"}"#)?)
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let journal = journal(&shared);
    assert_eq!(journal.created, vec![("a@b.com".to_string(), false)]);
    assert_eq!(journal.seeded, vec!["a@b.com".to_string()]);
    assert!(journal.mailed.is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_host_flag_requires_confirmation() -> Result<()> {
    let (app, shared) = app(success(), None)?;

    let response = app
        .oneshot(post_users(r#"{"email":"a@b.com","password":"p1"}"#)?)
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let journal = journal(&shared);
    assert_eq!(journal.created, vec![("a@b.com".to_string(), true)]);
    assert_eq!(journal.mailed.len(), 1);
    assert!(journal.seeded.is_empty());
    Ok(())
}

#[tokio::test]
async fn duplicate_email_is_reported_on_the_email_field() -> Result<()> {
    let (app, shared) = app(
        AccountCreationOutcome::Failure(FailureReason::DuplicateIdentity),
        Some(HostEnvironment::new(false)),
    )?;

    let response = app
        .oneshot(post_users(r#"{"email":"a@b.com","password":"p1"}"#)?)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body: serde_json::Value = serde_json::from_slice(&bytes)?;
    assert_eq!(
        body,
        serde_json::json!({
            "message": "The request is invalid.",
            "errors": { "email": ["User with same email already exists."] }
        })
    );

    let journal = journal(&shared);
    assert!(journal.mailed.is_empty());
    assert!(journal.seeded.is_empty());
    Ok(())
}

#[tokio::test]
async fn openapi_document_is_served() -> Result<()> {
    let (app, _) = app(success(), Some(HostEnvironment::default()))?;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api-docs/openapi.json")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body: serde_json::Value = serde_json::from_slice(&bytes)?;
    assert!(body["paths"]["/users"]["post"].is_object());
    Ok(())
}
