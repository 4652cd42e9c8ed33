//! # Signup (Account Registration Service)
//!
//! `signup` accepts account registrations, creates the account through a
//! membership backend and then either emails a tamper-proof confirmation link
//! or, when the hosting layer runs in debug mode, activates the account
//! immediately by loading seed data.
//!
//! ## Registration Flow
//!
//! - **Normalization:** Emails are trimmed and lower-cased before they reach the
//!   backend, so duplicate checks are case-insensitive.
//! - **Confirmation:** The backend issues an opaque activation token. The token
//!   and the email are signed into a URL-safe string and queued in the email
//!   outbox. Delivery failures are logged, never reported to the client.
//! - **Debug Mode:** Requests carrying the debug host flag skip the email and
//!   load seed data right away. Missing flag means confirmation is required.
//!
//! ## Errors
//!
//! Backend rejections become field-scoped validation errors (`400`). Seed
//! failures and infrastructure errors are escalated as `500`.

pub mod api;
pub mod cli;
pub mod email;
pub mod membership;
pub mod registration;
pub mod seed;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
    }
}
