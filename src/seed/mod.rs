//! Bootstrap data for accounts activated without email confirmation.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{debug, info_span, instrument, Instrument};
use uuid::Uuid;

/// Starting wallet created for every seeded user.
pub const DEFAULT_ACCOUNTS: &[&str] = &["Cash"];

pub const DEFAULT_INCOME_CATEGORIES: &[&str] = &["Salary", "Interest", "Gifts"];

pub const DEFAULT_EXPENSE_CATEGORIES: &[&str] = &[
    "Groceries",
    "Rent",
    "Utilities",
    "Transport",
    "Health",
    "Entertainment",
];

#[async_trait]
pub trait SeedLoader: Send + Sync {
    /// Populate bootstrap records for `identity`.
    ///
    /// # Errors
    /// Returns an error when the user does not exist or the data cannot be written.
    async fn load(&self, identity: &str) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct PgSeedLoader {
    pool: PgPool,
}

impl PgSeedLoader {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SeedLoader for PgSeedLoader {
    #[instrument(skip(self))]
    async fn load(&self, identity: &str) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin seed transaction")?;

        let query = "SELECT id FROM users WHERE email = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(identity)
            .fetch_optional(&mut *tx)
            .instrument(span)
            .await
            .context("failed to lookup user for seeding")?
            .ok_or_else(|| anyhow!("cannot seed unknown user: {identity}"))?;
        let user_id: Uuid = row.try_get("id")?;

        // Conflicts are ignored so a repeated load leaves the data unchanged.
        let query = r"
            INSERT INTO accounts (user_id, name)
            SELECT $1, name FROM UNNEST($2::text[]) AS name
            ON CONFLICT DO NOTHING
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .bind(DEFAULT_ACCOUNTS.to_vec())
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to seed accounts")?;

        let (names, kinds) = default_categories();
        let query = r"
            INSERT INTO categories (user_id, name, kind)
            SELECT $1, name, kind FROM UNNEST($2::text[], $3::text[]) AS c(name, kind)
            ON CONFLICT DO NOTHING
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .bind(names)
            .bind(kinds)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to seed categories")?;

        tx.commit().await.context("commit seed transaction")?;

        debug!(%user_id, "seed data loaded");

        Ok(())
    }
}

/// Category names and kinds as parallel arrays for `UNNEST`.
fn default_categories() -> (Vec<&'static str>, Vec<&'static str>) {
    DEFAULT_INCOME_CATEGORIES
        .iter()
        .map(|name| (*name, "income"))
        .chain(DEFAULT_EXPENSE_CATEGORIES.iter().map(|name| (*name, "expense")))
        .unzip()
}
