//! Account model and repository for depot.
//!
//! Accounts are the publishing identities; the only field the lifecycle
//! subsystem consumes is the plan tier.

use sqlx::SqlitePool;

use crate::policy::PlanTier;
use crate::{DepotError, Result};

/// A publishing account.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    /// Unique account ID.
    pub id: i64,
    /// Login name (unique).
    pub username: String,
    /// Subscription plan tier.
    #[sqlx(try_from = "String")]
    pub plan: PlanTier,
    /// Account creation timestamp.
    pub created_at: String,
}

/// Data for creating a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Login name (unique).
    pub username: String,
    /// Subscription plan tier.
    pub plan: PlanTier,
}

impl NewAccount {
    /// Create a new NewAccount on the default (Hobbyist) tier.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            plan: PlanTier::default(),
        }
    }

    /// Set the plan tier.
    pub fn with_plan(mut self, plan: PlanTier) -> Self {
        self.plan = plan;
        self
    }
}

/// Repository for account operations.
pub struct AccountRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AccountRepository<'a> {
    /// Create a new AccountRepository with the given pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new account.
    pub async fn create(&self, new_account: &NewAccount) -> Result<Account> {
        let result = sqlx::query("INSERT INTO accounts (username, plan) VALUES (?, ?)")
            .bind(&new_account.username)
            .bind(new_account.plan.as_str())
            .execute(self.pool)
            .await?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DepotError::NotFound("account".to_string()))
    }

    /// Get an account by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, username, plan, created_at FROM accounts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(account)
    }

    /// Read the plan tier for an account.
    pub async fn plan_of(&self, id: i64) -> Result<PlanTier> {
        let plan: Option<String> = sqlx::query_scalar("SELECT plan FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        let plan = plan.ok_or_else(|| DepotError::NotFound("account".to_string()))?;
        plan.parse()
            .map_err(|e: String| DepotError::Database(e))
    }

    /// Change an account's plan tier.
    pub async fn set_plan(&self, id: i64, plan: PlanTier) -> Result<bool> {
        let result = sqlx::query("UPDATE accounts SET plan = ? WHERE id = ?")
            .bind(plan.as_str())
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
