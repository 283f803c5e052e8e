//! SQLite database operations
//!
//! All database access goes through this module. Every fallible method
//! returns [`StoreError`]; callers translate it into a domain error.

use chrono::Utc;
use sqlx::{Pool, QueryBuilder, Sqlite, SqlitePool};
use std::path::Path;
use thiserror::Error;

use super::models::*;
use crate::error::AppError;

/// Persistence-layer failure
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row matched the given key
    #[error("record not found")]
    NotFound,

    /// A uniqueness constraint rejected the write; carries the column name
    #[error("unique constraint violated on {0}")]
    Duplicate(&'static str),

    /// Anything else the driver reported
    #[error("database operation failed: {0}")]
    Operation(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_error) = &error {
            if db_error.is_unique_violation() {
                return StoreError::Duplicate(duplicate_column(db_error.message()));
            }
        }
        StoreError::Operation(error)
    }
}

/// SQLite reports `UNIQUE constraint failed: accounts.<column>`.
fn duplicate_column(message: &str) -> &'static str {
    if message.contains("accounts.email") {
        "email"
    } else if message.contains("accounts.github_id") {
        "github_id"
    } else if message.contains("accounts.github_username") {
        "github_username"
    } else {
        "record"
    }
}

const ACCOUNT_COLUMNS: &str = "id, email, display_name, role, password_hash, github_id, \
     github_username, github_access_token, is_active, created_at, updated_at";

/// Database connection pool wrapper
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Config(format!(
                    "cannot create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Database connection failed: {e}")))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Accounts: lookups
    // =========================================================================

    pub async fn get_account_by_id(&self, id: &str) -> Result<Option<Account>, StoreError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?");
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    pub async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = ?");
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    pub async fn get_account_by_github_id(
        &self,
        github_id: i64,
    ) -> Result<Option<Account>, StoreError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE github_id = ?");
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(github_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    /// List one page of accounts, newest first
    ///
    /// # Arguments
    /// * `page` - 1-based page number
    /// * `size` - page size
    /// * `role` - optional role filter
    ///
    /// # Returns
    /// The page's rows plus the total row count for the filter
    pub async fn list_accounts(
        &self,
        page: u32,
        size: u32,
        role: Option<Role>,
    ) -> Result<(Vec<Account>, i64), StoreError> {
        let role = role.map(|role| role.as_str());
        let offset = i64::from(page.saturating_sub(1)) * i64::from(size);

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE (?1 IS NULL OR role = ?1)")
                .bind(role)
                .fetch_one(&self.pool)
                .await?;

        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts \
             WHERE (?1 IS NULL OR role = ?1) \
             ORDER BY created_at DESC, id DESC \
             LIMIT ?2 OFFSET ?3"
        );
        let rows = sqlx::query_as::<_, Account>(&sql)
            .bind(role)
            .bind(i64::from(size))
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((rows, total))
    }

    // =========================================================================
    // Accounts: writes
    // =========================================================================

    /// Insert a new account
    ///
    /// Uniqueness of email, github_id and github_username is enforced by the
    /// schema; a violation is reported as [`StoreError::Duplicate`].
    pub async fn create_account(&self, new: &NewAccount) -> Result<Account, StoreError> {
        let now = Utc::now();
        let account = Account {
            id: EntityId::new().0,
            email: new.email.clone(),
            display_name: new.display_name.clone(),
            role: new.role,
            password_hash: new.password_hash.clone(),
            github_id: new.github_id,
            github_username: new.github_username.clone(),
            github_access_token: new.github_access_token.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO accounts (
                id, email, display_name, role, password_hash, github_id,
                github_username, github_access_token, is_active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.email)
        .bind(&account.display_name)
        .bind(account.role)
        .bind(&account.password_hash)
        .bind(account.github_id)
        .bind(&account.github_username)
        .bind(&account.github_access_token)
        .bind(account.is_active)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(account)
    }

    /// Apply a partial update and return the reloaded row
    ///
    /// # Errors
    /// [`StoreError::NotFound`] when no row has the given id
    pub async fn update_account(
        &self,
        id: &str,
        changes: &AccountChanges,
    ) -> Result<Account, StoreError> {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE accounts SET updated_at = ");
        query.push_bind(Utc::now());

        if let Some(email) = &changes.email {
            query.push(", email = ").push_bind(email.clone());
        }
        if let Some(display_name) = &changes.display_name {
            query.push(", display_name = ").push_bind(display_name.clone());
        }
        if let Some(role) = changes.role {
            query.push(", role = ").push_bind(role);
        }
        if let Some(is_active) = changes.is_active {
            query.push(", is_active = ").push_bind(is_active);
        }
        if let Some(github_id) = changes.github_id {
            query.push(", github_id = ").push_bind(github_id);
        }
        if let Some(github_username) = &changes.github_username {
            query
                .push(", github_username = ")
                .push_bind(github_username.clone());
        }
        if let Some(token) = &changes.github_access_token {
            query.push(", github_access_token = ").push_bind(token.clone());
        }

        query.push(" WHERE id = ").push_bind(id.to_string());

        let result = query.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        self.get_account_by_id(id)
            .await?
            .ok_or(StoreError::NotFound)
    }

    /// Hard-delete an account
    ///
    /// # Errors
    /// [`StoreError::NotFound`] when no row has the given id
    pub async fn delete_account(&self, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    pub async fn count_accounts(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
