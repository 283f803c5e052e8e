//! User directory service
//!
//! Administrative read/update/delete over accounts plus admin provisioning.

use std::sync::Arc;

use crate::auth::credentials::PasswordHasher;
use crate::data::{
    AccountChanges, AccountPage, Database, EntityId, NewAccount, PublicAccount, Role, StoreError,
};
use crate::error::AppError;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const MIN_PASSWORD_CHARS: usize = 8;
const MAX_EMAIL_CHARS: usize = 254;

/// Trim, lowercase and shape-check an email address
pub fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_ascii_lowercase();
    let valid = email.len() <= MAX_EMAIL_CHARS
        && !email.chars().any(char::is_whitespace)
        && match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
            }
            None => false,
        };

    if valid {
        Ok(email)
    } else {
        Err(AppError::field_validation(
            "email",
            "value is not a valid email address",
        ))
    }
}

fn normalize_display_name(raw: &str) -> Result<String, AppError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::field_validation(
            "display_name",
            "display name cannot be empty",
        ));
    }
    Ok(name.to_string())
}

fn parse_user_id(raw: &str) -> Result<String, AppError> {
    EntityId::parse(raw)
        .map(|id| id.0)
        .ok_or_else(|| AppError::field_validation("user_id", "value is not a valid ULID"))
}

/// User directory service
#[derive(Clone)]
pub struct UserService {
    db: Arc<Database>,
    passwords: PasswordHasher,
}

impl UserService {
    pub fn new(db: Arc<Database>, passwords: PasswordHasher) -> Self {
        Self { db, passwords }
    }

    pub async fn get_user(&self, user_id: &str) -> Result<PublicAccount, AppError> {
        let id = parse_user_id(user_id)?;
        self.db
            .get_account_by_id(&id)
            .await?
            .map(PublicAccount::from)
            .ok_or_else(|| AppError::not_found("User", id))
    }

    /// One page of accounts, newest first
    ///
    /// # Arguments
    /// * `page` - 1-based, must be ≥ 1
    /// * `size` - between 1 and [`MAX_PAGE_SIZE`]
    pub async fn list_users(
        &self,
        page: u32,
        size: u32,
        role: Option<Role>,
    ) -> Result<AccountPage, AppError> {
        if page < 1 {
            return Err(AppError::field_validation(
                "page",
                "ensure this value is greater than or equal to 1",
            ));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&size) {
            return Err(AppError::field_validation(
                "size",
                format!("ensure this value is between 1 and {MAX_PAGE_SIZE}"),
            ));
        }

        let (accounts, total) = self.db.list_accounts(page, size, role).await?;
        let items = accounts.into_iter().map(PublicAccount::from).collect();
        Ok(AccountPage::new(items, total, page, size))
    }

    /// Provision an active admin with a local password
    ///
    /// # Errors
    /// - validation error for a malformed email, empty name or short password
    /// - conflict if the email is already registered
    pub async fn create_admin(
        &self,
        email: &str,
        display_name: &str,
        password: &str,
    ) -> Result<PublicAccount, AppError> {
        let email = normalize_email(email)?;
        let display_name = normalize_display_name(display_name)?;
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AppError::field_validation(
                "password",
                format!("password must be at least {MIN_PASSWORD_CHARS} characters"),
            ));
        }

        if self.db.get_account_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }

        let passwords = self.passwords.clone();
        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || passwords.hash(&password))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("password hashing task failed: {e}")))??;

        let account = self
            .db
            .create_account(&NewAccount {
                email,
                display_name,
                role: Role::Admin,
                password_hash: Some(password_hash),
                github_id: None,
                github_username: None,
                github_access_token: None,
            })
            .await
            .map_err(|e| match e {
                StoreError::Duplicate(_) => {
                    AppError::Conflict("User with this email already exists".to_string())
                }
                other => other.into(),
            })?;

        tracing::info!(account_id = %account.id, "Admin account created");
        Ok(account.into())
    }

    /// Apply an administrative partial update
    pub async fn update_user(
        &self,
        user_id: &str,
        mut changes: AccountChanges,
    ) -> Result<PublicAccount, AppError> {
        let id = parse_user_id(user_id)?;

        if let Some(email) = &changes.email {
            changes.email = Some(normalize_email(email)?);
        }
        if let Some(name) = &changes.display_name {
            changes.display_name = Some(normalize_display_name(name)?);
        }

        if changes.is_empty() {
            return self.get_user(&id).await;
        }

        let account = self
            .db
            .update_account(&id, &changes)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => AppError::not_found("User", &id),
                StoreError::Duplicate(_) => {
                    AppError::Conflict("User update conflicts with existing data".to_string())
                }
                other => other.into(),
            })?;

        tracing::info!(
            account_id = %account.id,
            role = %account.role,
            is_active = account.is_active,
            "Account updated"
        );
        Ok(account.into())
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<(), AppError> {
        let id = parse_user_id(user_id)?;
        self.db.delete_account(&id).await.map_err(|e| match e {
            StoreError::NotFound => AppError::not_found("User", &id),
            other => other.into(),
        })?;

        tracing::info!(account_id = %id, "Account deleted");
        Ok(())
    }
}
