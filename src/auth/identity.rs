//! External identity → local account
//!
//! Resolution order for a GitHub profile:
//! 1. account with the same `github_id` (login, name and token refreshed)
//! 2. account with the profile email or the noreply fallback (GitHub
//!    identity attached)
//! 3. a new `client` account
//!
//! The active check runs once the three paths converge.

use super::oauth::GitHubProfile;
use crate::data::{Account, AccountChanges, Database, NewAccount, Role, StoreError};
use crate::error::AppError;

/// Map a GitHub profile onto exactly one local account
///
/// # Arguments
/// * `encrypted_token` - the provider access token, already encrypted
///
/// # Errors
/// - `Forbidden("Account is deactivated")` if the resolved account is inactive
/// - `Conflict` if a concurrent login created the account and it still
///   cannot be found
pub async fn resolve_github_identity(
    db: &Database,
    profile: &GitHubProfile,
    encrypted_token: &str,
) -> Result<Account, AppError> {
    let account = match find_and_link(db, profile, encrypted_token).await? {
        Some(account) => account,
        None => match create_client(db, profile, encrypted_token).await {
            Ok(account) => account,
            Err(StoreError::Duplicate(column)) => {
                tracing::info!(
                    github_id = profile.id,
                    column,
                    "Concurrent GitHub signup detected, retrying lookup"
                );
                find_and_link(db, profile, encrypted_token)
                    .await?
                    .ok_or_else(|| AppError::Conflict("GitHub account conflict".to_string()))?
            }
            Err(e) => return Err(e.into()),
        },
    };

    if !account.is_active {
        tracing::warn!(account_id = %account.id, "Deactivated account attempted GitHub login");
        return Err(AppError::forbidden("Account is deactivated"));
    }

    Ok(account)
}

async fn find_and_link(
    db: &Database,
    profile: &GitHubProfile,
    encrypted_token: &str,
) -> Result<Option<Account>, AppError> {
    if let Some(existing) = db.get_account_by_github_id(profile.id).await? {
        let changes = AccountChanges {
            display_name: Some(profile.display_name().to_string()),
            github_username: Some(profile.login.clone()),
            github_access_token: Some(encrypted_token.to_string()),
            ..Default::default()
        };
        let account = db.update_account(&existing.id, &changes).await?;
        tracing::debug!(account_id = %account.id, "GitHub identity matched by id");
        return Ok(Some(account));
    }

    let email = profile.email_or_noreply();
    if let Some(existing) = db.get_account_by_email(&email).await? {
        if existing.github_id.is_some_and(|id| id != profile.id) {
            tracing::warn!(
                account_id = %existing.id,
                github_id = profile.id,
                "Replacing GitHub identity on email-matched account"
            );
        }
        let changes = AccountChanges {
            github_id: Some(profile.id),
            github_username: Some(profile.login.clone()),
            github_access_token: Some(encrypted_token.to_string()),
            ..Default::default()
        };
        let account = db.update_account(&existing.id, &changes).await?;
        tracing::info!(account_id = %account.id, github_id = profile.id, "Linked GitHub identity by email");
        return Ok(Some(account));
    }

    Ok(None)
}

async fn create_client(
    db: &Database,
    profile: &GitHubProfile,
    encrypted_token: &str,
) -> Result<Account, StoreError> {
    let account = db
        .create_account(&NewAccount {
            email: profile.email_or_noreply(),
            display_name: profile.display_name().to_string(),
            role: Role::Client,
            password_hash: None,
            github_id: Some(profile.id),
            github_username: Some(profile.login.clone()),
            github_access_token: Some(encrypted_token.to_string()),
        })
        .await?;

    tracing::info!(account_id = %account.id, github_id = profile.id, "Created account from GitHub login");
    Ok(account)
}
