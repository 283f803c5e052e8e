//! Auth orchestration
//!
//! Composes the credential primitives, identity resolution and the token
//! service into the two login flows and session validation.

use std::sync::Arc;

use super::credentials::PasswordHasher;
use super::identity::resolve_github_identity;
use super::oauth::GitHubProfile;
use super::token::{Claims, TokenService};
use crate::data::{Database, PublicAccount, Role};
use crate::error::AppError;
use crate::metrics;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Login and session operations
#[derive(Clone)]
pub struct AuthService {
    db: Arc<Database>,
    tokens: TokenService,
    passwords: PasswordHasher,
}

impl AuthService {
    pub fn new(db: Arc<Database>, tokens: TokenService, passwords: PasswordHasher) -> Self {
        Self {
            db,
            tokens,
            passwords,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Email/password login for admin accounts
    ///
    /// # Check order
    /// 1. no account, or no local password → 401
    /// 2. role is not admin → 403
    /// 3. wrong password → 401
    /// 4. inactive → 403
    ///
    /// Unknown emails and wrong passwords produce the same message.
    pub async fn authenticate_admin(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(String, PublicAccount), AppError> {
        let result = self.admin_login(email, password).await;
        match &result {
            Ok((_, account)) => {
                metrics::record_login("admin", "success");
                tracing::info!(account_id = %account.id, "Admin login succeeded");
            }
            Err(e) => {
                metrics::record_login("admin", e.code());
                tracing::info!(reason = %e, "Admin login rejected");
            }
        }
        result
    }

    async fn admin_login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(String, PublicAccount), AppError> {
        let email = email.trim().to_ascii_lowercase();
        let account = self.db.get_account_by_email(&email).await.map_err(|e| {
            tracing::error!(error = %e, "Account lookup failed during admin login");
            AppError::unauthorized("Authentication failed")
        })?;

        let Some((account, stored_hash)) = account.and_then(|account| {
            let hash = account.password_hash.clone()?;
            Some((account, hash))
        }) else {
            self.burn_verification(password).await;
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        };

        if account.role != Role::Admin {
            return Err(AppError::forbidden("Admin access required"));
        }

        if !self.verify_password(password, stored_hash).await? {
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        }

        if !account.is_active {
            return Err(AppError::forbidden("Account is deactivated"));
        }

        let token = self.tokens.issue(&account.id, account.role)?;
        Ok((token, account.into()))
    }

    /// Login through a fetched GitHub profile
    ///
    /// # Arguments
    /// * `encrypted_token` - GitHub access token, already encrypted at rest
    pub async fn authenticate_github(
        &self,
        profile: &GitHubProfile,
        encrypted_token: &str,
    ) -> Result<(String, PublicAccount), AppError> {
        let account = match resolve_github_identity(&self.db, profile, encrypted_token).await {
            Ok(account) => account,
            Err(e) => {
                let mapped = match e {
                    AppError::Forbidden(message) => AppError::Forbidden(message),
                    AppError::Conflict(message) => {
                        tracing::warn!(github_id = profile.id, %message, "GitHub identity conflict");
                        AppError::unauthorized("GitHub account conflict")
                    }
                    other => {
                        tracing::error!(github_id = profile.id, error = ?other, "GitHub identity resolution failed");
                        AppError::unauthorized("GitHub authentication failed")
                    }
                };
                metrics::record_login("github", mapped.code());
                return Err(mapped);
            }
        };

        let token = self.tokens.issue(&account.id, account.role)?;
        metrics::record_login("github", "success");
        tracing::info!(account_id = %account.id, github_id = profile.id, "GitHub login succeeded");
        Ok((token, account.into()))
    }

    /// Decode a session token
    pub fn validate_session(&self, token: &str) -> Result<Claims, AppError> {
        self.tokens
            .validate(token)
            .ok_or_else(|| AppError::unauthorized("Invalid or expired token"))
    }

    /// Account behind a validated session
    pub async fn current_account(&self, claims: &Claims) -> Result<PublicAccount, AppError> {
        let account = self.db.get_account_by_id(&claims.sub).await.map_err(|e| {
            tracing::error!(error = %e, "Account lookup failed for session");
            AppError::unauthorized("Unable to retrieve current user")
        })?;

        account
            .map(PublicAccount::from)
            .ok_or_else(|| AppError::not_found("User", &claims.sub))
    }

    async fn verify_password(&self, password: &str, stored_hash: String) -> Result<bool, AppError> {
        let passwords = self.passwords.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || passwords.verify(&password, &stored_hash))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("password verification task failed: {e}")))
    }

    async fn burn_verification(&self, password: &str) {
        let passwords = self.passwords.clone();
        let password = password.to_string();
        if let Err(e) = tokio::task::spawn_blocking(move || passwords.verify_dummy(&password)).await {
            tracing::warn!(error = %e, "Dummy password verification task failed");
        }
    }
}
