//! GitHub OAuth client
//!
//! Implements the provider side of the authorization code flow: building
//! the authorize URL, exchanging a code for an access token and fetching
//! the user's profile. Nothing here touches the database.

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};

use crate::config::GitHubOAuthConfig;
use crate::error::AppError;

const GITHUB: &str = "github";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const STATE_BYTES: usize = 32;

/// Profile fields read from `GET /user`
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubProfile {
    pub id: i64,
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Only present when the user made their email public
    #[serde(default)]
    pub email: Option<String>,
}

impl GitHubProfile {
    /// Profile email, or the GitHub noreply address for the login; lowercased
    /// either way since local emails are stored lowercase
    pub fn email_or_noreply(&self) -> String {
        match self.email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() => email.to_ascii_lowercase(),
            _ => format!("{}@users.noreply.github.com", self.login).to_ascii_lowercase(),
        }
    }

    /// Display name, falling back to the login
    pub fn display_name(&self) -> &str {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => &self.login,
        }
    }
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
    redirect_uri: &'a str,
}

/// GitHub answers token errors with 200 and an `error` body
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// GitHub OAuth client
#[derive(Clone)]
pub struct GitHubOAuth {
    client: reqwest::Client,
    config: GitHubOAuthConfig,
}

impl GitHubOAuth {
    pub fn new(client: reqwest::Client, config: GitHubOAuthConfig) -> Self {
        Self { client, config }
    }

    /// URL the browser is sent to for consent
    pub fn authorize_url(&self, state: &str) -> Result<String, AppError> {
        let url = url::Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("scope", self.config.scope.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| AppError::Config(format!("github.authorize_url is invalid: {e}")))?;

        Ok(url.into())
    }

    /// Exchange an authorization code for an access token
    ///
    /// # Errors
    /// External-service error on transport failure, a non-2xx status or a
    /// body without `access_token`
    pub async fn exchange_code(&self, code: &str) -> Result<String, AppError> {
        let response = self
            .client
            .post(&self.config.token_url)
            .header(ACCEPT, "application/json")
            .timeout(REQUEST_TIMEOUT)
            .json(&TokenRequest {
                client_id: &self.config.client_id,
                client_secret: &self.config.client_secret,
                code,
                redirect_uri: &self.config.redirect_uri,
            })
            .send()
            .await
            .map_err(|e| AppError::external(GITHUB, format!("Failed to reach GitHub: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, "GitHub token exchange rejected");
            return Err(AppError::external(
                GITHUB,
                format!("GitHub token exchange failed with status {status}"),
            ));
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            AppError::external(GITHUB, format!("Invalid token response from GitHub: {e}"))
        })?;

        match body.access_token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(AppError::external(
                GITHUB,
                body.error_description
                    .unwrap_or_else(|| "Unknown error from GitHub".to_string()),
            )),
        }
    }

    /// Fetch the authenticated user's profile
    pub async fn fetch_profile(&self, access_token: &str) -> Result<GitHubProfile, AppError> {
        let url = format!("{}/user", self.config.api_url.trim_end_matches('/'));
        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/vnd.github.v3+json")
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::external(GITHUB, format!("Failed to reach GitHub: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, "GitHub profile request rejected");
            return Err(AppError::external(
                GITHUB,
                format!("GitHub user request failed with status {status}"),
            ));
        }

        response.json().await.map_err(|e| {
            AppError::external(GITHUB, format!("Invalid user response from GitHub: {e}"))
        })
    }
}

/// Random CSRF state for the authorize redirect
pub fn generate_state() -> String {
    let mut bytes = [0_u8; STATE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
