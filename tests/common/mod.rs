//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use base64::Engine as _;
use refactoriq::data::{PublicAccount, Role};
use refactoriq::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Code the GitHub stub accepts
pub const GOOD_CODE: &str = "good-code";
/// Access token the GitHub stub issues for [`GOOD_CODE`]
pub const GITHUB_TOKEN: &str = "gho_test_token";
/// CSRF state pinned by [`TestServer::github_callback`]
pub const OAUTH_STATE: &str = "test-oauth-state";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
    github_profile: Arc<Mutex<serde_json::Value>>,
}

impl TestServer {
    /// Create a new test server instance backed by a GitHub stub
    pub async fn new() -> Self {
        refactoriq::metrics::init_metrics();

        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let github_profile = Arc::new(Mutex::new(serde_json::json!({
            "id": 583231,
            "login": "octocat",
            "name": "The Octocat",
            "email": "octocat@github.com"
        })));
        let github_url = spawn_github_stub(github_profile.clone()).await;

        // Create test configuration
        let config = config::AppConfig {
            app: config::ApplicationConfig {
                name: "RefactorIQ".to_string(),
                version: "0.1.0-test".to_string(),
                environment: "test".to_string(),
            },
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                frontend_url: "http://localhost:3000".to_string(),
                cors_origins: vec!["http://localhost:3000".to_string()],
            },
            database: config::DatabaseConfig {
                path: db_path.clone(),
            },
            auth: config::AuthConfig {
                secret_key: "test-secret-key-that-is-32-bytes!".to_string(),
                algorithm: "HS256".to_string(),
                access_token_expire_minutes: 30,
                cookie_max_age_seconds: 30 * 24 * 60 * 60,
                encryption_key: base64::engine::general_purpose::STANDARD.encode([7_u8; 32]),
                password_hash: config::PasswordHashConfig {
                    memory_kib: 1024,
                    iterations: 1,
                    parallelism: 1,
                },
            },
            github: config::GitHubOAuthConfig {
                client_id: "test-client-id".to_string(),
                client_secret: "test-client-secret".to_string(),
                redirect_uri: "http://localhost:8000/api/v1/auth/github/callback".to_string(),
                scope: "repo".to_string(),
                authorize_url: "https://github.com/login/oauth/authorize".to_string(),
                token_url: format!("{github_url}/login/oauth/access_token"),
                api_url: github_url.clone(),
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = refactoriq::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
            github_profile,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Replace the profile the GitHub stub returns from `GET /user`
    pub fn set_github_profile(&self, profile: serde_json::Value) {
        *self.github_profile.lock().unwrap() = profile;
    }

    /// Provision an admin through the user service
    pub async fn create_admin(&self, email: &str, password: &str) -> PublicAccount {
        self.state
            .users
            .create_admin(email, "Test Admin", password)
            .await
            .unwrap()
    }

    /// Create a GitHub-linked client account by running the login flow
    pub async fn create_client(&self, github_id: i64, login: &str) -> PublicAccount {
        let profile = refactoriq::auth::GitHubProfile {
            id: github_id,
            login: login.to_string(),
            name: None,
            email: Some(format!("{login}@example.com")),
        };
        self.state
            .auth
            .authenticate_github(&profile, "ciphertext")
            .await
            .unwrap()
            .1
    }

    /// `Cookie` header value carrying a session for the given account
    pub fn session_cookie(&self, account_id: &str, role: Role) -> String {
        let token = self.state.auth.tokens().issue(account_id, role).unwrap();
        format!("{}={}", refactoriq::auth::SESSION_COOKIE, token)
    }

    /// Hit the OAuth callback as the browser that ran authorize would
    pub async fn github_callback(&self, code: &str) -> reqwest::Response {
        self.client
            .get(self.url(&format!(
                "/api/v1/auth/github/callback?code={code}&state={OAUTH_STATE}"
            )))
            .header("cookie", format!("oauth_state={OAUTH_STATE}"))
            .send()
            .await
            .unwrap()
    }

    /// Log in through the HTTP endpoint and return the `Cookie` header value
    pub async fn login_admin(&self, email: &str, password: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/v1/auth/admin/login"))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let token = set_cookie_value(&response, refactoriq::auth::SESSION_COOKIE)
            .expect("login sets the session cookie");
        format!("{}={}", refactoriq::auth::SESSION_COOKIE, token)
    }
}

/// Find the `Set-Cookie` header for `name`
pub fn set_cookie_header(response: &reqwest::Response, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&prefix))
        .map(ToOwned::to_owned)
}

/// Value of the `Set-Cookie` for `name`
pub fn set_cookie_value(response: &reqwest::Response, name: &str) -> Option<String> {
    let header = set_cookie_header(response, name)?;
    let pair = header.split(';').next()?;
    pair.split_once('=').map(|(_, value)| value.to_string())
}

async fn spawn_github_stub(profile: Arc<Mutex<serde_json::Value>>) -> String {
    let router = Router::new()
        .route(
            "/login/oauth/access_token",
            post(|Json(body): Json<serde_json::Value>| async move {
                if body["code"] == GOOD_CODE && body["client_id"] == "test-client-id" {
                    Json(serde_json::json!({
                        "access_token": GITHUB_TOKEN,
                        "token_type": "bearer",
                        "scope": "repo"
                    }))
                } else {
                    Json(serde_json::json!({
                        "error": "bad_verification_code",
                        "error_description": "The code passed is incorrect or expired."
                    }))
                }
            }),
        )
        .route(
            "/user",
            get(move |headers: HeaderMap| {
                let profile = profile.clone();
                async move {
                    let expected = format!("Bearer {GITHUB_TOKEN}");
                    let authorized = headers
                        .get("authorization")
                        .and_then(|value| value.to_str().ok())
                        == Some(expected.as_str());
                    if !authorized {
                        return StatusCode::UNAUTHORIZED.into_response();
                    }
                    let body = profile.lock().unwrap().clone();
                    Json(body).into_response()
                }
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}
