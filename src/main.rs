//! RefactorIQ binary entry point

use clap::{Parser, Subcommand};
use refactoriq::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const ADMIN_PASSWORD_ENV: &str = "REFACTORIQ_ADMIN_PASSWORD";

#[derive(Parser)]
#[command(name = "refactoriq")]
#[command(about = "Authentication backend with admin login and GitHub OAuth")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server (default)
    Serve,

    /// Provision an admin account with a local password
    ///
    /// The password is read from REFACTORIQ_ADMIN_PASSWORD, or from the
    /// first line of stdin when the variable is unset.
    CreateAdmin {
        /// Admin email address
        email: String,
        /// Display name
        display_name: String,
        #[arg(long, env = "REFACTORIQ_ADMIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
}

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging
/// 3. Initialize metrics
/// 4. Initialize AppState
/// 5. Run the selected command
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 1. Load configuration
    let config = config::AppConfig::load()?;

    // 2. Initialize tracing/logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.default_filter().into());

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    // 3. Initialize metrics
    refactoriq::metrics::init_metrics();

    tracing::info!(
        environment = %config.app.environment,
        frontend_url = %config.server.frontend_url,
        "Configuration loaded"
    );

    // 4. Initialize application state
    let state = AppState::new(config.clone()).await?;

    // 5. Run command
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state, &config).await,
        Command::CreateAdmin {
            email,
            display_name,
            password,
        } => create_admin(state, &email, &display_name, password).await,
    }
}

async fn serve(state: AppState, config: &config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Starting {} v{}...", config.app.name, config.app.version);

    let app = refactoriq::build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down {}", config.app.name);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "Failed to listen for shutdown signal");
    }
}

async fn create_admin(
    state: AppState,
    email: &str,
    display_name: &str,
    password: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let password = match password {
        Some(password) => password,
        None => read_password_from_stdin().await?,
    };

    let account = state
        .users
        .create_admin(email, display_name, &password)
        .await?;

    println!("Admin user '{}' created ({})", account.email, account.id);
    Ok(())
}

async fn read_password_from_stdin() -> Result<String, std::io::Error> {
    use tokio::io::{AsyncBufReadExt, BufReader};

    eprintln!("Password (read from stdin; set {ADMIN_PASSWORD_ENV} to skip):");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
