use aihub_gateway::{config, logging, routes, state::AppState, store::CredentialStore};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use tracing::info;

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "aihub-gateway", about = "AIHub chat gateway", version)]
struct Cli {
    /// Path to TOML config file
    #[arg(short, long, default_value = "gateway.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway (default)
    Serve,
    /// Create an account in the users file without going through HTTP
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Print the session IDs a user owns
    Sessions {
        #[arg(long)]
        username: String,
    },
    /// List accounts with their session counts
    Users,
}

// ── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging first so config loading can report a missing file
    let log = logging::init();
    let cfg = config::load(&cli.config)?;
    log.apply(&cfg)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(cfg).await,
        Commands::Register { username, password } => register(cfg, &username, &password).await,
        Commands::Sessions { username } => sessions(cfg, &username).await,
        Commands::Users => users(cfg).await,
    }
}

// ── Serve ──────────────────────────────────────────────────────────────────

async fn serve(cfg: config::GatewayConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .context("invalid bind address")?;

    info!(
        "Passthrough allow-list: {:?}",
        cfg.passthrough.allow_prefixes
    );

    let state = AppState::from_config(cfg)
        .await
        .context("failed to build gateway state")?;
    info!("Engine: {}", state.engine.base_url());
    let app = routes::app(state);

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind TCP listener")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped.");
    Ok(())
}

// ── Graceful shutdown ──────────────────────────────────────────────────────

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install CTRL+C handler: {}", e);
        return std::future::pending().await;
    }
    info!("Shutdown signal received, stopping server...");
}

// ── Offline user management ────────────────────────────────────────────────

async fn register(
    cfg: config::GatewayConfig,
    username: &str,
    password: &str,
) -> anyhow::Result<()> {
    if username.is_empty() || password.is_empty() {
        anyhow::bail!("username and password must not be empty");
    }
    let store = CredentialStore::open(&cfg.users_file).await;
    store
        .register(username, password)
        .await
        .with_context(|| format!("failed to register {username}"))?;
    info!("User {} added to {}", username, store.path().display());
    Ok(())
}

async fn sessions(cfg: config::GatewayConfig, username: &str) -> anyhow::Result<()> {
    let store = CredentialStore::open(&cfg.users_file).await;
    for id in store.list_sessions(username).await {
        println!("{id}");
    }
    Ok(())
}

async fn users(cfg: config::GatewayConfig) -> anyhow::Result<()> {
    let store = CredentialStore::open(&cfg.users_file).await;
    for user in store.users().await {
        let kind = match user.password_hash {
            Some(_) => "hashed",
            None => "legacy",
        };
        println!("{}\t{}\t{} sessions", user.username, kind, user.sessions().len());
    }
    Ok(())
}
