use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lunardb::admission::{AdmissionGate, IdentityResolver};
use lunardb::auth::{ApiKeyManager, CompositeAuthenticator, JwtAuthenticator};
use lunardb::config::LunarConfig;
use lunardb::http::{AppState, HttpServer};
use lunardb::ratelimit::{ClientRegistry, ExpirySweeper};
use lunardb::store::Store;

#[derive(Parser, Debug)]
#[command(name = "lunardb")]
#[command(about = "In-memory key-value service with per-client rate limiting")]
#[command(version)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the HTTP listen address
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Print a signed bearer token for USER_ID and exit
    #[arg(long, value_name = "USER_ID")]
    issue_token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    let mut config = LunarConfig::load(args.config.as_deref())?;
    if let Some(addr) = args.addr {
        config.server.http_addr = addr;
    }
    config.validate()?;

    let jwt = JwtAuthenticator::from_config(&config.auth);

    if let Some(user_id) = args.issue_token {
        let jwt = jwt.context("auth.jwt_secret must be set to issue tokens")?;
        println!("{}", jwt.issue(&user_id)?);
        return Ok(());
    }

    info!("Starting LunarDB");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        http_addr = %config.server.http_addr,
        rate_per_sec = config.rate_limiting.rate_per_sec,
        burst = config.rate_limiting.burst,
        expiration_secs = config.rate_limiting.expiration_secs,
        sweep_interval_secs = config.rate_limiting.sweep_interval_secs,
        "Configuration loaded"
    );

    if config.rate_limiting.trust_forwarded_for {
        warn!("Client identity is taken from X-Forwarded-For; run behind a proxy that overwrites it");
    }

    // Composition root: every shared component is built here and handed down.
    let store = Arc::new(Store::new());
    let registry = Arc::new(ClientRegistry::from_config(&config.rate_limiting));
    let gate = Arc::new(AdmissionGate::new(Arc::clone(&registry), store));

    let api_keys = Arc::new(ApiKeyManager::with_keys(config.auth.api_keys.iter().cloned()));
    if config.auth.generate_initial_key {
        let key = ApiKeyManager::generate_key();
        api_keys.add_key(key.clone());
        info!(api_key = %key, "Initial API key generated");
    }
    if api_keys.is_empty() && jwt.is_none() {
        warn!("No API keys or JWT secret configured; every /api/v1 request will be rejected");
    }
    info!(
        api_keys = api_keys.len(),
        bearer_tokens = jwt.is_some(),
        "Authentication initialized"
    );

    let authenticator = Arc::new(CompositeAuthenticator::new(api_keys, jwt));
    let state = AppState::new(
        gate,
        authenticator,
        IdentityResolver::new(config.rate_limiting.trust_forwarded_for),
    );

    let sweeper = ExpirySweeper::from_config(registry, &config.rate_limiting).spawn();

    let server = HttpServer::new(config.server.http_addr, state);
    let result = server.serve_with_shutdown(shutdown_signal()).await;

    sweeper.shutdown().await;

    if let Err(e) = result {
        error!(error = %e, "LunarDB stopped with an error");
        return Err(e.into());
    }

    info!("LunarDB stopped");
    Ok(())
}

/// Text logs by default, JSON when `LUNARDB_LOG_FORMAT=json`. Filter via `RUST_LOG`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lunardb=info,tower_http=info"));

    let json = std::env::var("LUNARDB_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
