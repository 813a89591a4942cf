//! Aspatal Server - hospital administration backend
//!
//! Serves the identity, session and clinic API over HTTP.

use anyhow::{Context, Result};
use aspatal_core::{init_logging, Config};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "aspatal-server")]
#[command(about = "Aspatal - hospital administration backend")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// HTTP bind address
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// HTTP port
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Enable debug logging
    #[arg(short = 'd', long)]
    debug: bool,

    /// Session token signing key
    #[arg(long, env = "ASPATAL_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Write a default configuration file to this path and exit
    #[arg(long, value_name = "PATH")]
    init_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(path) = &args.init_config {
        Config::write_default(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let mut config = Config::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(secret) = args.jwt_secret {
        config.auth.jwt_secret = secret;
    }
    config.validate()?;

    init_logging(&config.logging, args.debug)?;

    info!("╔═══════════════════════════════════════════════════════════╗");
    info!("║           Aspatal Server v{:<8} Starting                ║", env!("CARGO_PKG_VERSION"));
    info!("╚═══════════════════════════════════════════════════════════╝");
    info!("");
    info!("Configuration:");
    info!("  • Listen Address: {}:{}", config.server.host, config.server.port);
    info!("  • CORS Origins: {}", config.server.cors_origins.join(", "));
    info!("  • Session TTL: {} minutes", config.auth.token_ttl_minutes);
    info!("  • Verification TTL: {} hours", config.auth.verification_ttl_hours);
    info!("  • Notifier: {:?}", config.notify.backend);
    info!("  • Debug Mode: {}", args.debug);
    info!("");

    aspatal_server::serve(config).await
}
