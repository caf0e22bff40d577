//! Climate Service - HTTP API
//!
//! Serves precipitation, station and temperature observations from the
//! Hawaii climate dataset:
//! 1. Loads configuration (climate.toml, .env, command-line flags)
//! 2. Opens the database and validates the station/measurement tables
//! 3. Serves the read-only JSON API until the process is terminated
//!
//! Usage:
//!   cargo run --release                                   # defaults from climate.toml
//!   cargo run --release -- --port 8080                    # override the port
//!   cargo run --release -- --database sqlite:///data/hawaii.sqlite
//!
//! Environment:
//!   DATABASE_URL - sqlite:///path or postgresql:// connection string
//!   RUST_LOG     - log filter (default: climate_service=info)

use std::path::PathBuf;

use clap::Parser;
use climate_service::{config, db, endpoint, store};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "climate_service", version, about = "Read-only HTTP API over the Hawaii climate dataset")]
struct Cli {
    /// Configuration file (default: climate.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Database URL, overriding climate.toml and DATABASE_URL
    #[arg(long)]
    database: Option<String>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Request worker threads
    #[arg(long)]
    workers: Option<usize>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "climate_service=info".into()),
        )
        .init();

    let cli = Cli::parse();

    println!("🌺 Climate Service");
    println!("==================\n");

    // Layer configuration: file, then environment, then flags
    let mut config = match config::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ {}\n", e);
            std::process::exit(1);
        }
    };
    if let Some(url) = cli.database {
        config.database.url = url;
    }
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(workers) = cli.workers {
        config.server.workers = workers;
    }
    if let Err(e) = config::validate(&config) {
        eprintln!("\n❌ {}\n", e);
        std::process::exit(1);
    }

    // Open the store and check the schema once, before accepting requests
    println!("📊 Opening database...");
    let store = match db::connect_and_verify(&config.database.url) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("\n❌ Startup failed: {}\n", e);
            std::process::exit(1);
        }
    };
    info!(backend = store.backend(), "database ready");
    println!("✓ Schema validated ({} backend)\n", store.backend());

    println!("🚀 Starting HTTP endpoint server...");
    if let Err(e) = endpoint::start_endpoint_server(&config.server, store::share(store)) {
        eprintln!("❌ Endpoint server error: {}", e);
        std::process::exit(1);
    }
}
