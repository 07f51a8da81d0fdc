use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use roster_core::DirectoryEvent;
use roster_server::ServerConfig;
use roster_store::Database;
use roster_telemetry::TelemetryConfig;
use tokio::sync::broadcast;

/// User registry with live presence over WebSocket.
#[derive(Debug, Parser)]
#[command(name = "roster", version)]
struct Cli {
    /// Port to listen on (0 picks a free port).
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// SQLite database file. Defaults to ~/.roster/roster.db.
    #[arg(long, env = "ROSTER_DB")]
    database: Option<PathBuf>,

    /// Directory of static client pages served for unmatched paths.
    #[arg(long, env = "ROSTER_STATIC_DIR")]
    static_dir: Option<PathBuf>,

    #[arg(long, env = "ROSTER_LOG_LEVEL", default_value = "info")]
    log_level: tracing::Level,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn database_path(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| dirs_home().join(".roster").join("roster.db"))
    }

    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            port: self.port,
            static_dir: self.static_dir.clone(),
            ..Default::default()
        }
    }

    fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            log_level: self.log_level,
            json: self.log_json,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    roster_telemetry::init_telemetry(&cli.telemetry_config())
        .context("failed to initialize logging")?;
    tracing::info!("Starting roster server");

    let db_path = cli.database_path();
    let db = Database::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;

    // User-directory notifications, fed by registration and drained by the
    // presence bridge.
    let (directory_tx, _) = broadcast::channel::<DirectoryEvent>(1024);

    let handle = roster_server::start(cli.server_config(), db, directory_tx)
        .await
        .context("failed to start server")?;
    tracing::info!(port = handle.port, "Roster server ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    tracing::info!("Shutting down");
    handle.shutdown().await;
    Ok(())
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}
