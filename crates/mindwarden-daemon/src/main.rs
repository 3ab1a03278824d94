//! mindwarden - keeps a Mindustry server running
//!
//! Responsibilities:
//! - Load the configuration and the message catalog
//! - Launch the game server and relaunch it after a crash
//! - Forward operator input from our stdin to the server
//! - Run the hourly save and the ten-minute maintenance job

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mindwarden_core::config::{DEFAULT_CONFIG_FILE, DEFAULT_PORT};
use mindwarden_core::core::scheduler;
use mindwarden_core::{
    Catalog, Config, Console, GameMode, LaunchOptions, ProcessEvent, ProcessSupervisor, SaveDir,
    Server, ThermalZone, VERSION,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "mindwarden", version, about = "Supervise a Mindustry dedicated server")]
struct Cli {
    /// Configuration file
    #[arg(long, env = "MINDWARDEN_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Host every map in this mode: survival, attack, sandbox or pvp
    #[arg(long)]
    mode: Option<GameMode>,

    /// Port the game server listens on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

fn log_level(rust_log: Option<String>, app_level: Option<String>) -> String {
    if let Some(v) = rust_log {
        v
    } else if let Some(v) = app_level {
        match v.as_str() {
            "silent" => "off".to_string(),
            "fatal" => "error".to_string(),
            other => other.to_string(),
        }
    } else {
        "info".to_string()
    }
}

fn log_filter() -> tracing_subscriber::EnvFilter {
    let level = log_level(
        std::env::var("RUST_LOG").ok(),
        std::env::var("MINDWARDEN_LOG_LEVEL").ok(),
    );
    tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

fn generated_name() -> String {
    format!("mindustry-{}", &Uuid::new_v4().simple().to_string()[..8])
}

/// Forward operator lines to the server. Runs on a plain thread so a
/// pending stdin read never holds up runtime shutdown.
fn spawn_operator_console(server: Arc<Server>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => server.operator_command(&line),
                Err(e) => {
                    warn!(error = %e, "Operator console read failed");
                    break;
                }
            }
        }
        debug!("Operator console closed");
    });
}

/// Log supervisor lifecycle events.
fn spawn_event_log(supervisor: Arc<ProcessSupervisor>) -> JoinHandle<()> {
    let mut events = supervisor.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ProcessEvent::Spawned { pid }) => {
                    info!(pid = ?pid, status = supervisor.status().as_str(), "Game server launched");
                }
                Ok(ProcessEvent::Exited { code }) => {
                    info!(code = ?code, status = supervisor.status().as_str(), "Game server exited");
                }
                Ok(ProcessEvent::Restarting { delay }) => {
                    warn!(delay_secs = delay.as_secs(), "Game server restarting");
                }
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Supervisor events skipped"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!(version = VERSION, "mindwarden starting");

    let config = Config::load_or_default(&cli.config)
        .with_context(|| format!("Invalid configuration {}", cli.config.display()))?;

    let catalog = Catalog::load(&config.locale_dir, &config.language);
    let settings = config.settings(generated_name(), cli.port, cli.mode);
    info!(name = %settings.name, port = settings.port, mode = ?settings.fixed_mode, "Server settings");

    let server = Arc::new(Server::new(
        settings,
        config.command_table(),
        Console::new(Arc::new(catalog)),
        Arc::new(SaveDir::new(&config.saves_dir)),
        Arc::new(ThermalZone::default()),
    ));

    spawn_operator_console(Arc::clone(&server));
    let jobs = scheduler::spawn(Arc::clone(&server));

    let supervisor = Arc::new(ProcessSupervisor::new(
        Arc::clone(&server),
        LaunchOptions::java(&config.jar_path, config.restart_delay()),
    ));
    let monitor = spawn_event_log(Arc::clone(&supervisor));
    let result = supervisor.run().await;

    monitor.abort();
    for job in jobs {
        job.abort();
    }
    info!("mindwarden stopped");
    result
}
