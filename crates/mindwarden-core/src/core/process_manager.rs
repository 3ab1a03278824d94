//! Process Supervisor - game server process lifecycle
//!
//! Launches the server, wires its stdin to the [`Console`](super::console::Console)
//! and its stdout to [`Server::ingest_line`], and relaunches it after a crash
//! for as long as the operator wants it running.

use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout, Command};
use tokio::sync::broadcast;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

use crate::core::server::Server;
use crate::semantic::strip_ansi;

/// Server process status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Stopped,
    Running,
    Restarting,
}

impl ProcessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Stopped => "stopped",
            ProcessStatus::Running => "running",
            ProcessStatus::Restarting => "restarting",
        }
    }
}

/// Supervisor event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Spawned { pid: Option<u32> },
    Exited { code: Option<i32> },
    Restarting { delay: Duration },
}

/// How to launch the server
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub program: String,
    pub args: Vec<String>,
    /// Wait before relaunching a process that exited on its own.
    pub restart_delay: Duration,
    /// Copy the server's output to our stdout.
    pub echo: bool,
}

impl LaunchOptions {
    /// `java -jar <jar>`
    pub fn java(jar: &Path, restart_delay: Duration) -> Self {
        Self {
            program: "java".to_string(),
            args: vec!["-jar".to_string(), jar.display().to_string()],
            restart_delay,
            echo: true,
        }
    }
}

/// Process Supervisor
///
/// Owns at most one server process at a time.
pub struct ProcessSupervisor {
    server: Arc<Server>,
    options: LaunchOptions,
    status: RwLock<ProcessStatus>,
    event_tx: broadcast::Sender<ProcessEvent>,
}

impl ProcessSupervisor {
    pub fn new(server: Arc<Server>, options: LaunchOptions) -> Self {
        let (event_tx, _) = broadcast::channel(16);
        Self {
            server,
            options,
            status: RwLock::new(ProcessStatus::Stopped),
            event_tx,
        }
    }

    /// Get event receiver
    pub fn subscribe(&self) -> broadcast::Receiver<ProcessEvent> {
        self.event_tx.subscribe()
    }

    pub fn status(&self) -> ProcessStatus {
        *self.status.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_status(&self, status: ProcessStatus) {
        *self.status.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = status;
    }

    /// Run the server until the operator stops it or Ctrl-C is pressed.
    pub async fn run(&self) -> Result<()> {
        loop {
            self.run_once().await?;

            if !self.server.wants_running() {
                info!("Server stopped, supervisor exiting");
                return Ok(());
            }

            let delay = self.options.restart_delay;
            self.set_status(ProcessStatus::Restarting);
            let _ = self.event_tx.send(ProcessEvent::Restarting { delay });

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted during restart delay");
                    self.server.request_shutdown();
                    self.set_status(ProcessStatus::Stopped);
                    return Ok(());
                }
            }
        }
    }

    /// Launch the server once and supervise it until it exits.
    /// Returns the exit code, if the process had one.
    pub async fn run_once(&self) -> Result<Option<i32>> {
        debug!(program = %self.options.program, args = ?self.options.args, "Launching server");

        let mut child = Command::new(&self.options.program)
            .args(&self.options.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to launch {}", self.options.program))?;

        let pid = child.id();
        let stdin = child.stdin.take().ok_or_else(|| anyhow!("No stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| anyhow!("No stdout"))?;

        self.set_status(ProcessStatus::Running);
        debug!(pid = ?pid, "Server process started");
        let _ = self.event_tx.send(ProcessEvent::Spawned { pid });

        let writer = tokio::spawn(write_commands(stdin, self.server.console().attach()));
        let reader = tokio::spawn(read_output(
            stdout,
            Arc::clone(&self.server),
            self.options.echo,
        ));

        let status = tokio::select! {
            status = child.wait() => status.context("Failed to wait for server process")?,
            _ = tokio::signal::ctrl_c() => {
                info!(pid = ?pid, "Interrupted, killing server process");
                self.server.request_shutdown();
                child.kill().await.ok();
                child.wait().await.context("Failed to reap server process")?
            }
        };

        // Output may still be buffered after exit.
        let _ = reader.await;
        self.server.console().detach();
        let _ = writer.await;

        self.server.process_exited();
        self.set_status(ProcessStatus::Stopped);

        let code = status.code();
        debug!(pid = ?pid, code = ?code, "Server process exited");
        let _ = self.event_tx.send(ProcessEvent::Exited { code });
        Ok(code)
    }
}

/// Drain the console channel into the process, one line per command.
async fn write_commands(mut stdin: ChildStdin, mut commands: UnboundedReceiver<String>) {
    while let Some(command) = commands.recv().await {
        let line = format!("{command}\n");
        if let Err(e) = stdin.write_all(line.as_bytes()).await {
            error!(command = %command, error = %e, "Write to server failed");
            break;
        }
        if let Err(e) = stdin.flush().await {
            error!(error = %e, "Flush to server failed");
            break;
        }
    }
}

/// Forward stdout line by line. Bytes are decoded lossily so one line in a
/// foreign encoding does not stop the stream.
async fn read_output(stdout: ChildStdout, server: Arc<Server>, echo: bool) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                let line = text.trim_end_matches(['\r', '\n']);
                if echo {
                    println!("{line}");
                }
                server.ingest_line(&strip_ansi(line));
            }
            Err(e) => {
                warn!(error = %e, "Reading server output failed");
                break;
            }
        }
    }
}
