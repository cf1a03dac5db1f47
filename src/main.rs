mod bank;
mod config;
mod db;
mod export;
mod ipc;
mod report;
mod scoring;
mod session;
mod store;

use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Workspace directory to open at startup.
    #[arg(long, env = "VSJXD_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Log filter directives, e.g. `vsjxd=debug`.
    #[arg(long, env = "VSJXD_LOG", default_value = "vsjxd=info")]
    log_filter: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout carries IPC responses; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log_filter))
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();

    let mut state = ipc::AppState::default();
    if let Some(ws) = args.workspace {
        if let Err(e) = state.open_workspace(ws.clone()) {
            tracing::error!(workspace = %ws.display(), error = ?e, "startup workspace failed to open");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                tracing::warn!(error = %e, "unparsable request line");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                writeln!(stdout, "{}", resp)?;
                stdout.flush()?;
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        writeln!(stdout, "{}", resp)?;
        stdout.flush()?;
    }

    tracing::info!("stdin closed, shutting down");
    Ok(())
}
