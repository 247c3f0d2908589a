mod backup;
mod db;
mod ipc;
mod ledger;
mod reports;
mod service;

use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "feebookd")]
#[command(about = "School fee ledger sidecar")]
struct Args {
    /// Workspace directory to open at startup instead of waiting for a
    /// workspace.select request.
    #[arg(long)]
    workspace: Option<PathBuf>,
}

fn main() {
    // Logs go to stderr; stdout carries the JSON-lines protocol.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("feebookd=info".parse().unwrap()),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut state = ipc::AppState {
        workspace: None,
        db: None,
    };

    if let Some(path) = args.workspace {
        match db::open_db(&path) {
            Ok(conn) => {
                info!(path = %path.display(), "workspace opened");
                state.workspace = Some(path);
                state.db = Some(conn);
            }
            Err(e) => warn!(error = ?e, "could not open --workspace path"),
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply with a request id; report and move on.
                warn!(error = %e, "unparseable request line");
                let _ = writeln!(
                    stdout,
                    "{{\"ok\":false,\"error\":{{\"code\":\"bad_json\",\"message\":\"{}\"}}}}",
                    e
                );
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
