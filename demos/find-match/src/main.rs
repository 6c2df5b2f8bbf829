//! Runs one matchmaking session against an Open Match frontend and
//! prints the result. Exits 0 on a match, 1 otherwise.
//!
//! ```text
//! OPEN_MATCH_FRONTEND_SERVICE=localhost:50504 ASSIGNMENT_TIMEOUT=30 find-match
//! find-match --endpoint localhost:50504 --timeout 2.5
//! ```

use std::process::ExitCode;

use clap::Parser;
use matchforge::prelude::*;
use tokio::sync::oneshot;

#[derive(Parser, Debug)]
#[command(name = "find-match")]
#[command(about = "Find one match through an Open Match frontend")]
#[command(version)]
struct Cli {
    /// Frontend address (host:port)
    #[arg(long, env = "OPEN_MATCH_FRONTEND_SERVICE", default_value = matchforge::DEFAULT_FRONTEND)]
    endpoint: String,

    /// Seconds to wait for an assignment
    #[arg(long, env = "ASSIGNMENT_TIMEOUT", default_value_t = 60.0)]
    timeout: f64,
}

#[tokio::main]
async fn main() -> ExitCode {
    matchforge::init_tracing();
    let cli = Cli::parse();

    let request = match FindMatch::from_secs(cli.endpoint, cli.timeout) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let (dispatcher, mut queue) = caller_queue();
    let matchmaker = Matchmaker::new(GrpcConnector::new(), dispatcher);

    let (tx, mut rx) = oneshot::channel();
    let callbacks = Callbacks::new().on_outcome(move |outcome| {
        let _ = tx.send(outcome);
    });
    let handle = match matchmaker.start(request, callbacks) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // The notification runs here, on the main task.
    tokio::select! {
        _ = queue.run_next() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, cancelling");
            handle.cancel();
            queue.run_next().await;
        }
    }

    match rx.try_recv() {
        Ok(outcome) => {
            println!("{outcome}");
            if outcome.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(_) => {
            eprintln!("error: session ended without a result");
            ExitCode::FAILURE
        }
    }
}
