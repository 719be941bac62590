mod cli;
mod credentials;
mod logging;
mod prompt;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use triage_client::ClientError;
use triage_logging::triage_warn;

/// Longest wait for blocking work, such as a prompt still reading stdin,
/// once the command has returned.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

fn main() -> ExitCode {
    let args = cli::Cli::parse();
    logging::initialize(args.verbose, args.log_file.as_deref());

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: cannot start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };
    let code = runtime.block_on(run(args));
    shut_down(runtime);
    code
}

async fn run(args: cli::Cli) -> ExitCode {
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                triage_warn!("interrupted, cancelling");
                cancel.cancel();
            }
        }
    });

    match cli::run(args, cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if is_cancelled(&err) => {
            eprintln!("cancelled");
            ExitCode::from(130)
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Does not wait for blocking reads to finish; they are abandoned at exit.
fn shut_down(runtime: Runtime) {
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
}

fn is_cancelled(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<ClientError>())
        .any(ClientError::is_cancelled)
}
