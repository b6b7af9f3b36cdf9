//! rpz-updater - blocklists in, response policy zone out.
//!
//! Exit codes: 0 when the zone was published, 1 when the run failed,
//! 2 when configuration or startup failed.

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match rpz_cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(rpz_cli::EXIT_STARTUP)
        }
    }
}
