//! gauge-release - release pipeline for the gauge system monitor.
//!
//! Drives parallel cross-platform builds from one version tag, collects
//! artifacts, and renders package manifests for each ecosystem.

use std::process;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Run CLI and get exit code
    let exit_code = match gauge_release::cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    process::exit(exit_code);
}
