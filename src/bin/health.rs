use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use reqwest::Url;

/// Container health check against the dosage service status endpoint
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Status endpoint of the dosage service
    #[arg(env = "DOSAGE_SERVICE_STATUS_URL", default_value = "http://127.0.0.1:8000/")]
    url: Url,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let response = reqwest::blocking::get(args.url)?;
    let status = response.status();
    if !status.is_success() {
        eprintln!("Status check failed with {}: {}", status, response.text()?);
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}
