use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use tracing_subscriber::EnvFilter;

use crate::artifact::loader::LoadState;
use crate::artifact::{predict_one, FeatureRow};

#[allow(dead_code)]
#[path = "../artifact/mod.rs"]
mod artifact;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the serialized dosage model
    #[arg(short, long, env, default_value = "dosage_model.json")]
    model_path: PathBuf,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the model the same way the service does and report the result
    Check,
    /// Run a single prediction offline
    Predict {
        /// Medicine name exactly as it appeared in the training data
        #[clap(long)]
        medicine: String,

        /// Patient weight in kilograms
        #[clap(long)]
        weight: f64,
    },
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("WARN")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let predictor = match LoadState::load(&args.model_path) {
        LoadState::Loaded(predictor) => predictor,
        LoadState::Failed(error) => {
            eprintln!("Model failed to load: {}", error);
            return Ok(ExitCode::FAILURE);
        }
    };

    match args.cmd {
        Commands::Check => {
            println!("Model loaded successfully: {}", predictor.describe());
        }
        Commands::Predict { medicine, weight } => {
            match predict_one(predictor.as_ref(), FeatureRow::new(weight, medicine)) {
                Ok(dosage) => println!("predicted_dosage_mg: {}", dosage),
                Err(err) => {
                    eprintln!("Error during prediction: {}", err);
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
