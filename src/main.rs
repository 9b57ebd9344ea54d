use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use trash_classifier::{Args, Classifier};

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    // Nothing is read or decoded until the model is fully loaded.
    let model_dir = args.model_dir()?;
    let options = args.model_options();
    debug!(model_dir = %model_dir.display(), ?options, "loading classifier");
    let classifier = Classifier::from_dir(&model_dir, &options)?;

    let payload = args.read_payload(std::io::stdin().lock())?;
    let prediction = classifier
        .classify(&payload)
        .context("failed to classify image")?;

    println!("{prediction}");
    Ok(())
}

/// Logs go to stderr; stdout carries only the prediction.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
