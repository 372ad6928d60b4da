use std::path::PathBuf;

use anyhow::Context;
use aquacrop_rs::Model;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Prepare AquaCrop climate input files from gridded weather data
#[derive(Parser, Debug)]
#[command(name = "aquacrop-prep")]
#[command(about = "Derive reference evapotranspiration and write AquaCrop climate files", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    config: PathBuf,

    /// Output directory, overriding `[OUTPUT] directory`
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Resolve methods and report what would be loaded, without reading data
    #[arg(long)]
    dry_run: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aquacrop_rs=info,aquacrop_prep=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let model = Model::from_config_file(&args.config)
        .with_context(|| format!("failed to set up run from {}", args.config.display()))?;

    if args.dry_run {
        let names: Vec<String> = model
            .required_quantities()
            .iter()
            .map(|q| q.to_string())
            .collect();
        tracing::info!(
            method = %model.plan().method(),
            quantities = %names.join(", "),
            n_points = model.domain().nxy(),
            "dry run, nothing written"
        );
        return Ok(());
    }

    let output = model.run().context("preprocessing failed")?;
    let written = model
        .write_aquacrop_input(&output, args.output.as_deref())
        .context("failed to write AquaCrop input")?;
    tracing::info!(n_files = written.len(), "done");
    Ok(())
}
