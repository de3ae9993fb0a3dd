//! Offline overlay merger.
//!
//! For every `[[overlay.pairs]]` entry in `.patchrun/config.toml`, writes a
//! reviewable wrapper artifact holding the base patch, its hardened overlay, and the
//! union of their shell steps. Nothing is executed.

mod artifact;
mod batch;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use patchrun::io::config::{DEFAULT_CONFIG_PATH, OverlayPair, load_config};

use crate::batch::{PairOutcome, merge_pair};

#[derive(Parser)]
#[command(
    name = "overlay-merge",
    version,
    about = "Merge hardened overlay patches with their base patches into wrapper artifacts"
)]
struct Cli {}

fn main() -> ExitCode {
    let _cli = Cli::parse();
    patchrun::logging::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let root = std::env::current_dir()?;
    let config = load_config(&root.join(DEFAULT_CONFIG_PATH))?;
    let output_dir = config.resolve(&root, &config.overlay.output_dir);

    let mut merged = 0usize;
    for pair in &config.overlay.pairs {
        let resolved = OverlayPair {
            base: config.resolve(&root, &pair.base),
            overlay: config.resolve(&root, &pair.overlay),
        };
        match merge_pair(&resolved, &output_dir)? {
            PairOutcome::Merged(path) => {
                merged += 1;
                println!("Merged -> {}", path.display());
            }
            PairOutcome::Skipped { reason } => eprintln!("SKIP: {reason}"),
        }
    }
    println!("Done. Total merged: {merged}");
    Ok(())
}
