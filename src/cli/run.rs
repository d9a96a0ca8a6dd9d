use std::path::PathBuf;

use colored::Colorize;

use crate::error::Result;
use crate::pipeline::{self, Policies};
use crate::settings::{load_settings, RunConfig};

pub fn run(csv: Option<PathBuf>, conn: Option<String>, no_retries: bool) -> Result<()> {
    let config = RunConfig::from_env(&load_settings(), csv, conn);
    let policies = if no_retries {
        Policies::default().without_retries()
    } else {
        Policies::default()
    };

    let summary = pipeline::run(&config, &policies)?;

    println!(
        "{} {} extracted, {} valid, {} inserted, {} skipped (duplicates)",
        "Done.".green().bold(),
        summary.extracted,
        summary.valid,
        summary.load.inserted,
        summary.load.skipped,
    );
    println!("Database: {}", config.database.display());
    Ok(())
}
