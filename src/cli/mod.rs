pub mod check;
pub mod describe;
pub mod run;
pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "sales-etl", version, about = "Load the daily sales CSV into the vendas table.")]
pub struct Cli {
    /// Log output format
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract, transform and load the sales CSV.
    Run {
        /// CSV file to load (default: $SALES_CSV, then settings)
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Connection id of the destination database
        #[arg(long)]
        conn: Option<String>,
        /// Fail on the first error instead of applying stage retry policies
        #[arg(long = "no-retries")]
        no_retries: bool,
    },
    /// Validate the CSV without touching the database.
    Check {
        /// CSV file to check (default: $SALES_CSV, then settings)
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Number of validated rows to preview
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Show what the destination table holds.
    Status {
        /// Connection id of the destination database
        #[arg(long)]
        conn: Option<String>,
        /// Number of recent rows to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Print schedule metadata and stage policies as JSON.
    Describe,
}
