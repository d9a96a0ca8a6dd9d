mod cli;
mod db;
mod error;
mod extract;
mod fmt;
mod load;
mod models;
mod pipeline;
mod settings;
mod transform;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, LogFormat};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.with_target(false).init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let result = match cli.command {
        Commands::Run {
            csv,
            conn,
            no_retries,
        } => cli::run::run(csv, conn, no_retries),
        Commands::Check { csv, limit } => cli::check::run(csv, limit),
        Commands::Status { conn, limit } => cli::status::run(conn, limit),
        Commands::Describe => cli::describe::run(),
    };

    if let Err(e) = result {
        error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
