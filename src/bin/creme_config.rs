//! Exports or imports the portable configuration of the CRM.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;

use creme_crm::db::establish_connection_pool;
use creme_crm::models::config::ServerConfig;
use creme_crm::repository::DieselRepository;
use creme_crm::services::config_transfer::{ImportersRegistry, export_document, import_document};

#[derive(Debug, Parser)]
#[command(name = "creme_config", about = "Transfer the CRM configuration between instances")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Writes the configuration document to a file or to stdout.
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validates then applies a configuration document.
    Import { file: PathBuf },
}

fn execute(repo: &DieselRepository, command: Command) -> Result<(), String> {
    match command {
        Command::Export { output } => {
            let document = export_document(repo)
                .and_then(|document| Ok(document.to_json()?))
                .map_err(|e| format!("Export failed: {e}"))?;
            match output {
                Some(path) => {
                    fs::write(&path, document)
                        .map_err(|e| format!("Cannot write {}: {e}", path.display()))?;
                    log::info!("Configuration exported to {}", path.display());
                }
                None => println!("{document}"),
            }
        }
        Command::Import { file } => {
            let raw = fs::read_to_string(&file)
                .map_err(|e| format!("Cannot read {}: {e}", file.display()))?;
            let summary = import_document(repo, &ImportersRegistry::with_defaults(), &raw)
                .map_err(|e| format!("Import failed: {e}"))?;
            println!("{}", serde_json::to_string_pretty(&summary).unwrap_or_default());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    dotenv().ok(); // Load .env file
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let cli = Cli::parse();

    let server_config = match ServerConfig::load() {
        Ok(server_config) => server_config,
        Err(err) => {
            log::error!("Error loading server config: {err}");
            return ExitCode::FAILURE;
        }
    };
    let pool = match establish_connection_pool(&server_config.database_url) {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("Failed to establish database connection: {e}");
            return ExitCode::FAILURE;
        }
    };
    let repo = DieselRepository::new(pool);

    match execute(&repo, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            log::error!("{message}");
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}
