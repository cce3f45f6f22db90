use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod commands;
mod config;
mod error;
mod event;

use commands::{build_orchestrator, run_cycle, run_event, run_status, run_step};
use config::CliConfig;
use credrotate_backends::FileSecretBackend;
use credrotate_core::{RotationError, SecretId};
use error::CliError;
use event::RotationEvent;

#[derive(Parser, Debug)]
#[command(name = "credrotate", version = "0.3.0")]
#[command(about = "Credrotate CLI - Staged database credential rotation")]
struct Cli {
    /// Config file (default: credrotate.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Json, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single rotation step
    Step {
        /// create_secret, set_secret, test_secret or finish_secret
        #[arg(long)]
        step: String,
        #[arg(long)]
        secret_id: String,
        /// Version token the step operates on
        #[arg(long)]
        token: String,
    },
    /// Run the step described by a rotation event JSON file
    Event {
        #[arg(long)]
        file: PathBuf,
    },
    /// Start a rotation and run all four steps
    Cycle {
        #[arg(long)]
        secret_id: String,
    },
    /// Print the staging map of a secret
    Status {
        #[arg(long)]
        secret_id: String,
    },
}

fn init_tracing(format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let env_filter = match "info".parse() {
        Ok(directive) => env_filter.add_directive(directive),
        Err(_) => env_filter,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}

fn parse_secret_id(raw: &str) -> Result<SecretId, CliError> {
    SecretId::parse(raw).map_err(|e| RotationError::validation(raw, e.to_string()).into())
}

async fn run(cli: Cli) -> Result<String, CliError> {
    let config = CliConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Step {
            step,
            secret_id,
            token,
        } => {
            let orchestrator = build_orchestrator(&config)?;
            let report = run_step(&orchestrator, &step, &secret_id, &token).await?;
            Ok(serde_json::to_string(&report)?)
        }
        Commands::Event { file } => {
            let event = RotationEvent::from_file(&file)?;
            let orchestrator = build_orchestrator(&config)?;
            let report = run_event(&orchestrator, &event).await?;
            Ok(serde_json::to_string(&report)?)
        }
        Commands::Cycle { secret_id } => {
            let secret_id = parse_secret_id(&secret_id)?;
            let orchestrator = build_orchestrator(&config)?;
            let report = run_cycle(&orchestrator, &secret_id).await?;
            Ok(serde_json::to_string(&report)?)
        }
        Commands::Status { secret_id } => {
            let secret_id = parse_secret_id(&secret_id)?;
            let backend = FileSecretBackend::open(&config.store_path)?;
            run_status(&backend, &secret_id).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match run(cli).await {
        Ok(output) => println!("{}", output),
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            std::process::exit(1);
        }
    }
}
