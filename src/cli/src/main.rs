//! CLI for the GitHub Issue Operator.
//!
//! This tool runs the controller that keeps one GitHub issue in sync with
//! each `IssueRequest` resource, and prints the resource definition.

use clap::{Parser, Subcommand};
use github_issue_operator::{load_config, ControllerError, IssueRequest};
use kube::CustomResourceExt;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// GitHub Issue Operator - Keep GitHub issues in sync with IssueRequest resources.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the controller until interrupted.
    Run {
        /// Path to the operator config file.
        #[arg(long, env = "ISSUE_OPERATOR_CONFIG")]
        config: Option<PathBuf>,

        /// Only watch this namespace (overrides the config file).
        #[arg(long)]
        namespace: Option<String>,
    },

    /// Print the IssueRequest CustomResourceDefinition as JSON.
    Crd,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    init_tracing();

    // Both kube and octocrab build rustls clients; pin the provider once.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    // Parse arguments
    let args = Args::parse();

    match args.command {
        Command::Crd => print_crd(),
        Command::Run { config, namespace } => match run(config, namespace).await {
            Ok(()) => ExitCode::from(0),
            Err(e) => {
                error!(error = %e, "Critical failure");
                ExitCode::from(2)
            }
        },
    }
}

/// Initializes tracing with environment filter support.
///
/// Sets up the global tracing subscriber with:
/// - Compact log formatting (single-line output)
/// - Log level filtering via `RUST_LOG` env var (defaults to "info")
fn init_tracing() {
    tracing_subscriber::registry()
        // Use compact formatting without module target paths for cleaner output
        .with(fmt::layer().compact().with_target(false))
        // Falls back to "info" level if RUST_LOG is not set or invalid
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

/// Main execution logic.
async fn run(config: Option<PathBuf>, namespace: Option<String>) -> Result<(), ControllerError> {
    let config = load_config(config.as_deref())?.with_namespace(namespace);
    github_issue_operator::run(config).await
}

fn print_crd() -> ExitCode {
    match serde_json::to_string_pretty(&IssueRequest::crd()) {
        Ok(json) => {
            println!("{json}");
            ExitCode::from(0)
        }
        Err(e) => {
            error!(error = %e, "Failed to serialize CRD");
            ExitCode::from(1)
        }
    }
}
