//! statbridge CLI - registry tooling and method calls against the interpreter.

mod analyze;
mod call;
mod colors;
mod generate;
mod methods;
mod session;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "statbridge")]
#[command(about = "Statistical methods over an embedded interpreter runtime")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Runtime configuration file (default: <config dir>/statbridge/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate typed wrappers from a method registry
    Generate {
        /// Registry file (default: the bundled registry)
        #[arg(long)]
        registry: Option<PathBuf>,

        /// Output path (default: stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// List registered methods
    Methods {
        /// Only methods owned by this worker
        #[arg(long)]
        worker: Option<u8>,

        /// Print descriptors as JSON
        #[arg(long)]
        json: bool,
    },

    /// Call one method with JSON arguments
    Call {
        /// Method id, e.g. one_sample_t_test
        method: String,

        /// Arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },

    /// Run an analysis over a JSON file of rows
    Analyze {
        /// Analysis id, e.g. welch_t_test
        analysis: String,

        /// JSON file holding an array of row objects
        #[arg(long)]
        rows: PathBuf,

        /// Role assignment, role=column[,column...] (repeatable)
        #[arg(short, long = "map", value_name = "ROLE=COLUMNS")]
        mappings: Vec<String>,

        /// Analysis options as a JSON object
        #[arg(long, default_value = "{}")]
        options: String,

        /// Report failures inside the result envelope instead of exiting with an error
        #[arg(long)]
        report: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Helper to format statbridge errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(core_err) = err.downcast_ref::<statbridge_core::Error>() {
            anyhow::anyhow!("{}", core_err.with_hint())
        } else if let Some(analysis_err) = err.downcast_ref::<statbridge::AnalysisError>() {
            match &analysis_err.source {
                statbridge::Failure::Core(core_err) => anyhow::anyhow!(
                    "`{}` failed: {}",
                    analysis_err.analysis,
                    core_err.with_hint()
                ),
                _ => err,
            }
        } else {
            err
        }
    };

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Generate { registry, out } => {
            generate::execute(registry.as_deref(), out.as_deref()).map_err(format_error)?;
        }

        Commands::Methods { worker, json } => {
            methods::execute(worker, json).map_err(format_error)?;
        }

        Commands::Call { method, args } => {
            call::execute(config, &method, &args).await.map_err(format_error)?;
        }

        Commands::Analyze {
            analysis,
            rows,
            mappings,
            options,
            report,
        } => {
            analyze::execute(config, &analysis, &rows, &mappings, &options, report)
                .await
                .map_err(format_error)?;
        }
    }

    Ok(())
}
