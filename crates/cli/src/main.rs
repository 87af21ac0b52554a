//! Mindloop CLI: the main entry point.
//!
//! Commands:
//! - `run`: Push one message through the pipeline
//! - `plugins`: Show resolved plugin order and what each contributes

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mindloop_config::AppConfig;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "mindloop",
    about = "Mindloop — cognitive control loop for LLM-driven agents",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.mindloop/config.toml)
    #[arg(short, long, global = true, env = "MINDLOOP_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle a single message and print what happened
    Run {
        /// The message text
        #[arg(short, long)]
        message: String,

        /// Actions to run, in order (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        actions: Vec<String>,

        /// Reply text decided alongside the actions
        #[arg(short, long)]
        reply: Option<String>,

        /// JSON options passed to every action
        #[arg(short, long)]
        params: Option<String>,

        /// Room the message arrives in
        #[arg(long, default_value = "cli")]
        room: String,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List plugins in registration order
    Plugins,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;
    init_tracing(&config, cli.verbose);

    match cli.command {
        Commands::Run {
            message,
            actions,
            reply,
            params,
            room,
            json,
        } => {
            commands::run::run(
                config,
                commands::run::RunArgs {
                    message,
                    actions,
                    reply,
                    params,
                    room,
                    json,
                },
            )
            .await?
        }
        Commands::Plugins => commands::plugins::run(config).await?,
    }

    Ok(())
}

fn init_tracing(config: &AppConfig, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if config.logging.is_json() {
        builder.json().init();
    } else {
        builder.init();
    }
}
