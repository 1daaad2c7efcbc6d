// Agentflow CLI
//
// Design Decision: Use clap derive for ergonomic argument parsing.
// Design Decision: Support text/json/yaml output formats for scripting.
// Design Decision: Demo workflows run on scripted reasoning so they work offline.

mod commands;
mod output;
mod tools;

use agentflow_core::{ModelSettings, WorkflowConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "agentflow")]
#[command(about = "Agentflow CLI - Run multi-agent handoff workflows")]
#[command(version)]
pub struct Cli {
    /// Output format
    #[arg(long, short, default_value = "text", value_parser = ["text", "json", "yaml"])]
    pub output: String,

    /// Suppress non-essential output
    #[arg(long, short)]
    pub quiet: bool,

    /// Override the per-run turn budget
    #[arg(long)]
    pub max_turns: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Research a topic, write a report and review it across three agents
    Research {
        /// Topic of the report
        #[arg(default_value = "the history of the internet")]
        topic: String,

        /// Directory the report file is written to
        #[arg(long, env = "AGENTFLOW_DOCS_DIR")]
        docs_dir: Option<PathBuf>,
    },

    /// Compute (a + b) * c with calculator tools
    Calc {
        #[arg(default_value = "1")]
        a: f64,
        #[arg(default_value = "2")]
        b: f64,
        #[arg(default_value = "4")]
        c: f64,
    },

    /// Keep state across messages and through a checkpoint file
    State {
        /// Name the agent should remember
        #[arg(default_value = "Logan")]
        name: String,

        /// Where the run context is checkpointed
        #[arg(long, default_value = "run_context.json")]
        checkpoint: PathBuf,
    },

    /// Run a task that asks for human confirmation on stdin
    Confirm {
        /// Message sent to the task agent
        #[arg(default_value = "I want to proceed with the dangerous task.")]
        message: String,

        /// Correlation key of the confirmation request
        #[arg(long, default_value = "mohammed")]
        user: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agentflow_core=warn,agentflow=info".into()),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = WorkflowConfig::from_env()?;
    if let Some(max_turns) = cli.max_turns {
        config.max_turns = max_turns;
        config.validate()?;
    }

    let app = commands::App {
        config,
        settings: ModelSettings::from_env()?,
        output: output::OutputFormat::parse(&cli.output),
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Research { topic, docs_dir } => {
            commands::research::run(&app, topic, docs_dir).await
        }
        Commands::Calc { a, b, c } => commands::calc::run(&app, a, b, c).await,
        Commands::State { name, checkpoint } => {
            commands::state::run(&app, name, &checkpoint).await
        }
        Commands::Confirm { message, user } => {
            commands::confirm::run(&app, message, user).await
        }
    }
}
