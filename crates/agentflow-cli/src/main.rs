use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod app;

#[derive(Parser)]
#[command(name = "agentflow")]
#[command(about = "Run a content-marketing agent team from the terminal")]
#[command(version)]
struct Cli {
    /// LLM model to use
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Maximum routing decisions or task advances for the run
    #[arg(long, global = true)]
    ceiling: Option<usize>,

    /// Read settings from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Let a manager route the request between the team members
    Graph {
        /// What the team should produce
        request: String,
    },
    /// Run the research, blog and tweet tasks in order
    Crew {
        #[arg(short, long)]
        topic: String,
    },
    /// Write the default settings file if it does not exist and print its path
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut settings = match cli.config {
        Some(ref path) => agentflow_core::Settings::load_from(path)?,
        None => agentflow_core::Settings::load(),
    };

    if let Some(ref model) = cli.model {
        settings.llm.model = model.clone();
    }
    if let Some(ceiling) = cli.ceiling {
        settings.orchestration.ceiling = ceiling;
    }

    match cli.command {
        Command::Graph { request } => app::run_graph(&settings, &request).await?,
        Command::Crew { topic } => app::run_crew(&settings, &topic).await?,
        Command::InitConfig => app::init_config(&settings, cli.config.as_deref())?,
    }

    Ok(())
}
