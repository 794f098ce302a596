//! BabySquad CLI: build the knowledge index, chat, and evaluate.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use babysquad_coordinator::BabySquadConfig;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "babysquad")]
#[command(about = "Multi-agent parenting assistant", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to babysquad.toml (default: ./babysquad.toml if present)
    #[arg(short, long, global = true, env = "BABYSQUAD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load documents, split, embed and rebuild the knowledge index
    Ingest {
        /// Directory of .txt, .md and .pdf documents
        #[arg(short, long, default_value = "./data")]
        data: PathBuf,
    },
    /// Ask a single question
    Ask {
        question: String,
        /// Session to answer in (default: a new one)
        #[arg(short, long)]
        session: Option<String>,
        /// Answer with the single-agent baseline instead of the team
        #[arg(long)]
        baseline: bool,
    },
    /// Interactive conversation
    Chat {
        /// Resume an existing session
        #[arg(short, long)]
        session: Option<String>,
    },
    /// Print the stored history of a session
    History { session: String },
    /// List stored sessions
    Sessions,
    /// Compare the baseline with the specialist team using a judge model
    Eval {
        /// One question per line (default: built-in questions)
        #[arg(short, long)]
        questions: Option<PathBuf>,
        /// Write the report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,babysquad=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = BabySquadConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest { data } => commands::ingest(&config, &data).await,
        Commands::Ask {
            question,
            session,
            baseline,
        } => commands::ask(config, &question, session, baseline).await,
        Commands::Chat { session } => commands::chat(config, session).await,
        Commands::History { session } => commands::history(&config, &session).await,
        Commands::Sessions => commands::sessions(&config).await,
        Commands::Eval { questions, output } => {
            commands::eval(config, questions.as_deref(), output.as_deref()).await
        }
    }
}
