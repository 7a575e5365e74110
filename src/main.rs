//! # ragcode CLI
//!
//! Index zipped codebases and ask questions about them.
//!
//! ## Usage
//!
//! ```bash
//! ragcode [--config ./ragcode.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragcode index <archive>` | Extract, chunk, embed, and persist a project index |
//! | `ragcode ask <project> "<question>"` | Answer a question from a persisted project |
//! | `ragcode projects` | List persisted projects |
//! | `ragcode stats <project>` | Show statistics for one project index |
//! | `ragcode clear` | Remove extracted codebases (indexes are kept) |
//! | `ragcode session` | Interactive loop with project switching |
//!
//! The completion API key is read from the variable named by
//! `completion.api_key_env` (default `GROQ_API_KEY`); a `.env` file in the
//! working directory is loaded first.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use ragcode::config::{self, Config};
use ragcode::{answer, pipeline, session, stats};

const DEFAULT_CONFIG: &str = "./ragcode.toml";

/// Retrieval-augmented Q&A over a zipped codebase.
#[derive(Parser)]
#[command(
    name = "ragcode",
    about = "Retrieval-augmented question answering over an uploaded codebase",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./ragcode.toml` when present; otherwise built-in
    /// defaults are used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a zipped codebase (or an extracted directory).
    ///
    /// An unchanged codebase reuses its persisted index; a changed one, or
    /// one indexed with a different embedding model, is rebuilt.
    Index {
        /// Path to a `.zip` archive or a directory.
        archive: PathBuf,

        /// Project name (defaults to the archive name before its first `.`).
        #[arg(long)]
        name: Option<String>,
    },

    /// Ask a question about an indexed project.
    Ask {
        /// Project name, as shown by `ragcode projects`.
        project: String,

        /// The question.
        question: String,
    },

    /// List persisted projects.
    Projects,

    /// Show statistics for a project index.
    Stats {
        project: String,
    },

    /// Remove extracted codebases. Persisted indexes are kept.
    Clear,

    /// Start an interactive session.
    Session,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => config::load_config(p),
        None if Path::new(DEFAULT_CONFIG).is_file() => {
            config::load_config(Path::new(DEFAULT_CONFIG))
        }
        None => {
            let cfg = Config::default();
            config::validate(&cfg)?;
            Ok(cfg)
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let cfg = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Index { archive, name } => {
            pipeline::run_index(&cfg, &archive, name.as_deref()).await?;
        }
        Commands::Ask { project, question } => {
            answer::run_ask(&cfg, &project, &question).await?;
        }
        Commands::Projects => {
            stats::run_projects(&cfg)?;
        }
        Commands::Stats { project } => {
            stats::run_stats(&cfg, &project)?;
        }
        Commands::Clear => {
            pipeline::run_clear(&cfg)?;
        }
        Commands::Session => {
            session::run_session(&cfg).await?;
        }
    }

    Ok(())
}
