//! Interactive session: index several codebases and ask questions, switching
//! between projects without re-embedding.
//!
//! Lines starting with `:` are commands; anything else is a question for the
//! active project.
//!
//! | Command | Effect |
//! |---------|--------|
//! | `:index <archive.zip> [name]` | extract, index, and select a project |
//! | `:use <project>` | switch the active project |
//! | `:projects` | list loaded projects (`*` marks the active one) |
//! | `:clear` | remove extracted codebases and deselect; indexes are kept |
//! | `:help` | show commands |
//! | `:quit` | leave the session |

use std::io::Write;
use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::answer::Answerer;
use crate::config::Config;
use crate::error::{ErrorKind, RagError, Result};
use crate::pipeline;
use crate::registry::ProjectRegistry;

const HELP: &str = "\
Commands:
  :index <archive.zip> [name]   extract, index, and select a project
  :use <project>                switch the active project
  :projects                     list loaded projects
  :clear                        remove extracted codebases, keep indexes
  :help                         show this help
  :quit                         leave the session
Anything else is a question about the active project.";

/// Result of handling one input line.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Reply(String),
    Idle,
    Quit,
}

pub struct Session<'a> {
    config: &'a Config,
    registry: ProjectRegistry,
    answerer: Answerer,
}

impl<'a> Session<'a> {
    /// Start a session with every persisted project already loaded.
    pub fn new(config: &'a Config, answerer: Answerer) -> Result<Self> {
        let registry = ProjectRegistry::load_persisted(&config.workspace.vectorstore_dir())?;
        Ok(Self {
            config,
            registry,
            answerer,
        })
    }

    pub fn registry(&self) -> &ProjectRegistry {
        &self.registry
    }

    pub fn prompt(&self) -> String {
        match self.registry.active_name() {
            Some(name) => format!("{}> ", name),
            None => "> ".to_string(),
        }
    }

    pub async fn handle(&mut self, line: &str) -> Result<Outcome> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Outcome::Idle);
        }
        let Some(command) = line.strip_prefix(':') else {
            let index = self.registry.active()?;
            let answer = self.answerer.answer(line, index).await?;
            return Ok(Outcome::Reply(answer));
        };

        let mut args = command.split_whitespace();
        match args.next().unwrap_or_default() {
            "index" => {
                let archive = args.next().ok_or_else(|| {
                    RagError::InvalidInput("usage: :index <archive.zip> [name]".to_string())
                })?;
                let name = args.next();
                let (index, summary) = pipeline::index_archive(
                    self.config,
                    Path::new(archive),
                    name,
                    self.answerer.provider(),
                )
                .await?;
                self.registry.put(index);
                self.registry.select(&summary.project)?;
                let verb = if summary.reused { "loaded" } else { "indexed" };
                Ok(Outcome::Reply(format!(
                    "{} '{}': {} files, {} chunks",
                    verb, summary.project, summary.documents, summary.chunks
                )))
            }
            "use" => {
                let name = args.next().ok_or_else(|| {
                    RagError::InvalidInput("usage: :use <project>".to_string())
                })?;
                let index = self.registry.select(name)?;
                Ok(Outcome::Reply(format!(
                    "switched to '{}' ({} chunks)",
                    index.name(),
                    index.len()
                )))
            }
            "projects" => {
                if self.registry.is_empty() {
                    return Ok(Outcome::Reply("no projects indexed yet".to_string()));
                }
                let active = self.registry.active_name();
                let lines: Vec<String> = self
                    .registry
                    .names()
                    .into_iter()
                    .map(|n| {
                        let mark = if Some(n) == active { "*" } else { " " };
                        format!("{} {}", mark, n)
                    })
                    .collect();
                Ok(Outcome::Reply(lines.join("\n")))
            }
            "clear" => {
                pipeline::clear_workspace(self.config)?;
                self.registry.deselect();
                Ok(Outcome::Reply(
                    "session cleared; previous indexes retained".to_string(),
                ))
            }
            "help" | "h" | "?" => Ok(Outcome::Reply(HELP.to_string())),
            "quit" | "q" | "exit" => Ok(Outcome::Quit),
            other => Err(RagError::InvalidInput(format!(
                "unknown command ':{}' (try :help)",
                other
            ))),
        }
    }
}

/// Run the interactive session over stdin/stdout until `:quit` or EOF.
pub async fn run_session(config: &Config) -> anyhow::Result<()> {
    let answerer = Answerer::from_config(config)?;
    let mut session = Session::new(config, answerer)?;

    println!(
        "ragcode session ({} projects loaded). Type :help for commands.",
        session.registry().len()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}", session.prompt());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        match session.handle(&line).await {
            Ok(Outcome::Reply(text)) => println!("{}", text),
            Ok(Outcome::Idle) => {}
            Ok(Outcome::Quit) => break,
            Err(e) => report(&e),
        }
    }
    Ok(())
}

fn report(err: &RagError) {
    match err.kind() {
        ErrorKind::Input | ErrorKind::Retrieval => eprintln!("warning: {}", err),
        _ => eprintln!("error: {}", err),
    }
}
