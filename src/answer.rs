//! Retrieval and answer assembly.
//!
//! The [`Answerer`] embeds a question, pulls the top-K chunks from a
//! [`ProjectIndex`], concatenates them into a context block, and asks the
//! completion service to answer from that context.

use std::sync::Arc;

use crate::archive;
use crate::completion::{
    ChatCompletionClient, ChatMessage, CompletionClient, CompletionRequest, Role,
};
use crate::config::{CompletionConfig, Config};
use crate::embedding::{self, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::index::ProjectIndex;
use crate::models::SearchHit;

pub struct Answerer {
    provider: Arc<dyn EmbeddingProvider>,
    client: Arc<dyn CompletionClient>,
    top_k: usize,
    completion: CompletionConfig,
}

impl Answerer {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        client: Arc<dyn CompletionClient>,
        top_k: usize,
        completion: CompletionConfig,
    ) -> Self {
        Self {
            provider,
            client,
            top_k: top_k.max(1),
            completion,
        }
    }

    /// Build the configured embedding provider and completion client.
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider: Arc<dyn EmbeddingProvider> =
            Arc::from(embedding::create_provider(&config.embedding)?);
        let client: Arc<dyn CompletionClient> =
            Arc::new(ChatCompletionClient::new(&config.completion)?);
        Ok(Self::new(
            provider,
            client,
            config.retrieval.top_k,
            config.completion.clone(),
        ))
    }

    /// The embedding provider queries are embedded with.
    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    /// Top-K chunks for `query`, best first.
    pub async fn retrieve(&self, query: &str, index: &ProjectIndex) -> Result<Vec<SearchHit>> {
        index.search(self.provider.as_ref(), query, self.top_k).await
    }

    /// Answer `query` from the contents of `index`.
    ///
    /// Fails with [`RagError::InvalidInput`] for a blank query and with
    /// [`RagError::NoRelevantContent`] when retrieval returns nothing; the
    /// completion service is not contacted in either case. The returned text
    /// is the service's first choice, unmodified.
    pub async fn answer(&self, query: &str, index: &ProjectIndex) -> Result<String> {
        if query.trim().is_empty() {
            return Err(RagError::InvalidInput("question must not be empty".to_string()));
        }

        let hits = self.retrieve(query, index).await?;
        if hits.is_empty() {
            return Err(RagError::NoRelevantContent);
        }

        let context = build_context(&hits);
        if context.trim().is_empty() {
            return Err(RagError::InvalidInput(
                "retrieved context is empty".to_string(),
            ));
        }

        tracing::info!(
            project = index.name(),
            hits = hits.len(),
            context_chars = context.chars().count(),
            "requesting completion"
        );

        let request = self.request(&context, query);
        self.client.complete(&request).await
    }

    fn request(&self, context: &str, query: &str) -> CompletionRequest {
        CompletionRequest {
            model: self.completion.model.clone(),
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: self.completion.system_prompt.clone(),
                },
                ChatMessage {
                    role: Role::User,
                    content: format!("{}\n\nQuestion: {}", context, query),
                },
            ],
            temperature: self.completion.temperature,
            max_tokens: self.completion.max_tokens,
        }
    }
}

/// Run the ask command: answer one question against a persisted project.
pub async fn run_ask(config: &Config, project: &str, question: &str) -> anyhow::Result<()> {
    let project = archive::sanitize_project_name(project)?;
    let dir = config.workspace.index_dir(&project);
    if !dir.join("manifest.json").is_file() {
        return Err(RagError::IndexNotReady.into());
    }
    let index = ProjectIndex::load(&dir)?;
    let answerer = Answerer::from_config(config)?;
    let answer = answerer.answer(question, &index).await?;
    println!("{}", answer);
    Ok(())
}

/// Join hit texts, in the order given, with blank lines between them.
pub fn build_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|h| h.chunk.text())
        .collect::<Vec<_>>()
        .join("\n\n")
}
