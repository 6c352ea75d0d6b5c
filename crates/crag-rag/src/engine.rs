use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crag_core::config::Settings;
use crag_core::traits::{Embedder, Generator};
use crag_core::{Chunk, Error, Result, ScoredChunk};
use crag_embed::get_default_embedder;
use crag_generate::get_default_generator;
use crag_vector::{SharedStore, VectorStore};

use crate::prompt::PromptAssembler;
use crate::retriever::Retriever;
use crate::timeout::generate_with_timeout;

pub const EMPTY_QUESTION: &str = "Please enter a question.";

/// A generated answer and the chunks it was conditioned on.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<ScoredChunk>,
}

impl Answer {
    /// Bullet lines for the first `n` sources.
    pub fn format_sources(&self, n: usize) -> Vec<String> {
        self.sources.iter().take(n).map(|s| format_source(&s.chunk)).collect()
    }
}

pub fn format_source(chunk: &Chunk) -> String {
    if chunk.metadata.is_empty() {
        return format!("• {}", chunk.text);
    }
    format!(
        "• complaint_id: {}, product: {}",
        chunk.field("complaint_id").unwrap_or("N/A"),
        chunk.field("product").unwrap_or("N/A")
    )
}

/// Retrieval, prompt assembly and generation over one loaded store.
///
/// Created once at startup and shared by reference; `reload` swaps the store.
pub struct RagEngine {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    assembler: PromptAssembler,
    timeout: Option<Duration>,
    default_k: usize,
}

impl RagEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        store: VectorStore,
        assembler: PromptAssembler,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        check_dim(embedder.as_ref(), &store)?;
        let retriever = Retriever::new(embedder, Arc::new(SharedStore::new(store)));
        Ok(Self { retriever, generator, assembler, timeout, default_k: 5 })
    }

    /// Load embedder, generator and store described by `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let store = VectorStore::load(&settings.index_path(), &settings.metadata_path())?;
        if store.metric() != settings.retrieval.metric {
            return Err(Error::InvalidConfig(format!(
                "index was built with {} but retrieval.metric is {}",
                store.metric(),
                settings.retrieval.metric
            )));
        }
        let embedder: Arc<dyn Embedder> =
            Arc::from(get_default_embedder(settings).map_err(|e| Error::Embedding(format!("{:#}", e)))?);
        let generator: Arc<dyn Generator> =
            Arc::from(get_default_generator(settings).map_err(|e| Error::Generation(format!("{:#}", e)))?);
        let timeout = match settings.generation.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let engine = Self::new(embedder, generator, store, PromptAssembler::new(settings.prompt.clone()), timeout)?;
        info!(embedder = engine.retriever.embedder().id(), "rag engine ready");
        Ok(engine.with_default_k(settings.retrieval.default_k))
    }

    pub fn with_default_k(mut self, k: usize) -> Self {
        self.default_k = k.max(1);
        self
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    pub fn assembler(&self) -> &PromptAssembler {
        &self.assembler
    }

    pub fn retrieve(&self, question: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        self.retriever.retrieve(question, k)
    }

    pub fn answer(&self, question: &str, k: usize) -> Result<Answer> {
        if question.trim().is_empty() {
            return Err(Error::InvalidInput(EMPTY_QUESTION.into()));
        }
        if k == 0 {
            return Err(Error::InvalidInput("k must be positive".into()));
        }
        let start = Instant::now();
        let sources = self.retriever.retrieve(question, k)?;
        let prompt = self.assembler.build_prompt(question, &sources);
        let generated = generate_with_timeout(&self.generator, &prompt, self.timeout)?;
        if generated.trim().is_empty() {
            return Err(Error::Generation("generator returned empty output".into()));
        }
        let text = self.assembler.extract_answer(&prompt, &generated);
        if text.is_empty() {
            return Err(Error::Generation("generated text holds no answer".into()));
        }
        debug!(k, sources = sources.len(), elapsed_ms = start.elapsed().as_millis() as u64, "answered");
        Ok(Answer { text, sources })
    }

    /// Swap in a rebuilt store. In-flight requests finish on the old one.
    pub fn reload(&self, store: VectorStore) -> Result<()> {
        check_dim(self.retriever.embedder().as_ref(), &store)?;
        self.retriever.store().swap(store);
        Ok(())
    }

    pub fn store(&self) -> Arc<VectorStore> {
        self.retriever.store().snapshot()
    }
}

fn check_dim(embedder: &dyn Embedder, store: &VectorStore) -> Result<()> {
    if embedder.dim() != store.dim() {
        return Err(Error::InvalidConfig(format!(
            "embedder {} produces {} dimensions, index has {}",
            embedder.id(),
            embedder.dim(),
            store.dim()
        )));
    }
    Ok(())
}
