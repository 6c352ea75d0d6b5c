use std::sync::Arc;

use tracing::debug;

use crag_core::traits::Embedder;
use crag_core::types::is_unit_norm;
use crag_core::{Error, Result, ScoredChunk};
use crag_vector::SharedStore;

/// Embeds a question and looks up its nearest chunks in the current store.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<SharedStore>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<SharedStore>) -> Self {
        Self { embedder, store }
    }

    /// Ranked `(chunk, distance)` pairs, in the index's order.
    pub fn retrieve(&self, question: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(Error::InvalidInput("k must be positive".into()));
        }
        let store = self.store.snapshot();
        let query = self
            .embedder
            .embed_query(question)
            .map_err(|e| Error::Embedding(format!("{:#}", e)))?;
        if query.len() != store.dim() {
            return Err(Error::InvalidConfig(format!(
                "embedder produced {} dimensions, index has {}",
                query.len(),
                store.dim()
            )));
        }
        if store.metric().requires_unit_norm() && !is_unit_norm(&query) {
            return Err(Error::Embedding("query embedding is not unit-norm".into()));
        }
        let hits = store.search(&query, k)?;
        debug!(k, hits = hits.len(), "retrieved");
        Ok(hits)
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }
}
