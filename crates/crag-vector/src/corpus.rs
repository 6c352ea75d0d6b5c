use std::path::Path;
use std::sync::{Arc, RwLock};

use tracing::info;

use crag_core::types::Metric;
use crag_core::{Error, Result, ScoredChunk};

use crate::codec;
use crate::index::FlatIndex;
use crate::store::{write_atomic, MetadataStore};

/// An index and its metadata, guaranteed to have the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorStore {
    index: FlatIndex,
    metadata: MetadataStore,
}

impl VectorStore {
    pub fn new(index: FlatIndex, metadata: MetadataStore) -> Result<Self> {
        if index.len() != metadata.len() {
            return Err(Error::Integrity(format!(
                "index holds {} vectors but metadata holds {} chunks",
                index.len(),
                metadata.len()
            )));
        }
        Ok(Self { index, metadata })
    }

    pub fn load(index_path: &Path, metadata_path: &Path) -> Result<Self> {
        let metadata = MetadataStore::load(metadata_path)?;
        let header = codec::read_header_from_path(index_path)?;
        if header.count != metadata.len() {
            return Err(Error::Integrity(format!(
                "{} declares {} vectors but {} holds {} chunks",
                index_path.display(),
                header.count,
                metadata_path.display(),
                metadata.len()
            )));
        }
        let bytes = std::fs::read(index_path)?;
        let index = codec::decode(&bytes)?;
        let store = Self::new(index, metadata)?;
        info!(
            vectors = store.len(),
            dim = store.dim(),
            metric = %store.metric(),
            path = %index_path.display(),
            "vector store loaded"
        );
        Ok(store)
    }

    pub fn save(&self, index_path: &Path, metadata_path: &Path) -> Result<()> {
        write_atomic(index_path, &codec::encode(&self.index))?;
        self.metadata.save(metadata_path)?;
        info!(vectors = self.len(), path = %index_path.display(), "vector store saved");
        Ok(())
    }

    /// Nearest chunks to `query`, in index order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        self.index
            .search(query, k)?
            .into_iter()
            .map(|n| {
                let chunk = self.metadata.get(n.position).ok_or_else(|| {
                    Error::Integrity(format!("position {} outside metadata of {}", n.position, self.metadata.len()))
                })?;
                Ok(ScoredChunk { chunk: chunk.clone(), distance: n.distance })
            })
            .collect()
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.index.dim()
    }

    pub fn metric(&self) -> Metric {
        self.index.metric()
    }
}

/// The serving store. Readers take a snapshot; a rebuild swaps in a complete pair.
#[derive(Debug)]
pub struct SharedStore {
    inner: RwLock<Arc<VectorStore>>,
}

impl SharedStore {
    pub fn new(store: VectorStore) -> Self {
        Self { inner: RwLock::new(Arc::new(store)) }
    }

    pub fn snapshot(&self) -> Arc<VectorStore> {
        // The guarded value is a single Arc, so a poisoned lock still holds a whole pair.
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Replace the store, returning the previous one.
    pub fn swap(&self, store: VectorStore) -> Arc<VectorStore> {
        let next = Arc::new(store);
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let previous = std::mem::replace(&mut *guard, next);
        info!(vectors = guard.len(), previous = previous.len(), "vector store swapped");
        previous
    }
}
