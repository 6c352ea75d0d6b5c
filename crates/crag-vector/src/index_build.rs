//! Offline build: embed chunks in batches, build the flat index, and smoke-test
//! the result before it is saved or swapped in.

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crag_core::config::Settings;
use crag_core::traits::Embedder;
use crag_core::types::Metric;
use crag_core::{Chunk, Error, Result};

use crate::corpus::VectorStore;
use crate::index::FlatIndex;
use crate::store::MetadataStore;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub metric: Metric,
    pub batch_size: usize,
    pub show_progress: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { metric: Metric::Cosine, batch_size: 64, show_progress: false }
    }
}

impl BuildOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            metric: settings.retrieval.metric,
            batch_size: settings.embedding.batch_size,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }
}

pub fn build_store(chunks: Vec<Chunk>, embedder: &dyn Embedder, options: &BuildOptions) -> Result<VectorStore> {
    if chunks.is_empty() {
        return Err(Error::InvalidInput("no chunks to index".into()));
    }
    if options.batch_size == 0 {
        return Err(Error::InvalidConfig("batch size must be positive".into()));
    }
    let dim = embedder.dim();
    info!(chunks = chunks.len(), dim, embedder = embedder.id(), metric = %options.metric, "building index");

    let pb = if options.show_progress {
        let pb = ProgressBar::new(chunks.len() as u64);
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut vectors = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(options.batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let embedded = embedder
            .embed_batch(&texts)
            .map_err(|e| Error::Embedding(format!("{:#}", e)))?;
        if embedded.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "embedder returned {} vectors for {} texts",
                embedded.len(),
                texts.len()
            )));
        }
        if let Some(bad) = embedded.iter().find(|v| v.len() != dim) {
            return Err(Error::Embedding(format!("embedder returned {} dimensions, declared {}", bad.len(), dim)));
        }
        vectors.extend(embedded);
        pb.inc(batch.len() as u64);
        debug!(done = vectors.len(), "embedded batch");
    }
    pb.finish_with_message("embedded");

    let index = FlatIndex::build(options.metric, dim, &vectors)?;
    VectorStore::new(index, MetadataStore::new(chunks))
}

/// Outcome of probing a store with its own vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationReport {
    pub probed: usize,
    pub self_hits: usize,
    pub k: usize,
}

impl ValidationReport {
    pub fn hit_rate(&self) -> f32 {
        if self.probed == 0 {
            return 1.0;
        }
        self.self_hits as f32 / self.probed as f32
    }

    pub fn is_clean(&self) -> bool {
        self.self_hits == self.probed
    }
}

/// Search with up to `sample` stored vectors (evenly spaced) and count how many
/// find their own row among the top `k`.
pub fn validate_store(store: &VectorStore, k: usize, sample: usize) -> Result<ValidationReport> {
    if k == 0 {
        return Err(Error::InvalidInput("k must be positive".into()));
    }
    let len = store.len();
    let probes = sample.min(len);
    let mut report = ValidationReport { probed: 0, self_hits: 0, k };
    if probes == 0 {
        return Ok(report);
    }
    let step = len / probes;
    for i in 0..probes {
        let position = i * step;
        let vector = store
            .index()
            .vector(position)
            .ok_or_else(|| Error::Integrity(format!("missing vector {}", position)))?;
        let hits = store.index().search(vector, k)?;
        report.probed += 1;
        if hits.iter().any(|n| n.position == position) {
            report.self_hits += 1;
        }
    }
    info!(probed = report.probed, self_hits = report.self_hits, k, "store validated");
    Ok(report)
}
