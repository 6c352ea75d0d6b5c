#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crag_core::traits::{Embedder, Generator};
use crag_core::Chunk;
use crag_embed::FakeEmbedder;
use crag_rag::{PromptAssembler, RagEngine};
use crag_vector::{build_store, BuildOptions, VectorStore};

pub const DIM: usize = 64;

/// Fake embedder that counts how often it is asked for vectors.
pub struct CountingEmbedder {
    inner: FakeEmbedder,
    pub calls: AtomicUsize,
}

impl CountingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { inner: FakeEmbedder::new(dim), calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for CountingEmbedder {
    fn id(&self) -> &str { "counting" }
    fn dim(&self) -> usize { self.inner.dim() }
    fn max_len(&self) -> usize { self.inner.max_len() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed_batch(texts)
    }
}

/// Generator with a fixed reply that records every prompt. Fails when the
/// prompt contains `fail_on` and panics when it contains `panic_on`.
pub struct ScriptedGenerator {
    reply: String,
    fail_on: Option<String>,
    panic_on: Option<String>,
    delay: Option<Duration>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn replying(reply: &str) -> Self {
        Self { reply: reply.to_string(), fail_on: None, panic_on: None, delay: None, prompts: Mutex::new(Vec::new()) }
    }

    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    pub fn panicking_on(mut self, needle: &str) -> Self {
        self.panic_on = Some(needle.to_string());
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if let Some(needle) = &self.panic_on {
            if prompt.contains(needle.as_str()) {
                panic!("generator blew up on {}", needle);
            }
        }
        if let Some(needle) = &self.fail_on {
            if prompt.contains(needle.as_str()) {
                anyhow::bail!("model crashed on {}", needle);
            }
        }
        Ok(self.reply.clone())
    }
}

pub fn complaint_chunks() -> Vec<Chunk> {
    [
        ("1", "Credit card", "charged a late fee on my credit card"),
        ("2", "Mortgage", "mortgage escrow account shortage"),
        ("3", "Money transfers", "money transfer never arrived"),
        ("4", "Debt collection", "debt collector keeps calling"),
    ]
    .into_iter()
    .map(|(id, product, text)| Chunk::new(text).with_field("complaint_id", id).with_field("product", product))
    .collect()
}

pub fn store_with(embedder: &dyn Embedder, chunks: Vec<Chunk>) -> VectorStore {
    build_store(chunks, embedder, &BuildOptions::default()).unwrap()
}

/// Engine over [`complaint_chunks`]. The store is built with its own
/// [`FakeEmbedder`] so `embedder` sees only query traffic.
pub fn engine(embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>) -> RagEngine {
    let store = store_with(&FakeEmbedder::new(embedder.dim()), complaint_chunks());
    RagEngine::new(embedder, generator, store, PromptAssembler::default(), None).unwrap()
}

/// Maps known questions to fixed vectors; anything else is an error.
pub struct TableEmbedder {
    dim: usize,
    table: Vec<(&'static str, Vec<f32>)>,
}

impl TableEmbedder {
    pub fn new(dim: usize, table: Vec<(&'static str, Vec<f32>)>) -> Self {
        Self { dim, table }
    }
}

impl Embedder for TableEmbedder {
    fn id(&self) -> &str { "table" }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|t| {
                self.table
                    .iter()
                    .find(|(q, _)| *q == t.as_str())
                    .map(|(_, v)| v.clone())
                    .ok_or_else(|| anyhow::anyhow!("no vector for {:?}", t))
            })
            .collect()
    }
}
