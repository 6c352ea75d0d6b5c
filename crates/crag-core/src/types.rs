//! Domain types shared by the vector store, the retriever and the engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Structured chunk fields, rendered in key order.
pub type Meta = BTreeMap<String, String>;

/// A retrievable passage of a complaint narrative.
///
/// - `text`: the passage itself, embedded at index-build time
/// - `metadata`: structured fields carried along (e.g. `complaint_id`, `product`)
///
/// Chunks are produced once by corpus preparation and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    #[serde(default)]
    pub metadata: Meta,
}

impl Chunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), metadata: Meta::new() }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Flat rendering used in prompts and evaluation tables.
    ///
    /// Chunks without metadata render as their raw text. Structured chunks render
    /// as `field: value` pairs in key order followed by `text: ...`.
    pub fn render(&self) -> String {
        if self.metadata.is_empty() {
            return self.text.clone();
        }
        let mut parts: Vec<String> = self.metadata.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        parts.push(format!("text: {}", self.text));
        parts.join(", ")
    }
}

/// A chunk paired with its distance to the query. Lower is closer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub distance: f32,
}

/// Distance function fixed for the lifetime of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// `1 - dot(a, b)` over unit-norm vectors.
    #[default]
    Cosine,
    /// Squared Euclidean distance.
    L2,
}

impl Metric {
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Cosine => 1.0 - a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>(),
            Metric::L2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
        }
    }

    /// Whether vectors must be unit-norm for this metric to be meaningful.
    pub fn requires_unit_norm(self) -> bool {
        matches!(self, Metric::Cosine)
    }

    pub fn code(self) -> u8 {
        match self {
            Metric::Cosine => 1,
            Metric::L2 => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Metric::Cosine),
            2 => Some(Metric::L2),
            _ => None,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Cosine => f.write_str("cosine"),
            Metric::L2 => f.write_str("l2"),
        }
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" | "ip" | "inner_product" => Ok(Metric::Cosine),
            "l2" | "euclidean" => Ok(Metric::L2),
            other => Err(Error::InvalidConfig(format!("unknown metric '{}'", other))),
        }
    }
}

/// L2 norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Tolerance used when checking that a vector is unit-norm.
pub const UNIT_NORM_TOLERANCE: f32 = 1e-3;

pub fn is_unit_norm(v: &[f32]) -> bool {
    (l2_norm(v) - 1.0).abs() <= UNIT_NORM_TOLERANCE
}
