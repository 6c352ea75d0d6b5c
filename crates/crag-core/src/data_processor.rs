//! Corpus preparation: load complaint rows, clean narratives, draw a stratified
//! sample and split narratives into overlapping chunks for indexing.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use tracing::info;

use crate::error::{Error, Result};
use crate::types::Chunk;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

const BOILERPLATE: [&str; 3] = [
    "i am writing to file a complaint",
    "this is a complaint about",
    "please investigate my complaint",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplaintRecord {
    pub complaint_id: String,
    pub product: String,
    pub narrative: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between neighbouring chunks.
    pub chunk_overlap: usize,
    pub sample_size: usize,
    pub seed: u64,
    pub text_column: String,
    pub id_column: String,
    pub product_column: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            sample_size: 12_000,
            seed: 42,
            text_column: "Consumer complaint narrative".to_string(),
            id_column: "Complaint ID".to_string(),
            product_column: "Product".to_string(),
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunking.chunk_size must be positive".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

pub struct DataProcessor {
    chunking_config: ChunkingConfig,
    url_re: Regex,
    punct_re: Regex,
    space_re: Regex,
}

impl Default for DataProcessor {
    fn default() -> Self {
        Self::new(ChunkingConfig::default())
    }
}

impl DataProcessor {
    pub fn new(chunking_config: ChunkingConfig) -> Self {
        Self {
            chunking_config,
            url_re: Regex::new(r"http\S+|www\S+").expect("static regex"),
            punct_re: Regex::new(r"[^\w\s]").expect("static regex"),
            space_re: Regex::new(r"\s+").expect("static regex"),
        }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.chunking_config
    }

    /// Read complaint rows from a CSV export. Rows whose narrative is blank are skipped.
    pub fn load_complaints(&self, path: &Path) -> Result<Vec<ComplaintRecord>> {
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| Error::NotFound(format!("{}: {}", path.display(), e)))?;
        let headers = reader.headers().map_err(csv_err)?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| Error::InvalidInput(format!("missing column '{}' in {}", name, path.display())))
        };
        let text_idx = column(&self.chunking_config.text_column)?;
        let id_idx = column(&self.chunking_config.id_column)?;
        let product_idx = column(&self.chunking_config.product_column)?;

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row.map_err(csv_err)?;
            let narrative = row.get(text_idx).unwrap_or_default();
            if narrative.trim().is_empty() {
                continue;
            }
            records.push(ComplaintRecord {
                complaint_id: row.get(id_idx).unwrap_or_default().to_string(),
                product: row.get(product_idx).unwrap_or_default().to_string(),
                narrative: narrative.to_string(),
            });
        }
        info!(count = records.len(), path = %path.display(), "loaded complaints");
        Ok(records)
    }

    /// Lowercase, strip URLs and punctuation, collapse whitespace and drop
    /// boilerplate openers.
    pub fn clean_text(&self, text: &str) -> String {
        let lowered = text.to_lowercase();
        let no_urls = self.url_re.replace_all(&lowered, "");
        let no_punct = self.punct_re.replace_all(&no_urls, "");
        let mut cleaned = self.space_re.replace_all(&no_punct, " ").trim().to_string();
        for phrase in BOILERPLATE {
            cleaned = cleaned.replace(phrase, "");
        }
        cleaned.trim().to_string()
    }

    pub fn clean_records(&self, records: Vec<ComplaintRecord>) -> Vec<ComplaintRecord> {
        records
            .into_iter()
            .map(|r| ComplaintRecord { narrative: self.clean_text(&r.narrative), ..r })
            .filter(|r| !r.narrative.trim().is_empty())
            .collect()
    }

    /// Proportional sample per product. Each product contributes
    /// `floor(sample_size * group_len / total)` records picked with a seeded RNG.
    pub fn stratified_sample(&self, records: &[ComplaintRecord], sample_size: usize, seed: u64) -> Vec<ComplaintRecord> {
        let total = records.len();
        if total == 0 {
            return Vec::new();
        }
        let mut groups: BTreeMap<&str, Vec<&ComplaintRecord>> = BTreeMap::new();
        for r in records {
            groups.entry(r.product.as_str()).or_default().push(r);
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut sample = Vec::new();
        for (product, members) in groups {
            let take = ((sample_size as u128 * members.len() as u128) / total as u128) as usize;
            let take = take.min(members.len());
            let picked = members.choose_multiple(&mut rng, take).map(|r| (*r).clone());
            let before = sample.len();
            sample.extend(picked);
            tracing::debug!(product, taken = sample.len() - before, "stratum sampled");
        }
        info!(sampled = sample.len(), total, "stratified sample drawn");
        sample
    }

    /// Split one narrative into chunks of at most `chunk_size` characters.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
    }

    pub fn chunk_records(&self, records: &[ComplaintRecord]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for record in records {
            for piece in self.split_text(&record.narrative) {
                chunks.push(
                    Chunk::new(piece)
                        .with_field("complaint_id", record.complaint_id.clone())
                        .with_field("product", record.product.clone()),
                );
            }
        }
        info!(chunks = chunks.len(), complaints = records.len(), "chunked complaints");
        chunks
    }

    /// Load, clean, optionally sample and chunk a complaints CSV.
    pub fn process_file(&self, path: &Path, sample: bool) -> Result<Vec<Chunk>> {
        let records = self.clean_records(self.load_complaints(path)?);
        let records = if sample {
            self.stratified_sample(&records, self.chunking_config.sample_size, self.chunking_config.seed)
        } else {
            records
        };
        Ok(self.chunk_records(&records))
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let size = self.chunking_config.chunk_size;
        let (sep_idx, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, s)| s.is_empty() || text.contains(**s))
            .map(|(i, s)| (i, *s))
            .unwrap_or((separators.len().saturating_sub(1), ""));
        let remaining = separators.get(sep_idx + 1..).unwrap_or(&[]);

        let splits: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|s| !s.is_empty()).collect()
        };

        let mut out = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();
        for piece in splits {
            if char_len(piece) <= size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                out.extend(self.merge_splits(&fitting, separator));
                fitting.clear();
            }
            if remaining.is_empty() {
                out.push(piece.to_string());
            } else {
                out.extend(self.split_recursive(piece, remaining));
            }
        }
        if !fitting.is_empty() {
            out.extend(self.merge_splits(&fitting, separator));
        }
        out
    }

    fn merge_splits(&self, splits: &[&str], separator: &str) -> Vec<String> {
        let size = self.chunking_config.chunk_size;
        let overlap = self.chunking_config.chunk_overlap;
        let sep_len = char_len(separator);

        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;
        for &piece in splits {
            let len = char_len(piece);
            let joiner = if current.is_empty() { 0 } else { sep_len };
            if total + len + joiner > size && !current.is_empty() {
                push_joined(&mut docs, &current, separator);
                // Keep a tail of the previous chunk as overlap, as long as the next piece still fits.
                while total > overlap || (total > 0 && total + len + sep_len > size) {
                    let Some(first) = current.pop_front() else { break };
                    let dropped_joiner = if current.is_empty() { 0 } else { sep_len };
                    total = total.saturating_sub(char_len(first) + dropped_joiner);
                }
            }
            let joiner = if current.is_empty() { 0 } else { sep_len };
            current.push_back(piece);
            total += len + joiner;
        }
        push_joined(&mut docs, &current, separator);
        docs
    }
}

fn push_joined(docs: &mut Vec<String>, parts: &VecDeque<&str>, separator: &str) {
    let joined = parts.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn csv_err(e: csv::Error) -> Error {
    Error::InvalidInput(format!("csv: {}", e))
}
