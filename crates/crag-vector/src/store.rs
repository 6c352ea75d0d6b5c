use std::io::{BufReader, Write};
use std::path::Path;

use crag_core::{Chunk, Error, Result};

use crate::codec::open;

/// Chunk payloads, positionally aligned with the vectors of an index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataStore {
    chunks: Vec<Chunk>,
}

impl MetadataStore {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self { chunks }
    }

    /// Read a JSON array of chunks.
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(open(path)?);
        let chunks: Vec<Chunk> = serde_json::from_reader(reader)?;
        Ok(Self { chunks })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec(&self.chunks)?;
        write_atomic(path, &bytes)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Chunk> {
        self.chunks.get(position)
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }
}

/// Write to a temp file in the target directory, then rename over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
