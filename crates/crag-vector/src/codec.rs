//! Binary index blob.
//!
//! Layout (little-endian): magic `CRAGIDX\0`, version `u16`, metric `u8`,
//! reserved `u8`, dim `u32`, count `u64`, `count * dim` `f32` values, then a
//! BLAKE3 checksum of everything before it.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crag_core::types::Metric;
use crag_core::{Error, Result};

use crate::index::FlatIndex;

pub const MAGIC: &[u8; 8] = b"CRAGIDX\0";
pub const FORMAT_VERSION: u16 = 1;
pub const HEADER_LEN: usize = 24;
const CHECKSUM_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    pub metric: Metric,
    pub dim: usize,
    pub count: usize,
}

impl IndexHeader {
    /// Total blob size implied by the header.
    pub fn blob_len(&self) -> Option<usize> {
        self.count
            .checked_mul(self.dim)?
            .checked_mul(4)?
            .checked_add(HEADER_LEN + CHECKSUM_LEN)
    }
}

pub fn encode(index: &FlatIndex) -> Vec<u8> {
    let values = index.raw();
    let mut out = Vec::with_capacity(HEADER_LEN + values.len() * 4 + CHECKSUM_LEN);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.push(index.metric().code());
    out.push(0);
    out.extend_from_slice(&(index.dim() as u32).to_le_bytes());
    out.extend_from_slice(&(index.len() as u64).to_le_bytes());
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    let checksum = blake3::hash(&out);
    out.extend_from_slice(checksum.as_bytes());
    out
}

/// Parse the fixed-size header. `bytes` may be just the first `HEADER_LEN` bytes.
pub fn read_header(bytes: &[u8]) -> Result<IndexHeader> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::Integrity(format!("index blob truncated: {} bytes, header needs {}", bytes.len(), HEADER_LEN)));
    }
    if &bytes[..8] != MAGIC {
        return Err(Error::Integrity("not an index blob (bad magic)".into()));
    }
    let version = u16::from_le_bytes([bytes[8], bytes[9]]);
    if version != FORMAT_VERSION {
        return Err(Error::Integrity(format!("unsupported index format version {}", version)));
    }
    let metric = Metric::from_code(bytes[10])
        .ok_or_else(|| Error::Integrity(format!("unknown metric code {}", bytes[10])))?;
    let dim = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as usize;
    let mut count = [0u8; 8];
    count.copy_from_slice(&bytes[16..24]);
    let count = usize::try_from(u64::from_le_bytes(count))
        .map_err(|_| Error::Integrity("vector count does not fit in memory".into()))?;
    if dim == 0 {
        return Err(Error::Integrity("index dimension is zero".into()));
    }
    Ok(IndexHeader { metric, dim, count })
}

/// Header of an index file without reading its payload.
pub fn read_header_from_path(path: &Path) -> Result<IndexHeader> {
    let mut file = open(path)?;
    let mut buf = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    read_header(&buf[..filled])
}

pub fn decode(bytes: &[u8]) -> Result<FlatIndex> {
    let header = read_header(bytes)?;
    let expected = header
        .blob_len()
        .ok_or_else(|| Error::Integrity("declared index size overflows".into()))?;
    if bytes.len() != expected {
        return Err(Error::Integrity(format!(
            "index blob is {} bytes, header declares {} vectors of {} ({} bytes)",
            bytes.len(),
            header.count,
            header.dim,
            expected
        )));
    }
    let (body, checksum) = bytes.split_at(expected - CHECKSUM_LEN);
    if blake3::hash(body).as_bytes() != checksum {
        return Err(Error::Integrity("index checksum mismatch".into()));
    }
    let data: Vec<f32> = body[HEADER_LEN..]
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    FlatIndex::from_raw(header.metric, header.dim, data)
}

pub(crate) fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
        _ => Error::Io(e),
    })
}
