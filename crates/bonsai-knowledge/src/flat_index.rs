//! Exact flat L2 index with a small binary on-disk format.
//!
//! File layout (little-endian):
//! - Magic: "BFL2" (4 bytes)
//! - Version: u32 (must be 1)
//! - Dimension: u32
//! - Vector count: u64
//! - `count * dim` f32 values in insertion order

use bonsai_core::error::{BonsaiError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::math::{is_finite_vector, squared_l2};

const INDEX_MAGIC: &[u8; 4] = b"BFL2";
const INDEX_VERSION: u32 = 1;

/// Brute-force exact nearest-neighbour index under squared L2 distance.
///
/// Position `i` in the index is the `i`-th vector added.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    dim: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    pub fn new(dim: usize) -> Self {
        Self { dim, data: Vec::new() }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of indexed vectors.
    pub fn len(&self) -> usize {
        if self.dim == 0 { 0 } else { self.data.len() / self.dim }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a vector; its position is the previous `len()`.
    pub fn add(&mut self, vector: &[f32]) -> Result<usize> {
        if self.dim == 0 {
            return Err(BonsaiError::Data("cannot add to a zero-dimensional index".into()));
        }
        if vector.len() != self.dim {
            return Err(BonsaiError::dimension_mismatch(self.dim, vector.len()));
        }
        if !is_finite_vector(vector) {
            return Err(BonsaiError::Data("vector contains non-finite values".into()));
        }
        let position = self.len();
        self.data.extend_from_slice(vector);
        Ok(position)
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dim)?;
        self.data.get(start..start + self.dim)
    }

    /// Exact top-k search. Returns `(position, squared_distance)` sorted by
    /// ascending distance; equal distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dim {
            return Err(BonsaiError::dimension_mismatch(self.dim, query.len()));
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(i, v)| (i, squared_l2(query, v)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);
        Ok(scored)
    }

    /// Serialize into any writer.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(INDEX_MAGIC)?;
        w.write_u32::<LittleEndian>(INDEX_VERSION)?;
        w.write_u32::<LittleEndian>(self.dim as u32)?;
        w.write_u64::<LittleEndian>(self.len() as u64)?;
        for value in &self.data {
            w.write_f32::<LittleEndian>(*value)?;
        }
        Ok(())
    }

    /// Deserialize from any reader, validating the header and payload length.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)
            .map_err(|e| BonsaiError::Data(format!("index header unreadable: {e}")))?;
        if &magic != INDEX_MAGIC {
            return Err(BonsaiError::Data("not a flat L2 index file (bad magic)".into()));
        }

        let version = read_u32(r, "version")?;
        if version != INDEX_VERSION {
            return Err(BonsaiError::Data(format!(
                "unsupported index version {version} (expected {INDEX_VERSION})"
            )));
        }
        let dim = read_u32(r, "dimension")? as usize;
        let count = r
            .read_u64::<LittleEndian>()
            .map_err(|e| BonsaiError::Data(format!("index count unreadable: {e}")))?
            as usize;
        if dim == 0 && count > 0 {
            return Err(BonsaiError::Data("index declares vectors of dimension 0".into()));
        }

        let total = count
            .checked_mul(dim)
            .ok_or_else(|| BonsaiError::Data("index size overflows".into()))?;
        let byte_len = total
            .checked_mul(4)
            .ok_or_else(|| BonsaiError::Data("index size overflows".into()))?;

        // The header count is untrusted: only allocate for bytes actually present.
        let mut bytes = Vec::new();
        r.by_ref()
            .take(byte_len as u64)
            .read_to_end(&mut bytes)
            .map_err(|e| BonsaiError::Data(format!("index data unreadable: {e}")))?;
        if bytes.len() != byte_len {
            return Err(BonsaiError::Data(format!(
                "index truncated: expected {count} vectors of dim {dim}, found {} bytes of vector data",
                bytes.len()
            )));
        }
        let mut data = vec![0f32; total];
        bytes.as_slice().read_f32_into::<LittleEndian>(&mut data)?;

        Ok(Self { dim, data })
    }

    /// Write the index to `path`, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut w = BufWriter::new(File::create(path)?);
        self.write_to(&mut w)?;
        w.flush()?;
        Ok(())
    }

    /// Read an index previously written by [`FlatL2Index::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            BonsaiError::Data(format!("cannot open index {}: {e}", path.display()))
        })?;
        Self::read_from(&mut BufReader::new(file))
    }
}

fn read_u32<R: Read>(r: &mut R, what: &str) -> Result<u32> {
    r.read_u32::<LittleEndian>()
        .map_err(|e| BonsaiError::Data(format!("index {what} unreadable: {e}")))
}
