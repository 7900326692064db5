//! Knowledge file loading and saving.
//!
//! Three on-disk artifacts:
//! - the chunk file: a JSON array of chunks, or an object whose values are chunks
//! - the embedded-chunk file: the same records with an `embedding` array
//! - the metadata sidecar: chunk records aligned with flat index positions

use bonsai_core::error::{BonsaiError, Result};
use bonsai_core::types::{Chunk, EmbeddedChunk};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;

/// Read-only knowledge file access.
pub struct KnowledgeStore;

impl KnowledgeStore {
    /// Load plain chunks from the chunk file.
    pub fn load_chunks(path: &Path) -> Result<Vec<Chunk>> {
        let records = read_records(path)?;
        decode_records(records, path)
    }

    /// Load chunks annotated with precomputed embeddings.
    pub fn load_embedded_chunks(path: &Path) -> Result<Vec<EmbeddedChunk>> {
        let records = read_records(path)?;
        decode_records(records, path)
    }

    /// Load the metadata sidecar written next to a flat index.
    pub fn load_metadata(path: &Path) -> Result<Vec<Chunk>> {
        Self::load_chunks(path)
    }

    /// Write chunks with embeddings as pretty-printed UTF-8 JSON.
    pub fn save_embedded_chunks(path: &Path, chunks: &[EmbeddedChunk]) -> Result<()> {
        write_json(path, chunks)
    }

    /// Write the metadata sidecar, one record per index position.
    pub fn save_metadata(path: &Path, chunks: &[Chunk]) -> Result<()> {
        write_json(path, chunks)
    }
}

/// Parse knowledge JSON text into a list of records.
///
/// An object is coerced to the list of its values, in document order.
pub fn parse_records(text: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| BonsaiError::Data(format!("knowledge file is not valid JSON: {e}")))?;
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(map) => Ok(map.into_iter().map(|(_, v)| v).collect()),
        other => Err(BonsaiError::Data(format!(
            "knowledge file must hold an array or object, found {}",
            json_kind(&other)
        ))),
    }
}

fn read_records(path: &Path) -> Result<Vec<Value>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        BonsaiError::Data(format!("cannot read knowledge file {}: {e}", path.display()))
    })?;
    parse_records(&text)
}

fn decode_records<T: DeserializeOwned>(records: Vec<Value>, path: &Path) -> Result<Vec<T>> {
    records
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            serde_json::from_value(record).map_err(|e| {
                BonsaiError::Data(format!("{}: record {i} is malformed: {e}", path.display()))
            })
        })
        .collect()
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text)?;
    Ok(())
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
