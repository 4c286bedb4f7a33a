//! Attribute tables of vector GIS layers.
//!
//! The exporter only needs two things from a layer: the names of its
//! attribute fields and the values of one field. [`AttributeSource`] is that
//! capability; [`DbfAttributeSource`] implements it for shapefiles by reading
//! the dBase table (`.dbf`) that sits next to the `.shp`.
//!
//! # dBase Table Layout
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ Header (32 bytes)                        │  Offset: 0
//! │   [4..8]   record count: u32 LE          │
//! │   [8..10]  header length: u16 LE         │
//! │   [10..12] record length: u16 LE         │
//! ├──────────────────────────────────────────┤
//! │ Field descriptors (32 bytes each)        │  Offset: 32
//! │   [0..11]  name, NUL padded              │
//! │   [11]     type (C, N, F, L, D)          │
//! │   [16]     length                        │
//! ├──────────────────────────────────────────┤
//! │ 0x0D terminator                          │
//! ├──────────────────────────────────────────┤
//! │ Records (record length bytes each)       │  Offset: header length
//! │   [0]      deletion flag ('*' = deleted) │
//! │   fields, fixed width, space padded      │
//! └──────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

const HEADER_SIZE: usize = 32;
const FIELD_DESCRIPTOR_SIZE: usize = 32;
const FIELD_TERMINATOR: u8 = 0x0D;
const DELETED_FLAG: u8 = b'*';

#[derive(Debug, Error)]
pub enum AttributeError {
    #[error("could not read attribute table {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed attribute table {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("field {field} not found in {}", layer.display())]
    UnknownField { layer: PathBuf, field: String },
}

/// Read access to the attribute table of a layer.
pub trait AttributeSource {
    /// Field names in table order.
    fn field_names(&self, layer: &Path) -> Result<Vec<String>, AttributeError>;

    /// Values of `field`, one per feature, in feature order.
    fn field_values(&self, layer: &Path, field: &str) -> Result<Vec<String>, AttributeError>;
}

// ============================================================================
// In-memory tables
// ============================================================================

/// Attribute tables held in memory, keyed by layer path.
#[derive(Debug, Clone, Default)]
pub struct MemoryAttributeSource {
    layers: HashMap<PathBuf, Vec<(String, Vec<String>)>>,
}

impl MemoryAttributeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a field of `layer`.
    pub fn with_field(mut self, layer: impl Into<PathBuf>, field: &str, values: &[&str]) -> Self {
        let fields = self.layers.entry(layer.into()).or_default();
        let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        match fields.iter_mut().find(|(name, _)| name == field) {
            Some((_, existing)) => *existing = values,
            None => fields.push((field.to_string(), values)),
        }
        self
    }

    fn layer(&self, layer: &Path) -> Result<&[(String, Vec<String>)], AttributeError> {
        self.layers
            .get(layer)
            .map(Vec::as_slice)
            .ok_or_else(|| AttributeError::Io {
                path: layer.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "layer not loaded"),
            })
    }
}

impl AttributeSource for MemoryAttributeSource {
    fn field_names(&self, layer: &Path) -> Result<Vec<String>, AttributeError> {
        Ok(self.layer(layer)?.iter().map(|(name, _)| name.clone()).collect())
    }

    fn field_values(&self, layer: &Path, field: &str) -> Result<Vec<String>, AttributeError> {
        self.layer(layer)?
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, values)| values.clone())
            .ok_or_else(|| AttributeError::UnknownField {
                layer: layer.to_path_buf(),
                field: field.to_string(),
            })
    }
}

// ============================================================================
// dBase tables
// ============================================================================

/// Reads the `.dbf` attribute table of a shapefile layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DbfAttributeSource;

#[derive(Debug, Clone, PartialEq, Eq)]
struct DbfField {
    name: String,
    length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DbfTable {
    fields: Vec<DbfField>,
    records: Vec<Vec<String>>,
}

/// Path of the table that belongs to `layer` (`rivers.shp` → `rivers.dbf`).
pub fn table_path(layer: &Path) -> PathBuf {
    layer.with_extension("dbf")
}

impl DbfAttributeSource {
    fn read_table(&self, layer: &Path) -> Result<DbfTable, AttributeError> {
        let path = table_path(layer);
        let bytes = fs::read(&path).map_err(|source| AttributeError::Io {
            path: path.clone(),
            source,
        })?;
        parse_table(&bytes, &path)
    }
}

impl AttributeSource for DbfAttributeSource {
    fn field_names(&self, layer: &Path) -> Result<Vec<String>, AttributeError> {
        let table = self.read_table(layer)?;
        Ok(table.fields.into_iter().map(|f| f.name).collect())
    }

    fn field_values(&self, layer: &Path, field: &str) -> Result<Vec<String>, AttributeError> {
        let table = self.read_table(layer)?;
        let index = table
            .fields
            .iter()
            .position(|f| f.name == field)
            .ok_or_else(|| AttributeError::UnknownField {
                layer: layer.to_path_buf(),
                field: field.to_string(),
            })?;

        Ok(table
            .records
            .into_iter()
            .map(|mut record| std::mem::take(&mut record[index]))
            .collect())
    }
}

fn parse_table(bytes: &[u8], path: &Path) -> Result<DbfTable, AttributeError> {
    let malformed = |reason: &str| AttributeError::Malformed {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    if bytes.len() < HEADER_SIZE {
        return Err(malformed("file shorter than header"));
    }

    let record_count = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let header_length = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
    let record_length = u16::from_le_bytes([bytes[10], bytes[11]]) as usize;

    if header_length > bytes.len() || header_length < HEADER_SIZE + 1 {
        return Err(malformed("invalid header length"));
    }

    let mut fields = Vec::new();
    let mut offset = HEADER_SIZE;
    while offset < header_length && bytes[offset] != FIELD_TERMINATOR {
        let descriptor = bytes
            .get(offset..offset + FIELD_DESCRIPTOR_SIZE)
            .ok_or_else(|| malformed("truncated field descriptor"))?;
        let name_end = descriptor[..11].iter().position(|b| *b == 0).unwrap_or(11);
        fields.push(DbfField {
            name: String::from_utf8_lossy(&descriptor[..name_end]).trim().to_string(),
            length: descriptor[16] as usize,
        });
        offset += FIELD_DESCRIPTOR_SIZE;
    }

    let fields_width: usize = fields.iter().map(|f| f.length).sum();
    if record_length < fields_width + 1 {
        return Err(malformed("record length smaller than fields"));
    }

    let data_end = record_count
        .checked_mul(record_length)
        .and_then(|len| len.checked_add(header_length));
    if data_end.map_or(true, |end| end > bytes.len()) {
        return Err(malformed("truncated record"));
    }

    let mut records = Vec::with_capacity(record_count);
    for i in 0..record_count {
        let start = header_length + i * record_length;
        let record = &bytes[start..start + record_length];
        if record[0] == DELETED_FLAG {
            continue;
        }

        let mut values = Vec::with_capacity(fields.len());
        let mut pos = 1;
        for field in &fields {
            let raw = &record[pos..pos + field.length];
            values.push(String::from_utf8_lossy(raw).trim().to_string());
            pos += field.length;
        }
        records.push(values);
    }

    Ok(DbfTable { fields, records })
}
