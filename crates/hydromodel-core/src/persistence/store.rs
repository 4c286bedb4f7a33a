//! Flat-file parameter store.
//!
//! # File Format
//!
//! One entry per line:
//!
//! ```text
//! ctrl::License::demo
//! stab::Viscosity Coefficients::0.5,0.05
//! gbc::Read GIS BC::C:/gis/2d_bc_model_HT_L.shp
//! gbc::signature::True
//! ```
//!
//! Reads return the first matching line. A `group::signature::True` line marks
//! the group as applied; it is written once and never removed.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use super::write_atomic;
use crate::codec::{self, Value};
use crate::registry::{group, Registry};

/// Reserved parameter name of the signature line.
pub const SIGNATURE_KEY: &str = "signature";
const SIGNATURE_VALUE: &str = "True";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not read model file {}: {source}", path.display())]
    LookupFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not write model file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Persistence adapter for one model file.
///
/// Holds no parameter state: every query reads the file again.
#[derive(Debug, Clone)]
pub struct ParameterStore {
    path: PathBuf,
    registry: Arc<Registry>,
}

fn line_prefix(group: &str, name: &str) -> String {
    format!("{group}::{name}::")
}

fn signature_line(group: &str) -> String {
    format!("{group}::{SIGNATURE_KEY}::{SIGNATURE_VALUE}")
}

impl ParameterStore {
    pub fn new(path: impl Into<PathBuf>, registry: Arc<Registry>) -> Self {
        Self {
            path: path.into(),
            registry,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the whole file; `None` if it does not exist yet.
    fn read(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::LookupFailure {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Decoded value of the first line for `(group, name)`, without fallback.
    pub fn lookup(&self, group: &str, name: &str) -> Result<Option<Value>, StoreError> {
        let Some(contents) = self.read()? else {
            return Ok(None);
        };

        let prefix = line_prefix(group, name);
        let value = contents
            .lines()
            .find_map(|line| line.trim().strip_prefix(prefix.as_str()))
            .map(codec::decode);

        Ok(value)
    }

    /// Stored value, else the registry default.
    ///
    /// An unreadable file is logged and yields `None`; callers fall back to the
    /// registry default themselves.
    pub fn get(&self, group: &str, name: &str) -> Option<Value> {
        match self.lookup(group, name) {
            Ok(Some(value)) => Some(value),
            Ok(None) => match self.registry.default_for(group, name) {
                Ok(value) => Some(value),
                Err(err) => {
                    log::warn!("No stored value and no default: {err}");
                    None
                }
            },
            Err(err) => {
                log::error!(
                    "Could not retrieve model value (group={group}, parameter={name}): {err}"
                );
                None
            }
        }
    }

    /// Insert or replace the value of `(group, name)`.
    pub fn set(&self, group: &str, name: &str, value: &Value) -> Result<(), StoreError> {
        let prefix = line_prefix(group, name);
        let new_line = format!("{prefix}{}", codec::encode(value));
        let contents = self.read()?.unwrap_or_default();

        if contents.lines().any(|line| line.trim().starts_with(&prefix)) {
            let mut rewritten = String::with_capacity(contents.len() + new_line.len());
            for line in contents.lines() {
                if line.trim().starts_with(&prefix) {
                    rewritten.push_str(&new_line);
                } else {
                    rewritten.push_str(line);
                }
                rewritten.push('\n');
            }
            return write_atomic(&self.path, &rewritten).map_err(|source| StoreError::Write {
                path: self.path.clone(),
                source,
            });
        }

        self.append(&contents, &new_line)
    }

    /// Mark `group` as applied. Idempotent.
    pub fn sign(&self, group: &str) -> Result<(), StoreError> {
        let sentinel = signature_line(group);
        let contents = self.read()?.unwrap_or_default();

        if contents.lines().any(|line| line.trim() == sentinel) {
            return Ok(());
        }

        self.append(&contents, &sentinel)
    }

    /// True if `group` carries a signature.
    ///
    /// `bce` also counts as signed once `gbc` is: applying the boundary
    /// conditions implies the boundary condition events.
    pub fn is_signed(&self, group: &str) -> bool {
        let contents = match self.read() {
            Ok(Some(contents)) => contents,
            Ok(None) => return false,
            Err(err) => {
                log::error!("Could not verify signature of {group}: {err}");
                return false;
            }
        };

        let has = |g: &str| {
            let sentinel = signature_line(g);
            contents.lines().any(|line| line.trim() == sentinel)
        };

        has(group) || (group == group::BCE && has(group::GBC))
    }

    /// Groups with an explicit signature line, in file order.
    pub fn signed_groups(&self) -> Result<Vec<String>, StoreError> {
        let contents = self.read()?.unwrap_or_default();
        let suffix = format!("::{SIGNATURE_KEY}::{SIGNATURE_VALUE}");

        let mut groups: Vec<String> = Vec::new();
        for line in contents.lines() {
            if let Some(group) = line.trim().strip_suffix(suffix.as_str()) {
                if !groups.iter().any(|g| g == group) {
                    groups.push(group.to_string());
                }
            }
        }
        Ok(groups)
    }

    /// Move the file to `new_path` (if it exists) and point the store there.
    pub(crate) fn relocate(&mut self, new_path: PathBuf) -> Result<(), StoreError> {
        if self.exists() {
            let write_err = |source| StoreError::Write {
                path: new_path.clone(),
                source,
            };
            if let Some(parent) = new_path.parent() {
                fs::create_dir_all(parent).map_err(write_err)?;
            }
            fs::rename(&self.path, &new_path).map_err(write_err)?;
        }
        self.path = new_path;
        Ok(())
    }

    fn append(&self, contents: &str, line: &str) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_err)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(write_err)?;

        if !contents.is_empty() && !contents.ends_with('\n') {
            writeln!(file).map_err(write_err)?;
        }
        writeln!(file, "{line}").map_err(write_err)?;

        Ok(())
    }
}
