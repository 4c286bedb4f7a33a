//! Persistence layer for model parameters and event definitions.
//!
//! # File Locations
//!
//! Everything lives under the workspace root:
//!
//! ```text
//! <root>/
//! ├── hydromodel.json              # Workspace settings (optional)
//! └── models/
//!     ├── <model>.hy2model         # Parameter store (group::name::value lines)
//!     └── <model>.events           # Event definitions (JSON)
//! ```
//!
//! # Design Principles
//!
//! ## No Cache
//!
//! The parameter store re-reads its file on every query, so hand edits made
//! between two calls are always visible.
//!
//! ## Atomic Rewrites
//!
//! Whole-file rewrites use write-then-rename:
//!
//! 1. Write to `file.tmp`
//! 2. Rename to `file` (atomic on Unix)
//!
//! Appends (new parameters, signatures) go straight to the end of the file.

pub mod event_file;
pub mod store;

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub use event_file::{load_event_definitions, save_event_definitions, EventDefinitions};
pub use store::{ParameterStore, StoreError, SIGNATURE_KEY};

/// Path of the temporary sibling used by [`write_atomic`].
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Replace `path` with `contents` via a temporary file and a rename.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp = temp_path(path);
    fs::write(&temp, contents)?;
    fs::rename(&temp, path)?;

    Ok(())
}
