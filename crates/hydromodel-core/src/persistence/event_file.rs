//! Event definition file.
//!
//! Stored as `<model>.events` next to the parameter store:
//!
//! ```json
//! {
//!   "Q100": { "Inflow_North": 120.0, "Outlet": 4.2 },
//!   "Q10":  { "Inflow_North": 45.0,  "Outlet": 3.1 }
//! }
//! ```
//!
//! Event keys are strings; a file written by hand with integer-looking keys
//! (`"1"`) is read the same way.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use super::write_atomic;

/// event → entity → value
pub type EventDefinitions = BTreeMap<String, BTreeMap<String, f64>>;

/// Load event definitions.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_event_definitions(path: &Path) -> Result<Option<EventDefinitions>, io::Error> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path)?;
    let definitions: EventDefinitions = serde_json::from_str(&contents)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    Ok(Some(definitions))
}

/// Save event definitions (atomic write).
pub fn save_event_definitions(path: &Path, definitions: &EventDefinitions) -> Result<(), io::Error> {
    let json = serde_json::to_string_pretty(definitions)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    write_atomic(path, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_none() {
        let dir = tempdir().unwrap();
        let loaded = load_event_definitions(&dir.path().join("none.events")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.events");

        let mut definitions = EventDefinitions::new();
        definitions
            .entry("Q100".to_string())
            .or_default()
            .insert("Outlet".to_string(), 4.2);

        save_event_definitions(&path, &definitions).unwrap();
        let loaded = load_event_definitions(&path).unwrap().unwrap();

        assert_eq!(loaded, definitions);
    }

    #[test]
    fn malformed_file_is_invalid_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.events");
        fs::write(&path, "{ not json").unwrap();

        let err = load_event_definitions(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
