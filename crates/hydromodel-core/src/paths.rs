//! Workspace directory layout.
//!
//! ```text
//! <root>/
//! ├── models/
//! │   ├── <model>.hy2model
//! │   └── <model>.events
//! └── user_models/
//!     └── <model>/                    # output root
//!         ├── model/<model>.tgc, <model>.tbc
//!         ├── bc_dbase/2d_bc_<model>.csv, <model>_bc_data_<event>.csv
//!         ├── runs/<model>.tcf, <model>.tef, Log/export.log
//!         ├── gis/  grid/  check/  results/
//! ```

use std::env;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the default workspace root.
pub const ROOT_ENV: &str = "HYDROMODEL_ROOT";

/// Extension of the parameter store file.
pub const STORE_EXTENSION: &str = "hy2model";

/// Folders every output tree has.
pub const OUTPUT_FOLDERS: &[&str] = &[
    "model",
    "runs",
    "runs/Log",
    "bc_dbase",
    "gis",
    "grid",
    "check",
    "results",
];

/// Return the user's home directory path.
///
/// Uses HOME on Unix-like systems and USERPROFILE on Windows.
pub fn get_home_dir() -> Result<String, String> {
    if let Ok(home) = env::var("HOME") {
        if !home.is_empty() {
            return Ok(home);
        }
    }

    if let Ok(profile) = env::var("USERPROFILE") {
        if !profile.is_empty() {
            return Ok(profile);
        }
    }

    Err("Home directory not set".to_string())
}

/// Workspace root: `$HYDROMODEL_ROOT`, else `<home>/hydromodel`.
pub fn default_root_dir() -> Result<PathBuf, String> {
    if let Ok(root) = env::var(ROOT_ENV) {
        if !root.is_empty() {
            return Ok(PathBuf::from(root));
        }
    }

    Ok(PathBuf::from(get_home_dir()?).join("hydromodel"))
}

/// Name of the per-event time-series file.
///
/// The boundary database references these files by the same name, so both
/// writers must go through this function.
pub fn event_series_file_name(model: &str, event: &str) -> String {
    format!("{model}_bc_data_{event}.csv")
}

/// Paths of a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn models_dir(&self) -> PathBuf {
        self.root.join("models")
    }

    pub fn store_file(&self, model: &str) -> PathBuf {
        self.models_dir().join(format!("{model}.{STORE_EXTENSION}"))
    }

    pub fn events_file(&self, model: &str) -> PathBuf {
        self.models_dir().join(format!("{model}.events"))
    }

    pub fn output_root(&self, model: &str) -> PathBuf {
        self.root.join("user_models").join(model)
    }

    /// Every generated file of `model`.
    pub fn model_files(&self, model: &str) -> ModelFiles {
        let output_root = self.output_root(model);
        let model_dir = output_root.join("model");
        let bc_dbase_dir = output_root.join("bc_dbase");
        let runs_dir = output_root.join("runs");

        ModelFiles {
            geometry: model_dir.join(format!("{model}.tgc")),
            boundary_control: model_dir.join(format!("{model}.tbc")),
            boundary_database: bc_dbase_dir.join(format!("2d_bc_{model}.csv")),
            event_definitions: runs_dir.join(format!("{model}.tef")),
            master_control: runs_dir.join(format!("{model}.tcf")),
            export_log: runs_dir.join("Log").join("export.log"),
            output_root,
            bc_dbase_dir,
            runs_dir,
        }
    }

    /// Names of the models that have a store file.
    pub fn list_models(&self) -> std::io::Result<Vec<String>> {
        let dir = self.models_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut models = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(STORE_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    models.push(stem.to_string());
                }
            }
        }
        models.sort();
        Ok(models)
    }
}

/// Resolved output paths of one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub output_root: PathBuf,
    pub runs_dir: PathBuf,
    pub bc_dbase_dir: PathBuf,
    pub geometry: PathBuf,
    pub boundary_control: PathBuf,
    pub boundary_database: PathBuf,
    pub event_definitions: PathBuf,
    pub master_control: PathBuf,
    pub export_log: PathBuf,
}

impl ModelFiles {
    pub fn event_series(&self, model: &str, event: &str) -> PathBuf {
        self.bc_dbase_dir.join(event_series_file_name(model, event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env<F: FnOnce()>(vars: &[(&str, Option<&str>)], f: F) {
        let _guard = ENV_LOCK.lock().unwrap();
        let previous: Vec<_> = vars
            .iter()
            .map(|(key, _)| (key.to_string(), env::var(key).ok()))
            .collect();

        for (key, value) in vars {
            match value {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }

        f();

        for (key, value) in previous {
            match value {
                Some(value) => env::set_var(&key, value),
                None => env::remove_var(&key),
            }
        }
    }

    #[test]
    fn get_home_dir_prefers_home() {
        with_env(
            &[("HOME", Some("/tmp/home")), ("USERPROFILE", Some("/tmp/profile"))],
            || {
                let home = get_home_dir().expect("home dir");
                assert_eq!(home, "/tmp/home");
            },
        );
    }

    #[test]
    fn get_home_dir_falls_back_to_userprofile() {
        with_env(&[("HOME", None), ("USERPROFILE", Some("/tmp/profile"))], || {
            let home = get_home_dir().expect("home dir");
            assert_eq!(home, "/tmp/profile");
        });
    }

    #[test]
    fn root_env_overrides_home() {
        with_env(
            &[(ROOT_ENV, Some("/srv/models")), ("HOME", Some("/tmp/home"))],
            || {
                assert_eq!(default_root_dir().unwrap(), PathBuf::from("/srv/models"));
            },
        );
        with_env(&[(ROOT_ENV, None), ("HOME", Some("/tmp/home"))], || {
            assert_eq!(
                default_root_dir().unwrap(),
                PathBuf::from("/tmp/home/hydromodel")
            );
        });
    }

    #[test]
    fn model_files_follow_layout() {
        let layout = ProjectLayout::new("/work");
        let files = layout.model_files("creek");

        assert_eq!(
            layout.store_file("creek"),
            PathBuf::from("/work/models/creek.hy2model")
        );
        assert_eq!(files.geometry, PathBuf::from("/work/user_models/creek/model/creek.tgc"));
        assert_eq!(
            files.boundary_database,
            PathBuf::from("/work/user_models/creek/bc_dbase/2d_bc_creek.csv")
        );
        assert_eq!(files.master_control, PathBuf::from("/work/user_models/creek/runs/creek.tcf"));
        assert_eq!(
            files.event_series("creek", "Q100"),
            PathBuf::from("/work/user_models/creek/bc_dbase/creek_bc_data_Q100.csv")
        );
    }

    #[test]
    fn list_models_reads_store_files() {
        let dir = tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        assert!(layout.list_models().unwrap().is_empty());

        std::fs::create_dir_all(layout.models_dir()).unwrap();
        std::fs::write(layout.store_file("b"), "").unwrap();
        std::fs::write(layout.store_file("a"), "").unwrap();
        std::fs::write(layout.events_file("a"), "{}").unwrap();

        assert_eq!(layout.list_models().unwrap(), vec!["a", "b"]);
    }
}
