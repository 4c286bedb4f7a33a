//! The model aggregate.
//!
//! A [`Model`] ties one store file to the shared registry, the applied
//! parameter values, the boundary entities and the events. Its name is only
//! changed through [`Model::rename`], which also moves the files named after it.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use thiserror::Error;

use crate::applied::{AppliedGroup, AppliedParameters};
use crate::codec::Value;
use crate::events::{discover_entities, BoundarySet, EntityKind, EventError, EventSet, ImportOutcome};
use crate::gis::AttributeSource;
use crate::paths::{ModelFiles, ProjectLayout};
use crate::persistence::{ParameterStore, StoreError};
use crate::registry::{group, Registry, UnknownParameter};

/// Characters a model name cannot hold: it becomes part of file names.
static MODEL_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^[^\\/:*?"<>|\r\n]+$"#).unwrap());

#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    UnknownParameter(#[from] UnknownParameter),

    #[error("unknown parameter group {0}")]
    UnknownGroup(String),

    #[error("invalid model name {0:?}")]
    InvalidName(String),

    #[error("model {0} already exists")]
    AlreadyExists(String),

    #[error(transparent)]
    Events(#[from] EventError),

    #[error("could not move {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub fn validate_name(name: &str) -> Result<(), ModelError> {
    let trimmed = name.trim();
    if trimmed != name || name == "." || name == ".." || !MODEL_NAME_RE.is_match(name) {
        return Err(ModelError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[derive(Debug)]
pub struct Model {
    name: String,
    layout: ProjectLayout,
    registry: Arc<Registry>,
    store: ParameterStore,
    applied: AppliedParameters,
    boundaries: BoundarySet,
    events: EventSet,
    files: ModelFiles,
}

impl Model {
    /// Open the model `name` of the workspace, reading its stored values.
    ///
    /// The store file does not have to exist; values then come from the
    /// registry defaults.
    pub fn open(
        name: &str,
        layout: ProjectLayout,
        registry: Arc<Registry>,
    ) -> Result<Self, ModelError> {
        validate_name(name)?;

        let store = ParameterStore::new(layout.store_file(name), Arc::clone(&registry));
        let applied = AppliedParameters::from_registry(&registry);
        let files = layout.model_files(name);

        let mut model = Self {
            name: name.to_string(),
            layout,
            registry,
            store,
            applied,
            boundaries: BoundarySet::default(),
            events: EventSet::new(),
            files,
        };
        model.load_parameters();
        Ok(model)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    pub fn applied(&self) -> &AppliedParameters {
        &self.applied
    }

    pub fn boundaries(&self) -> &BoundarySet {
        &self.boundaries
    }

    pub fn events(&self) -> &EventSet {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventSet {
        &mut self.events
    }

    pub fn files(&self) -> &ModelFiles {
        &self.files
    }

    pub fn events_file(&self) -> PathBuf {
        self.layout.events_file(&self.name)
    }

    /// Applied value, as last loaded or set.
    pub fn value(&self, group: &str, name: &str) -> Result<&Value, UnknownParameter> {
        self.applied.value(group, name)
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    /// Refresh every applied value from the store.
    pub fn load_parameters(&mut self) {
        let groups: Vec<&'static str> = self.registry.groups().map(|g| g.name).collect();
        for group in groups {
            self.refresh_group(group);
        }
    }

    /// Refresh one group from the store and return its values.
    pub fn load_group(&mut self, group: &str) -> Result<&AppliedGroup, ModelError> {
        if self.registry.group(group).is_none() {
            return Err(ModelError::UnknownGroup(group.to_string()));
        }
        self.refresh_group(group);
        self.applied
            .group(group)
            .ok_or_else(|| ModelError::UnknownGroup(group.to_string()))
    }

    fn refresh_group(&mut self, group: &str) {
        let names = self.registry.parameters(group);
        for name in names {
            let value = self
                .store
                .get(group, name)
                .or_else(|| self.registry.default_for(group, name).ok())
                .unwrap_or_else(Value::unset);
            if let Err(err) = self.applied.set(group, name, value) {
                log::error!("Failed to refresh {group}::{name}: {err}");
            }
        }
    }

    /// Set a value in memory and in the store.
    pub fn set_parameter(&mut self, group: &str, name: &str, value: Value) -> Result<(), ModelError> {
        self.registry.spec(group, name)?;
        self.store.set(group, name, &value)?;
        self.applied.set(group, name, value)?;
        Ok(())
    }

    /// Set a value from one or more user tokens, joined with spaces.
    pub fn set_user_values(
        &mut self,
        group: &str,
        name: &str,
        values: &[String],
    ) -> Result<(), ModelError> {
        self.set_parameter(group, name, Value::from_user_values(values))
    }

    /// Write every applied value of `group` to the store and sign it.
    pub fn apply_group(&self, group: &str) -> Result<(), ModelError> {
        let applied = self
            .applied
            .group(group)
            .ok_or_else(|| ModelError::UnknownGroup(group.to_string()))?;

        for (name, value) in applied.iter() {
            self.store.set(group, name, value)?;
        }
        self.store.sign(group)?;

        log::debug!("Applied {group} of {}", self.name);
        Ok(())
    }

    /// Apply every group.
    pub fn save(&self) -> Result<(), ModelError> {
        for group in self.applied.groups() {
            self.apply_group(group.name)?;
        }
        log::info!("Saved model {} to {}", self.name, self.store.path().display());
        Ok(())
    }

    pub fn is_signed(&self, group: &str) -> bool {
        self.store.is_signed(group)
    }

    /// Give the model a new name, moving its store and event files.
    pub fn rename(&mut self, new_name: &str) -> Result<(), ModelError> {
        validate_name(new_name)?;
        if new_name == self.name {
            return Ok(());
        }

        let new_store = self.layout.store_file(new_name);
        if new_store.exists() {
            return Err(ModelError::AlreadyExists(new_name.to_string()));
        }

        let old_events = self.events_file();
        let new_events = self.layout.events_file(new_name);
        if new_events.exists() {
            return Err(ModelError::AlreadyExists(new_name.to_string()));
        }

        let moved_events = old_events.exists();
        if moved_events {
            fs::rename(&old_events, &new_events).map_err(|source| ModelError::Io {
                path: old_events.clone(),
                source,
            })?;
        }
        if let Err(err) = self.store.relocate(new_store) {
            if moved_events {
                if let Err(undo) = fs::rename(&new_events, &old_events) {
                    log::error!(
                        "Failed to move {} back to {}: {undo}",
                        new_events.display(),
                        old_events.display()
                    );
                }
            }
            return Err(err.into());
        }

        log::info!("Renamed model {} to {new_name}", self.name);
        self.name = new_name.to_string();
        self.files = self.layout.model_files(new_name);
        Ok(())
    }

    // ========================================================================
    // Boundaries and events
    // ========================================================================

    /// Read the entities of `kind` from the layer named in the boundary group.
    ///
    /// Accepted names replace the previous ones of that kind and are seeded
    /// into every event. Returns how many were accepted.
    pub fn discover_boundaries(
        &mut self,
        kind: EntityKind,
        source: &dyn AttributeSource,
    ) -> Result<usize, EventError> {
        let parameter = kind.layer_parameter();
        let layer = self
            .store
            .get(group::GBC, parameter)
            .filter(|value| !value.is_unset())
            .ok_or(EventError::MissingLayer(parameter))?;

        let names = discover_entities(source, &PathBuf::from(layer.to_string()))?;
        let accepted = self.boundaries.replace(kind, names);
        self.events.seed(accepted.iter().map(String::as_str));

        Ok(accepted.len())
    }

    /// Replace the events with the model's event file, if there is one.
    pub fn import_events(&mut self) -> Result<ImportOutcome, EventError> {
        let path = self.events_file();
        self.events.import(&path, &self.boundaries)
    }

    pub fn save_events(&self) -> Result<(), EventError> {
        self.events.save(&self.events_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::BOOTSTRAP_EVENT;
    use crate::gis::MemoryAttributeSource;
    use crate::registry::param;
    use tempfile::tempdir;

    fn open(root: &std::path::Path, name: &str) -> Model {
        Model::open(name, ProjectLayout::new(root), Arc::new(Registry::standard())).unwrap()
    }

    #[test]
    fn rejects_names_that_are_not_file_names() {
        for name in ["", "a/b", "a\\b", "..", " padded", "c:model"] {
            assert!(matches!(validate_name(name), Err(ModelError::InvalidName(_))), "{name}");
        }
        assert!(validate_name("Creek 2024_v1.2").is_ok());
    }

    #[test]
    fn open_reads_stored_values() {
        let dir = tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        fs::create_dir_all(layout.models_dir()).unwrap();
        fs::write(layout.store_file("m"), "stab::Cell Size::5.0\n").unwrap();

        let model = open(dir.path(), "m");
        assert_eq!(
            model.value(group::STAB, param::CELL_SIZE).unwrap(),
            &Value::Float(5.0)
        );
        assert_eq!(
            model.value(group::CTRL, param::LICENSE).unwrap(),
            &Value::from("demo")
        );
    }

    #[test]
    fn set_user_values_joins_tokens() {
        let dir = tempdir().unwrap();
        let mut model = open(dir.path(), "m");

        model
            .set_user_values(
                group::STAB,
                "Hardware",
                &["GPU".to_string(), "FAST".to_string()],
            )
            .unwrap();

        assert_eq!(
            model.store().lookup(group::STAB, "Hardware").unwrap(),
            Some(Value::from("GPU FAST"))
        );
    }

    #[test]
    fn set_parameter_rejects_unknown_names() {
        let dir = tempdir().unwrap();
        let mut model = open(dir.path(), "m");

        let err = model
            .set_parameter(group::STAB, "Warp Factor", Value::Int(9))
            .unwrap_err();
        assert!(matches!(err, ModelError::UnknownParameter(_)));
        assert!(!model.store().exists());
    }

    #[test]
    fn save_writes_and_signs_every_group() {
        let dir = tempdir().unwrap();
        let model = open(dir.path(), "m");

        model.save().unwrap();

        for group in [group::CTRL, group::GBC, group::BCE] {
            assert!(model.is_signed(group), "{group}");
        }
        let reopened = open(dir.path(), "m");
        assert_eq!(reopened.applied(), model.applied());
    }

    #[test]
    fn load_group_picks_up_external_edits() {
        let dir = tempdir().unwrap();
        let mut model = open(dir.path(), "m");
        model.apply_group(group::GMAT).unwrap();

        model.store().set(group::GMAT, "Set Mat", &Value::Int(4)).unwrap();
        let values = model.load_group(group::GMAT).unwrap();

        assert_eq!(values.get("Set Mat"), Some(&Value::Int(4)));
        assert!(matches!(
            model.load_group("nope"),
            Err(ModelError::UnknownGroup(_))
        ));
    }

    #[test]
    fn rename_moves_files_and_paths() {
        let dir = tempdir().unwrap();
        let mut model = open(dir.path(), "old");
        model.save().unwrap();
        model.save_events().unwrap();

        model.rename("new").unwrap();

        let layout = ProjectLayout::new(dir.path());
        assert_eq!(model.name(), "new");
        assert!(layout.store_file("new").exists());
        assert!(!layout.store_file("old").exists());
        assert!(layout.events_file("new").exists());
        assert_eq!(model.files(), &layout.model_files("new"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_rename_leaves_both_files_in_place() {
        let dir = tempdir().unwrap();
        let mut model = open(dir.path(), "old");
        model.save().unwrap();
        model.save_events().unwrap();

        // fits as `<name>.events` but not as `<name>.hy2model`
        let long = "r".repeat(247);
        assert!(matches!(model.rename(&long), Err(ModelError::Store(_))));

        let layout = ProjectLayout::new(dir.path());
        assert_eq!(model.name(), "old");
        assert!(layout.store_file("old").exists());
        assert!(layout.events_file("old").exists());
        assert!(!layout.events_file(&long).exists());
        assert_eq!(model.store().path(), layout.store_file("old").as_path());
    }

    #[test]
    fn rename_refuses_existing_model() {
        let dir = tempdir().unwrap();
        open(dir.path(), "taken").save().unwrap();
        let mut model = open(dir.path(), "m");

        assert!(matches!(
            model.rename("taken"),
            Err(ModelError::AlreadyExists(_))
        ));
        assert_eq!(model.name(), "m");
    }

    #[test]
    fn discover_boundaries_seeds_events() {
        let dir = tempdir().unwrap();
        let mut model = open(dir.path(), "m");
        model
            .set_parameter(group::GBC, param::READ_GIS_BC, Value::from("bc.shp"))
            .unwrap();
        let source = MemoryAttributeSource::new().with_field("bc.shp", "Name", &["Outlet"]);

        let found = model
            .discover_boundaries(EntityKind::BoundaryCondition, &source)
            .unwrap();

        assert_eq!(found, 1);
        assert_eq!(
            model.events().get(BOOTSTRAP_EVENT).unwrap().keys().collect::<Vec<_>>(),
            vec!["Outlet"]
        );
    }

    #[test]
    fn discover_without_layer_is_reported() {
        let dir = tempdir().unwrap();
        let mut model = open(dir.path(), "m");
        let source = MemoryAttributeSource::new();

        let err = model
            .discover_boundaries(EntityKind::SourceArea, &source)
            .unwrap_err();
        assert!(matches!(err, EventError::MissingLayer(param::READ_GIS_SA)));
    }
}
