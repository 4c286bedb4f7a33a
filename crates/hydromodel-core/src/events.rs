//! Boundary entities and simulation events.
//!
//! Boundary entities are the named inflow (source area) and outflow/stage
//! (boundary condition) features of the model. Their names come from the
//! attribute tables of two GIS layers. Every event maps each known entity to
//! a forcing value (flow for source areas, stage for boundary conditions).
//!
//! # Invariant
//!
//! All events always hold exactly the same entity keys. Seeding a new entity
//! back-fills it into every event with `0.0`.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::gis::{AttributeError, AttributeSource};
use crate::persistence::event_file::{
    load_event_definitions, save_event_definitions, EventDefinitions,
};
use crate::registry::param;

/// Key of the event that exists before anything is defined.
pub const BOOTSTRAP_EVENT: &str = "1";

/// Entry held by the bootstrap event until the first entity is seeded.
pub const PLACEHOLDER_ENTITY: &str = "No boundary defined";

/// Matches attribute fields that carry entity names.
static NAME_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)name").unwrap());

#[derive(Debug, Error)]
pub enum EventError {
    #[error("no field containing \"name\" in {}", layer.display())]
    SchemaMismatch { layer: PathBuf },

    #[error("{0} is not defined")]
    MissingLayer(&'static str),

    #[error(transparent)]
    Attribute(#[from] AttributeError),

    #[error("could not access event file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unknown event {0}")]
    UnknownEvent(String),

    #[error("unknown boundary entity {0}")]
    UnknownEntity(String),

    #[error("{entity} in event {event} must be a finite number, got {value}")]
    NonFiniteValue {
        event: String,
        entity: String,
        value: f64,
    },
}

/// The two disjoint kinds of boundary entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    SourceArea,
    BoundaryCondition,
}

impl EntityKind {
    /// Boundary parameter (group `gbc`) that points at the kind's GIS layer.
    pub fn layer_parameter(self) -> &'static str {
        match self {
            EntityKind::SourceArea => param::READ_GIS_SA,
            EntityKind::BoundaryCondition => param::READ_GIS_BC,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntityKind::SourceArea => "source area",
            EntityKind::BoundaryCondition => "boundary condition",
        }
    }
}

// ============================================================================
// Entity discovery
// ============================================================================

/// First field whose name contains "name" (case-insensitive).
pub fn find_name_field(fields: &[String]) -> Option<&str> {
    fields
        .iter()
        .find(|f| NAME_FIELD_RE.is_match(f))
        .map(String::as_str)
}

/// Entity names listed in the name field of `layer`.
pub fn discover_entities(
    source: &dyn AttributeSource,
    layer: &Path,
) -> Result<Vec<String>, EventError> {
    let fields = source.field_names(layer)?;
    let field = find_name_field(&fields).ok_or_else(|| EventError::SchemaMismatch {
        layer: layer.to_path_buf(),
    })?;
    Ok(source.field_values(layer, field)?)
}

/// Known boundary entities, per kind, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundarySet {
    source_areas: Vec<String>,
    conditions: Vec<String>,
}

impl BoundarySet {
    pub fn of_kind(&self, kind: EntityKind) -> &[String] {
        match kind {
            EntityKind::SourceArea => &self.source_areas,
            EntityKind::BoundaryCondition => &self.conditions,
        }
    }

    /// Source areas first, then boundary conditions.
    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.source_areas
            .iter()
            .chain(&self.conditions)
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.all().any(|n| n == name)
    }

    pub fn is_empty(&self) -> bool {
        self.source_areas.is_empty() && self.conditions.is_empty()
    }

    /// Replace the entities of `kind` with `names`.
    ///
    /// Blank names, duplicates and names already used by the other kind are
    /// dropped with a warning. Returns the accepted names.
    pub fn replace(&mut self, kind: EntityKind, names: Vec<String>) -> &[String] {
        let other: Vec<String> = match kind {
            EntityKind::SourceArea => self.conditions.clone(),
            EntityKind::BoundaryCondition => self.source_areas.clone(),
        };

        let mut accepted: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.trim().to_string();
            if name.is_empty() {
                log::warn!("Ignoring {} with an empty name", kind.label());
            } else if accepted.contains(&name) {
                log::warn!("Ignoring duplicate {} name {name}", kind.label());
            } else if other.contains(&name) {
                log::warn!(
                    "Ignoring {} {name}: the name is already used by another boundary",
                    kind.label()
                );
            } else {
                accepted.push(name);
            }
        }

        let slot = match kind {
            EntityKind::SourceArea => &mut self.source_areas,
            EntityKind::BoundaryCondition => &mut self.conditions,
        };
        *slot = accepted;
        slot
    }
}

// ============================================================================
// Events
// ============================================================================

/// entity → value of one event
pub type EventValues = BTreeMap<String, f64>;

/// Result of [`EventSet::import`].
#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome {
    /// No event file; the seeded events were kept.
    Missing,
    /// The file replaced all events.
    Replaced {
        events: usize,
        /// `(event, entity)` pairs that were absent from the file.
        backfilled: Vec<(String, String)>,
    },
}

/// All events of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSet {
    events: BTreeMap<String, EventValues>,
}

impl Default for EventSet {
    fn default() -> Self {
        let mut bootstrap = EventValues::new();
        bootstrap.insert(PLACEHOLDER_ENTITY.to_string(), 0.0);

        let mut events = BTreeMap::new();
        events.insert(BOOTSTRAP_EVENT.to_string(), bootstrap);
        Self { events }
    }
}

impl EventSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions(definitions: EventDefinitions) -> Self {
        Self {
            events: definitions,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, event: &str) -> Option<&EventValues> {
        self.events.get(event)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.events.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EventValues)> {
        self.events.iter().map(|(id, values)| (id.as_str(), values))
    }

    /// Insert every entity missing from an event with `0.0`.
    ///
    /// Existing values are kept. Once a real entity is present the bootstrap
    /// placeholder is removed. Returns the `(event, entity)` pairs inserted.
    pub fn seed<'a>(
        &mut self,
        entities: impl IntoIterator<Item = &'a str>,
    ) -> Vec<(String, String)> {
        let mut inserted = Vec::new();
        let mut seeded_any = false;

        for entity in entities {
            seeded_any = true;
            for (id, values) in self.events.iter_mut() {
                if !values.contains_key(entity) {
                    values.insert(entity.to_string(), 0.0);
                    inserted.push((id.clone(), entity.to_string()));
                }
            }
        }

        if seeded_any {
            for values in self.events.values_mut() {
                values.remove(PLACEHOLDER_ENTITY);
            }
        }

        inserted
    }

    /// Replace all events with the contents of the event file, if it exists.
    ///
    /// Entities in `known` that the file does not mention are back-filled so
    /// every event still covers every entity; the outcome lists them.
    pub fn import(&mut self, path: &Path, known: &BoundarySet) -> Result<ImportOutcome, EventError> {
        let definitions = load_event_definitions(path).map_err(|source| EventError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let Some(definitions) = definitions else {
            return Ok(ImportOutcome::Missing);
        };

        self.events = definitions;
        let backfilled = self.seed(known.all());

        Ok(ImportOutcome::Replaced {
            events: self.events.len(),
            backfilled,
        })
    }

    /// Write all events to `path`.
    pub fn save(&self, path: &Path) -> Result<(), EventError> {
        save_event_definitions(path, &self.events).map_err(|source| EventError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Add an event covering every known entity. Existing events are untouched.
    pub fn add_event(&mut self, id: &str, known: &BoundarySet) {
        let values = self.events.entry(id.to_string()).or_default();
        for entity in known.all() {
            values.entry(entity.to_string()).or_insert(0.0);
        }
    }

    pub fn remove_event(&mut self, id: &str) -> Option<EventValues> {
        self.events.remove(id)
    }

    pub fn set_value(&mut self, event: &str, entity: &str, value: f64) -> Result<(), EventError> {
        if !value.is_finite() {
            return Err(EventError::NonFiniteValue {
                event: event.to_string(),
                entity: entity.to_string(),
                value,
            });
        }
        let values = self
            .events
            .get_mut(event)
            .ok_or_else(|| EventError::UnknownEvent(event.to_string()))?;
        let slot = values
            .get_mut(entity)
            .ok_or_else(|| EventError::UnknownEntity(entity.to_string()))?;
        *slot = value;
        Ok(())
    }
}

/// Lowest value among the boundary conditions of one event.
///
/// Source areas never take part. `None` when the event has no boundary
/// condition values.
pub fn initial_water_level(values: &EventValues, conditions: &[String]) -> Option<f64> {
    conditions
        .iter()
        .filter_map(|bc| values.get(bc).copied())
        .fold(None, |min, v| Some(min.map_or(v, |m: f64| m.min(v))))
}
