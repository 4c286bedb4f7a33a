//! # hydromodel-core
//!
//! Parameter store and control-file export for 2D hydraulic models.
//!
//! This crate holds all of the logic; the `hydromodel` binary is a thin
//! command-line front end over it.
//!
//! ## Key Concepts
//!
//! - **Group**: A named partition of parameters (`ctrl`, `stab`, `gbc`, ...)
//! - **Signature**: A one-way flag marking a group as applied at least once
//! - **Boundary entity**: A named source area (inflow) or boundary condition
//! - **Event**: A scenario mapping every boundary entity to a forcing value
//! - **Control file**: A generated `key == value` file read by the engine

pub mod applied;
pub mod codec;
pub mod config;
pub mod events;
pub mod export;
pub mod gis;
pub mod logging;
pub mod model;
pub mod paths;
pub mod persistence;
pub mod registry;

// Re-export commonly used types
pub use codec::Value;
pub use config::{load_config, ExportMode, WorkspaceConfig};
pub use events::{BoundarySet, EntityKind, EventSet};
pub use export::{run_export, ExportError, ExportOptions, ExportReport};
pub use gis::{AttributeSource, DbfAttributeSource, MemoryAttributeSource};
pub use model::{Model, ModelError};
pub use paths::ProjectLayout;
pub use persistence::{ParameterStore, StoreError};
pub use registry::Registry;
