//! Control-file export.
//!
//! [`run_export`] turns the stored parameters of a model into the family of
//! files the simulation engine reads:
//!
//! ```text
//! discover entities → load parameters → import events → scaffold output tree
//!   → model/<m>.tgc            geometry control
//!   → model/<m>.tbc            boundary control
//!   → bc_dbase/<m>_bc_data_<e>.csv   per-event time series
//!   → bc_dbase/2d_bc_<m>.csv   boundary database
//!   → runs/<m>.tef             event definitions
//!   → runs/<m>.tcf             master control
//! ```
//!
//! Nothing in the pipeline aborts the run. Every failure is recorded in the
//! returned [`ExportReport`] and the remaining steps still execute.

mod format;
mod scaffold;
mod writers;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::{ExportMode, WorkspaceConfig};
use crate::events::{EntityKind, EventError, ImportOutcome};
use crate::gis::AttributeSource;
use crate::logging::ExportLog;
use crate::model::Model;
use crate::registry::UnknownParameter;

pub use format::{
    bundle_folder, engine_path, format_parameter, is_file_reference, relative_path, PathResolver,
};
pub use scaffold::{scaffold_output_tree, Scaffold};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("{0} is not set; choose a file for it")]
    MissingFileReference(String),

    #[error("{0} has no value")]
    MissingParameterValue(String),

    #[error("{} is open in another program; close it and export again", path.display())]
    FileBusy { path: PathBuf },

    #[error("could not write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not copy {} to {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    UnknownParameter(#[from] UnknownParameter),

    #[error(transparent)]
    Events(#[from] EventError),
}

impl ExportError {
    /// Wrap an I/O error on `path`; permission errors mean the file is held
    /// open elsewhere.
    pub fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            ExportError::FileBusy {
                path: path.to_path_buf(),
            }
        } else {
            ExportError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Settings of one export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub mode: ExportMode,
    pub template_dir: Option<PathBuf>,
    pub log_exports: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::from(&WorkspaceConfig::default())
    }
}

impl From<&WorkspaceConfig> for ExportOptions {
    fn from(config: &WorkspaceConfig) -> Self {
        Self {
            mode: config.export_mode,
            template_dir: config.template_dir.clone(),
            log_exports: config.log_exports,
        }
    }
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

#[derive(Debug)]
pub struct ReportEntry {
    pub severity: Severity,
    pub message: String,
    pub error: Option<ExportError>,
}

/// Everything that happened during one export, in order.
#[derive(Debug)]
pub struct ExportReport {
    model: String,
    entries: Vec<ReportEntry>,
}

impl ExportReport {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::info!("{message}");
        self.push(Severity::Info, message, None);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{message}");
        self.push(Severity::Warning, message, None);
    }

    pub fn error(&mut self, error: ExportError) {
        let message = error.to_string();
        log::error!("{message}");
        self.push(Severity::Error, message, Some(error));
    }

    fn push(&mut self, severity: Severity, message: String, error: Option<ExportError>) {
        self.entries.push(ReportEntry {
            severity,
            message,
            error,
        });
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn errors(&self) -> impl Iterator<Item = &ExportError> {
        self.entries.iter().filter_map(|e| e.error.as_ref())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| e.severity == Severity::Warning)
            .map(|e| e.message.as_str())
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// One-line outcome, e.g. `creek: 2 errors, 1 warning`.
    pub fn summary(&self) -> String {
        let errors = self.errors().count();
        let warnings = self.warnings().count();
        format!(
            "{}: {} error{}, {} warning{}",
            self.model,
            errors,
            if errors == 1 { "" } else { "s" },
            warnings,
            if warnings == 1 { "" } else { "s" },
        )
    }

    fn write_to(&self, log: &mut ExportLog) {
        log.line("INFO", &format!("Export of {}", self.model));
        for entry in &self.entries {
            log.line(entry.severity.label(), &entry.message);
        }
    }
}

impl fmt::Display for ExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            if entry.severity > Severity::Info {
                writeln!(f, "[{}] {}", entry.severity.label(), entry.message)?;
            }
        }
        write!(f, "{}", self.summary())
    }
}

// ============================================================================
// Pipeline
// ============================================================================

type Writer = fn(&Model, &PathResolver, &mut ExportReport) -> Result<(), ExportError>;

const WRITERS: &[(&str, Writer)] = &[
    ("geometry control file", writers::write_geometry),
    ("boundary control file", writers::write_boundary_control),
    ("event time series", writers::write_event_series),
    ("boundary database", writers::write_boundary_database),
    ("event file", writers::write_event_definitions),
    ("master control file", writers::write_master_control),
];

/// Export `model` into its output tree.
pub fn run_export(
    model: &mut Model,
    source: &dyn AttributeSource,
    options: &ExportOptions,
) -> ExportReport {
    let mut report = ExportReport::new(model.name());
    log::info!("Exporting model {}", model.name());

    for kind in [EntityKind::SourceArea, EntityKind::BoundaryCondition] {
        match model.discover_boundaries(kind, source) {
            Ok(count) => report.info(format!("Found {count} {} entities", kind.label())),
            Err(err) => report.error(err.into()),
        }
    }

    model.load_parameters();

    match model.import_events() {
        Ok(ImportOutcome::Missing) => report.warning("No events defined."),
        Ok(ImportOutcome::Replaced { events, backfilled }) => {
            report.info(format!("Imported {events} events"));
            for (event, entity) in backfilled {
                report.warning(format!("Event {event} does not define {entity}; using 0.0"));
            }
        }
        Err(err) => report.error(err.into()),
    }

    let scaffold = scaffold_output_tree(model.files(), options.template_dir.as_deref());
    if scaffold.copied > 0 {
        report.info(format!("Copied {} template files", scaffold.copied));
    }
    for err in scaffold.errors {
        report.error(err);
    }

    match PathResolver::new(model.files(), options.mode) {
        Ok(resolver) => {
            for &(label, writer) in WRITERS {
                match writer(model, &resolver, &mut report) {
                    Ok(()) => log::debug!("Wrote {label}"),
                    Err(err) => report.error(err),
                }
            }
        }
        Err(err) => report.error(err),
    }

    report.info(format!("Finished writing model files for {}", model.name()));

    if options.log_exports {
        let mut log = ExportLog::open(&model.files().export_log);
        report.write_to(&mut log);
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Value;
    use crate::gis::tests::build_dbf;
    use crate::gis::{table_path, DbfAttributeSource};
    use crate::paths::ProjectLayout;
    use crate::registry::{group, param, Registry};
    use std::fs;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn discovers_entities_from_dbase_tables() {
        let dir = tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        let mut model = Model::open("m", layout, Arc::new(Registry::standard())).unwrap();

        let layer = dir.path().join("2d_bc_m.shp");
        let table = build_dbf(
            &[("ID", 4), ("BC_NAME", 10)],
            &[(&["1", "Outlet"], false), (&["2", "Old"], true)],
        );
        fs::write(table_path(&layer), table).unwrap();
        model
            .set_parameter(group::GBC, param::READ_GIS_BC, Value::from(layer.to_str().unwrap()))
            .unwrap();

        let options = ExportOptions {
            log_exports: false,
            ..ExportOptions::default()
        };
        let report = run_export(&mut model, &DbfAttributeSource, &options);

        assert_eq!(
            model.boundaries().of_kind(EntityKind::BoundaryCondition),
            ["Outlet".to_string()]
        );
        // no source area layer was chosen
        assert!(report
            .errors()
            .any(|e| matches!(e, ExportError::Events(EventError::MissingLayer(_)))));

        let database = fs::read_to_string(&model.files().boundary_database).unwrap();
        assert!(database.contains("Outlet,m_bc_data_1.csv,Time,Outlet\n"));
        assert!(!model.files().export_log.exists());
    }

    #[test]
    fn permission_denied_is_file_busy() {
        let err = ExportError::io(
            Path::new("runs/m.tcf"),
            io::Error::new(io::ErrorKind::PermissionDenied, "locked"),
        );
        assert!(matches!(err, ExportError::FileBusy { .. }));
        assert!(err.to_string().contains("close it"));

        let err = ExportError::io(Path::new("runs/m.tcf"), io::Error::other("disk"));
        assert!(matches!(err, ExportError::Io { .. }));
    }

    #[test]
    fn summary_counts_errors_and_warnings() {
        let mut report = ExportReport::new("creek");
        report.info("started");
        report.warning("No events defined.");
        report.error(ExportError::MissingParameterValue("Timestep".to_string()));
        report.error(ExportError::MissingFileReference("Read GIS BC".to_string()));

        assert!(report.has_errors());
        assert_eq!(report.summary(), "creek: 2 errors, 1 warning");

        let shown = report.to_string();
        assert!(shown.contains("[WARN] No events defined."));
        assert!(!shown.contains("started"));
    }

    #[test]
    fn options_follow_config() {
        let config = WorkspaceConfig {
            template_dir: Some(PathBuf::from("/t")),
            export_mode: ExportMode::Bundle,
            log_exports: false,
        };
        let options = ExportOptions::from(&config);
        assert_eq!(options.mode, ExportMode::Bundle);
        assert_eq!(options.template_dir.as_deref(), Some(Path::new("/t")));
        assert!(!options.log_exports);

        let defaults = ExportOptions::default();
        assert_eq!(defaults, ExportOptions::from(&WorkspaceConfig::default()));
        assert!(defaults.log_exports);
    }
}
