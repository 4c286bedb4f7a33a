//! The control-file writers.
//!
//! Each writer collects its lines in memory, reporting per-line problems and
//! leaving those lines out, then writes the file in one go. Only a failure to
//! write the file itself is returned as an error.

use std::fmt::Display;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{format_parameter, ExportError, ExportReport, PathResolver};
use crate::codec::{format_float, Value};
use crate::events::{initial_water_level, EntityKind};
use crate::model::Model;
use crate::paths::event_series_file_name;
use crate::registry::{group, param};

/// Lines of one generated file.
struct ControlFile {
    path: PathBuf,
    lines: Vec<String>,
}

impl ControlFile {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            lines: Vec::new(),
        }
    }

    fn raw(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    fn command(&mut self, key: &str, value: impl Display) {
        self.lines.push(format!("{key} == {value}"));
    }

    /// Append `name == <formatted value>`, or report why it cannot be.
    fn parameter(
        &mut self,
        name: &str,
        value: &Value,
        resolver: &PathResolver,
        report: &mut ExportReport,
    ) {
        match format_parameter(name, value, resolver) {
            Ok(Some(text)) => self.command(name, text),
            Ok(None) => {}
            Err(err) => report.error(err),
        }
    }

    /// Append every parameter of `group` whose name passes `keep`.
    fn group(
        &mut self,
        model: &Model,
        group: &str,
        keep: impl Fn(&str) -> bool,
        resolver: &PathResolver,
        report: &mut ExportReport,
    ) {
        let Some(values) = model.applied().group(group) else {
            return;
        };
        for (name, value) in values.iter().filter(|(name, _)| keep(*name)) {
            self.parameter(name, value, resolver, report);
        }
    }

    fn write(self) -> Result<(), ExportError> {
        let mut contents = self.lines.join("\n");
        contents.push('\n');

        let mut file = File::create(&self.path).map_err(|e| ExportError::io(&self.path, e))?;
        file.write_all(contents.as_bytes())
            .map_err(|e| ExportError::io(&self.path, e))?;
        log::debug!("Wrote {}", self.path.display());
        Ok(())
    }
}

fn all(_: &str) -> bool {
    true
}

/// `model/<m>.tgc`
pub(crate) fn write_geometry(
    model: &Model,
    resolver: &PathResolver,
    report: &mut ExportReport,
) -> Result<(), ExportError> {
    let mut file = ControlFile::new(&model.files().geometry);

    file.group(
        model,
        group::GCTRL,
        |name| name != param::SHP_PROJECTION,
        resolver,
        report,
    );
    let cell_size = model.value(group::STAB, param::CELL_SIZE)?;
    file.parameter(param::CELL_SIZE, cell_size, resolver, report);
    file.group(model, group::GMAT, all, resolver, report);

    file.write()
}

/// `model/<m>.tbc`
pub(crate) fn write_boundary_control(
    model: &Model,
    resolver: &PathResolver,
    report: &mut ExportReport,
) -> Result<(), ExportError> {
    let mut file = ControlFile::new(&model.files().boundary_control);
    file.group(model, group::GBC, all, resolver, report);
    file.write()
}

/// `bc_dbase/<m>_bc_data_<e>.csv`, one per event.
pub(crate) fn write_event_series(
    model: &Model,
    _resolver: &PathResolver,
    report: &mut ExportReport,
) -> Result<(), ExportError> {
    let entities: Vec<&str> = model.boundaries().all().collect();
    if entities.is_empty() {
        report.warning("No boundary entities defined; no time series written");
        return Ok(());
    }

    let start = model.value(group::BCE, param::SERIES_START)?;
    let end = model.value(group::BCE, param::SERIES_END)?;

    for (event, values) in model.events().iter() {
        let path = model.files().event_series(model.name(), event);
        let mut file = ControlFile::new(&path);

        file.raw(format!("Time,{}", entities.join(",")));
        for time in [start, end] {
            let row: Vec<String> = entities
                .iter()
                .map(|entity| format_float(values.get(*entity).copied().unwrap_or(0.0)))
                .collect();
            file.raw(format!("{time},{}", row.join(",")));
        }

        if let Err(err) = file.write() {
            report.error(err);
        }
    }

    Ok(())
}

/// `bc_dbase/2d_bc_<m>.csv`
pub(crate) fn write_boundary_database(
    model: &Model,
    _resolver: &PathResolver,
    _report: &mut ExportReport,
) -> Result<(), ExportError> {
    let mut file = ControlFile::new(&model.files().boundary_database);

    file.raw("Name,Source,Column 1,Column 2");
    for event in model.events().ids() {
        let series = event_series_file_name(model.name(), event);
        for entity in model.boundaries().all() {
            file.raw(format!("{entity},{series},Time,{entity}"));
        }
    }

    file.write()
}

/// `runs/<m>.tef`
pub(crate) fn write_event_definitions(
    model: &Model,
    _resolver: &PathResolver,
    report: &mut ExportReport,
) -> Result<(), ExportError> {
    let mut file = ControlFile::new(&model.files().event_definitions);

    let conditions = model.boundaries().of_kind(EntityKind::BoundaryCondition);
    let fallback_level = model.value(group::STAB, param::SET_IWL)?;
    let start_map_output = model.value(group::BCE, param::START_MAP_OUTPUT)?;
    let end_time = model.value(group::BCE, param::END_TIME)?;

    for (event, values) in model.events().iter() {
        let level = match initial_water_level(values, conditions) {
            Some(level) => format_float(level),
            None => {
                report.warning(format!(
                    "Event {event} has no boundary condition values; using {} {fallback_level}",
                    param::SET_IWL
                ));
                fallback_level.to_string()
            }
        };

        file.command("Define Event", event);
        file.command("\tBC Event Source", format!("__event__ | {event}"));
        file.command("\tSET IWL", level);
        file.command("\tStart Map Output", start_map_output);
        file.command("\tEnd Time", end_time);
        file.raw("End Define");
    }

    file.write()
}

/// `runs/<m>.tcf`
pub(crate) fn write_master_control(
    model: &Model,
    resolver: &PathResolver,
    report: &mut ExportReport,
) -> Result<(), ExportError> {
    let files = model.files();
    let name = model.name();
    let mut file = ControlFile::new(&files.master_control);

    file.command("GIS Format", "SHP");
    let projection = model.value(group::GCTRL, param::SHP_PROJECTION)?;
    file.parameter(param::SHP_PROJECTION, projection, resolver, report);

    if model.value(group::CTRL, param::LICENSE)?.as_text() == Some("demo") {
        file.command("Demo Model", "ON");
    }
    file.group(
        model,
        group::CTRL,
        |n| n != param::LICENSE && n != param::MODEL_PRECISION,
        resolver,
        report,
    );

    let generated = [
        ("Geometry Control File", &files.geometry),
        ("BC Control File", &files.boundary_control),
        ("BC Database", &files.boundary_database),
        ("Event File", &files.event_definitions),
    ];
    for (key, path) in generated {
        let value = Value::from(path.to_string_lossy().into_owned());
        file.parameter(key, &value, resolver, report);
    }

    if let Some(po) = model.applied().group(group::PO) {
        for (_, value) in po.iter() {
            file.parameter(param::READ_GIS_PO, value, resolver, report);
        }
    }

    let inactive_viscosity =
        match model.value(group::STAB, param::VISCOSITY_FORMULATION)?.as_text() {
            Some("SMAGORINSKY") => param::CONSTANT_VISCOSITY,
            _ => param::VISCOSITY_COEFFICIENTS,
        };
    file.group(
        model,
        group::STAB,
        |n| n != param::CELL_SIZE && n != param::SET_IWL && n != inactive_viscosity,
        resolver,
        report,
    );

    file.command("Log Folder", "Log\\");
    file.command("Output Folder", format!("..\\results\\{name}\\{name}_<<~e1~>>\\"));
    file.command("Write Check Files", format!("..\\check\\{name}\\{name}_<<~e1~>>\\"));

    file.group(model, group::OUT, all, resolver, report);

    file.write()
}
