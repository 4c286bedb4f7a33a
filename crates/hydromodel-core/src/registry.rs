//! Parameter catalogue and defaults.
//!
//! The registry is the schema shared by the store (fallback values) and the
//! exporter (which parameters exist and in which order they are written).
//! It is built once and shared through an `Arc`; nothing copies it.
//!
//! Groups are spread over three catalogues:
//!
//! | catalogue | groups                          |
//! |-----------|---------------------------------|
//! | control   | `ctrl`, `stab`, `out`           |
//! | geometry  | `gctrl`, `gmat`, `gbc`, `po`    |
//! | events    | `bce`                           |

use thiserror::Error;

use crate::codec::Value;

/// Group identifiers.
pub mod group {
    pub const CTRL: &str = "ctrl";
    pub const STAB: &str = "stab";
    pub const OUT: &str = "out";
    pub const GCTRL: &str = "gctrl";
    pub const GMAT: &str = "gmat";
    pub const GBC: &str = "gbc";
    pub const PO: &str = "po";
    pub const BCE: &str = "bce";
}

/// Parameter names the exporter treats specially.
pub mod param {
    pub const LICENSE: &str = "License";
    pub const MODEL_PRECISION: &str = "Model Precision";
    pub const CELL_SIZE: &str = "Cell Size";
    pub const SET_IWL: &str = "Set IWL";
    pub const VISCOSITY_FORMULATION: &str = "Viscosity Formulation";
    pub const VISCOSITY_COEFFICIENTS: &str = "Viscosity Coefficients";
    pub const CONSTANT_VISCOSITY: &str = "Constant Viscosity Coefficient";
    pub const MAP_OUTPUT_FORMAT: &str = "Map Output Format";
    pub const SHP_PROJECTION: &str = "SHP projection";
    pub const READ_GIS_MAT: &str = "Read GIS Mat";
    pub const READ_GIS_SA: &str = "Read GIS SA";
    pub const READ_GIS_BC: &str = "Read GIS BC";
    pub const READ_GIS_PO: &str = "Read GIS PO";
    pub const SERIES_START: &str = "Time Series Start";
    pub const SERIES_END: &str = "Time Series End";
    pub const START_MAP_OUTPUT: &str = "Start Map Output";
    pub const END_TIME: &str = "End Time";
}

/// A `(group, name)` pair that is not in the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown parameter {group}::{name}")]
pub struct UnknownParameter {
    pub group: String,
    pub name: String,
}

impl UnknownParameter {
    pub fn new(group: &str, name: &str) -> Self {
        Self {
            group: group.to_string(),
            name: name.to_string(),
        }
    }
}

/// Allowed values of a parameter; the first one is the default.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    choices: Vec<Value>,
}

impl ParamSpec {
    /// A parameter with a single default value.
    pub fn value(default: impl Into<Value>) -> Self {
        Self {
            choices: vec![default.into()],
        }
    }

    pub fn int(default: i64) -> Self {
        Self::value(Value::Int(default))
    }

    pub fn float(default: f64) -> Self {
        Self::value(Value::Float(default))
    }

    /// A parameter chosen from a list of keywords.
    pub fn choice(options: &[&str]) -> Self {
        let choices = if options.is_empty() {
            vec![Value::unset()]
        } else {
            options.iter().map(|o| Value::from(*o)).collect()
        };
        Self { choices }
    }

    /// A parameter without a usable default (usually a file path).
    pub fn unset() -> Self {
        Self::value(Value::unset())
    }

    /// A tuple-valued parameter.
    pub fn tuple(items: &[&str]) -> Self {
        Self::value(Value::Tuple(items.iter().map(|s| s.to_string()).collect()))
    }

    pub fn default_value(&self) -> &Value {
        &self.choices[0]
    }

    pub fn choices(&self) -> &[Value] {
        &self.choices
    }
}

/// One group of the catalogue.
#[derive(Debug, Clone)]
pub struct GroupSpec {
    pub name: &'static str,
    pub label: &'static str,
    params: Vec<(&'static str, ParamSpec)>,
}

impl GroupSpec {
    /// Parameters in catalogue order.
    pub fn parameters(&self) -> impl Iterator<Item = (&'static str, &ParamSpec)> {
        self.params.iter().map(|(name, spec)| (*name, spec))
    }

    pub fn spec(&self, name: &str) -> Option<&ParamSpec> {
        self.params
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, spec)| spec)
    }
}

/// An ordered set of groups.
#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    groups: Vec<GroupSpec>,
}

impl Catalogue {
    pub fn with_group(
        mut self,
        name: &'static str,
        label: &'static str,
        params: Vec<(&'static str, ParamSpec)>,
    ) -> Self {
        self.groups.push(GroupSpec {
            name,
            label,
            params,
        });
        self
    }

    pub fn groups(&self) -> &[GroupSpec] {
        &self.groups
    }

    fn group(&self, name: &str) -> Option<&GroupSpec> {
        self.groups.iter().find(|g| g.name == name)
    }
}

/// The full parameter catalogue.
#[derive(Debug, Clone)]
pub struct Registry {
    pub control: Catalogue,
    pub geometry: Catalogue,
    pub events: Catalogue,
}

impl Registry {
    /// Compose a registry from its three catalogues.
    pub fn new(control: Catalogue, geometry: Catalogue, events: Catalogue) -> Self {
        Self {
            control,
            geometry,
            events,
        }
    }

    /// The catalogue written by the exporter.
    pub fn standard() -> Self {
        Self::new(control_catalogue(), geometry_catalogue(), event_catalogue())
    }

    /// All groups: control, then geometry, then events.
    pub fn groups(&self) -> impl Iterator<Item = &GroupSpec> {
        self.control
            .groups()
            .iter()
            .chain(self.geometry.groups())
            .chain(self.events.groups())
    }

    pub fn group(&self, name: &str) -> Option<&GroupSpec> {
        self.control
            .group(name)
            .or_else(|| self.geometry.group(name))
            .or_else(|| self.events.group(name))
    }

    pub fn spec(&self, group: &str, name: &str) -> Result<&ParamSpec, UnknownParameter> {
        self.group(group)
            .and_then(|g| g.spec(name))
            .ok_or_else(|| UnknownParameter::new(group, name))
    }

    /// Default value of a cataloged parameter.
    pub fn default_for(&self, group: &str, name: &str) -> Result<Value, UnknownParameter> {
        self.spec(group, name).map(|spec| spec.default_value().clone())
    }

    /// Allowed values of a parameter, default first.
    pub fn choices(&self, group: &str, name: &str) -> Result<&[Value], UnknownParameter> {
        self.spec(group, name).map(ParamSpec::choices)
    }

    /// Parameter names of `group` in catalogue order; empty for unknown groups.
    pub fn parameters(&self, group: &str) -> Vec<&'static str> {
        self.group(group)
            .map(|g| g.parameters().map(|(name, _)| name).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, group: &str, name: &str) -> bool {
        self.spec(group, name).is_ok()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}

fn control_catalogue() -> Catalogue {
    use param::*;

    Catalogue::default()
        .with_group(
            group::CTRL,
            "Control",
            vec![
                (LICENSE, ParamSpec::choice(&["demo", "full"])),
                (MODEL_PRECISION, ParamSpec::choice(&["single", "double"])),
                ("Units", ParamSpec::choice(&["METRIC", "US Customary"])),
                ("Start Time", ParamSpec::int(0)),
                ("Read Materials File", ParamSpec::unset()),
            ],
        )
        .with_group(
            group::STAB,
            "Stability",
            vec![
                (CELL_SIZE, ParamSpec::float(2.0)),
                (SET_IWL, ParamSpec::float(0.0)),
                ("Timestep", ParamSpec::float(1.0)),
                (
                    VISCOSITY_FORMULATION,
                    ParamSpec::choice(&["SMAGORINSKY", "CONSTANT"]),
                ),
                (VISCOSITY_COEFFICIENTS, ParamSpec::tuple(&["0.5", "0.05"])),
                (CONSTANT_VISCOSITY, ParamSpec::float(1.0)),
                ("Solution Scheme", ParamSpec::choice(&["HPC", "CLASSIC"])),
                ("Hardware", ParamSpec::choice(&["GPU", "CPU"])),
                ("Cell Wet/Dry Depth", ParamSpec::float(0.002)),
            ],
        )
        .with_group(
            group::OUT,
            "Map Output",
            vec![
                (
                    MAP_OUTPUT_FORMAT,
                    ParamSpec::choice(&["ALL", "XMDF", "GRID", "TIF"]),
                ),
                ("Map Output Data Types", ParamSpec::tuple(&["h", "V", "d", "Z0"])),
                ("Map Output Interval", ParamSpec::int(60)),
                ("Time Series Output Interval", ParamSpec::int(60)),
            ],
        )
}

fn geometry_catalogue() -> Catalogue {
    use param::*;

    Catalogue::default()
        .with_group(
            group::GCTRL,
            "Geometry Control",
            vec![
                (SHP_PROJECTION, ParamSpec::unset()),
                ("Read GIS Location", ParamSpec::unset()),
                ("Grid Size (X,Y)", ParamSpec::tuple(&["500", "500"])),
                ("Set Code", ParamSpec::int(1)),
                ("Read GIS Code", ParamSpec::unset()),
                ("Read GRID Zpts", ParamSpec::unset()),
            ],
        )
        .with_group(
            group::GMAT,
            "Materials",
            vec![
                ("Set Mat", ParamSpec::int(1)),
                (READ_GIS_MAT, ParamSpec::unset()),
            ],
        )
        .with_group(
            group::GBC,
            "Boundary Conditions",
            vec![
                (READ_GIS_SA, ParamSpec::unset()),
                (READ_GIS_BC, ParamSpec::unset()),
            ],
        )
        .with_group(
            group::PO,
            "Plot Output",
            vec![(READ_GIS_PO, ParamSpec::unset())],
        )
}

fn event_catalogue() -> Catalogue {
    use param::*;

    Catalogue::default().with_group(
        group::BCE,
        "BC Events",
        vec![
            (SERIES_START, ParamSpec::int(0)),
            (SERIES_END, ParamSpec::int(1000)),
            (START_MAP_OUTPUT, ParamSpec::int(99)),
            (END_TIME, ParamSpec::int(100)),
        ],
    )
}
