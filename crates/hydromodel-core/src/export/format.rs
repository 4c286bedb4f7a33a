//! Rendering of parameter values as control-file lines.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use super::ExportError;
use crate::codec::Value;
use crate::config::ExportMode;
use crate::paths::ModelFiles;
use crate::registry::param;

/// Companion files of a shapefile, copied along with the `.shp`.
const SHAPEFILE_SIDECARS: &[&str] = &["shx", "dbf", "prj", "cpg", "qpj"];

const GIS_EXTENSIONS: &[&str] = &["shp", "shx", "dbf", "prj", "cpg", "qpj", "mif", "mid", "gpkg"];
const GRID_EXTENSIONS: &[&str] = &["asc", "flt", "hdr", "tif", "tiff", "dem", "nc"];

/// True if the parameter names a file.
pub fn is_file_reference(name: &str) -> bool {
    name.starts_with("Read")
        || name.ends_with("Database")
        || name.ends_with("projection")
        || name.ends_with("File")
}

/// Path of `target` relative to `base`. Both must be absolute.
///
/// Purely lexical; paths on different roots (drives) come back unchanged.
pub fn relative_path(base: &Path, target: &Path) -> PathBuf {
    let base: Vec<Component> = base.components().collect();
    let target: Vec<Component> = target.components().collect();

    let common = base
        .iter()
        .zip(&target)
        .take_while(|(a, b)| a == b)
        .count();
    if common == 0 {
        return target.iter().collect();
    }

    let mut relative = PathBuf::new();
    for _ in common..base.len() {
        relative.push("..");
    }
    for component in &target[common..] {
        relative.push(component);
    }
    if relative.as_os_str().is_empty() {
        relative.push(".");
    }
    relative
}

/// Render a path with `\` separators, the way the engine reads them.
pub fn engine_path(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push_str(&prefix.as_os_str().to_string_lossy()),
            Component::RootDir => out.push('\\'),
            other => {
                if !out.is_empty() && !out.ends_with('\\') {
                    out.push('\\');
                }
                out.push_str(&other.as_os_str().to_string_lossy());
            }
        }
    }
    out
}

/// Folder of the output tree a bundled file is copied into.
pub fn bundle_folder(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if GIS_EXTENSIONS.contains(&extension.as_str()) {
        "gis"
    } else if GRID_EXTENSIONS.contains(&extension.as_str()) {
        "grid"
    } else {
        "model"
    }
}

/// Turns file references into paths relative to the `runs` folder.
#[derive(Debug, Clone)]
pub struct PathResolver {
    runs_dir: PathBuf,
    output_root: PathBuf,
    mode: ExportMode,
}

impl PathResolver {
    pub fn new(files: &ModelFiles, mode: ExportMode) -> Result<Self, ExportError> {
        Ok(Self {
            runs_dir: absolute(&files.runs_dir)?,
            output_root: absolute(&files.output_root)?,
            mode,
        })
    }

    pub fn mode(&self) -> ExportMode {
        self.mode
    }

    /// Engine path of `source`, copying it into the output tree first when
    /// bundling.
    pub fn resolve(&self, source: &Path) -> Result<String, ExportError> {
        let source = absolute(source)?;
        let target = match self.mode {
            ExportMode::Reference => source,
            ExportMode::Bundle => self.bundle(&source)?,
        };
        Ok(engine_path(&relative_path(&self.runs_dir, &target)))
    }

    fn bundle(&self, source: &Path) -> Result<PathBuf, ExportError> {
        if source.starts_with(&self.output_root) {
            return Ok(source.to_path_buf());
        }

        let Some(file_name) = source.file_name() else {
            return Ok(source.to_path_buf());
        };
        let folder = self.output_root.join(bundle_folder(source));
        let destination = folder.join(file_name);
        copy_if_absent(source, &destination)?;

        let is_shapefile = source
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("shp"));
        if is_shapefile {
            for extension in SHAPEFILE_SIDECARS {
                let sidecar = source.with_extension(extension);
                if sidecar.exists() {
                    copy_if_absent(&sidecar, &destination.with_extension(extension))?;
                }
            }
        }

        Ok(destination)
    }
}

fn absolute(path: &Path) -> Result<PathBuf, ExportError> {
    std::path::absolute(path).map_err(|source| ExportError::io(path, source))
}

fn copy_if_absent(from: &Path, to: &Path) -> Result<(), ExportError> {
    if to.exists() {
        log::debug!("{} already bundled", to.display());
        return Ok(());
    }

    let copy_err = |source: io::Error| ExportError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(copy_err)?;
    }
    fs::copy(from, to).map_err(copy_err)?;
    log::info!("Copied {} to {}", from.display(), to.display());
    Ok(())
}

/// Text written after `name == ` for one parameter, or `None` to omit the line.
pub fn format_parameter(
    name: &str,
    value: &Value,
    resolver: &PathResolver,
) -> Result<Option<String>, ExportError> {
    if name == param::READ_GIS_MAT && value.is_unset() {
        log::info!("No materials layer selected; {name} left out");
        return Ok(None);
    }

    if name == param::MAP_OUTPUT_FORMAT && value.as_text() == Some("ALL") {
        return Ok(Some("GRID XMDF".to_string()));
    }

    if is_file_reference(name) {
        if value.is_unset() {
            return Err(ExportError::MissingFileReference(name.to_string()));
        }
        let path = PathBuf::from(value.to_string());
        return resolver.resolve(&path).map(Some);
    }

    if value.is_unset() {
        return Err(ExportError::MissingParameterValue(name.to_string()));
    }

    Ok(Some(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::ProjectLayout;
    use tempfile::tempdir;

    fn resolver(root: &Path, mode: ExportMode) -> PathResolver {
        let files = ProjectLayout::new(root).model_files("m");
        PathResolver::new(&files, mode).unwrap()
    }

    #[test]
    fn file_reference_names() {
        assert!(is_file_reference("Read GIS BC"));
        assert!(is_file_reference("BC Database"));
        assert!(is_file_reference("SHP projection"));
        assert!(is_file_reference("Geometry Control File"));
        assert!(!is_file_reference("Cell Size"));
        assert!(!is_file_reference("Set Code"));
    }

    #[test]
    fn relative_paths_climb_out_of_runs() {
        let base = Path::new("/w/user_models/m/runs");
        assert_eq!(
            relative_path(base, Path::new("/w/user_models/m/model/m.tgc")),
            PathBuf::from("../model/m.tgc")
        );
        assert_eq!(
            relative_path(base, Path::new("/data/bc.shp")),
            PathBuf::from("../../../../data/bc.shp")
        );
        assert_eq!(relative_path(base, base), PathBuf::from("."));
    }

    #[test]
    fn engine_paths_use_backslashes() {
        assert_eq!(engine_path(Path::new("../model/m.tgc")), "..\\model\\m.tgc");
        assert_eq!(engine_path(Path::new("bc_dbase")), "bc_dbase");
    }

    #[test]
    fn bundle_folders_by_extension() {
        assert_eq!(bundle_folder(Path::new("a/bc.SHP")), "gis");
        assert_eq!(bundle_folder(Path::new("dem.asc")), "grid");
        assert_eq!(bundle_folder(Path::new("mat.csv")), "model");
        assert_eq!(bundle_folder(Path::new("noext")), "model");
    }

    #[test]
    fn empty_materials_layer_is_skipped() {
        let dir = tempdir().unwrap();
        let resolver = resolver(dir.path(), ExportMode::Reference);

        let line = format_parameter(param::READ_GIS_MAT, &Value::unset(), &resolver).unwrap();
        assert_eq!(line, None);
    }

    #[test]
    fn empty_file_reference_is_an_error() {
        let dir = tempdir().unwrap();
        let resolver = resolver(dir.path(), ExportMode::Reference);

        let err = format_parameter(param::READ_GIS_BC, &Value::unset(), &resolver).unwrap_err();
        assert!(matches!(err, ExportError::MissingFileReference(ref n) if n == "Read GIS BC"));
    }

    #[test]
    fn empty_value_is_an_error() {
        let dir = tempdir().unwrap();
        let resolver = resolver(dir.path(), ExportMode::Reference);

        let err = format_parameter("Timestep", &Value::unset(), &resolver).unwrap_err();
        assert!(matches!(err, ExportError::MissingParameterValue(_)));
    }

    #[test]
    fn all_output_formats_expand() {
        let dir = tempdir().unwrap();
        let resolver = resolver(dir.path(), ExportMode::Reference);

        let line = format_parameter(param::MAP_OUTPUT_FORMAT, &Value::from("ALL"), &resolver);
        assert_eq!(line.unwrap().as_deref(), Some("GRID XMDF"));
        let line = format_parameter(param::MAP_OUTPUT_FORMAT, &Value::from("TIF"), &resolver);
        assert_eq!(line.unwrap().as_deref(), Some("TIF"));
    }

    #[test]
    fn tuples_and_floats_use_codec_form() {
        let dir = tempdir().unwrap();
        let resolver = resolver(dir.path(), ExportMode::Reference);

        let coefficients = Value::Tuple(vec!["0.5".to_string(), "0.05".to_string()]);
        let line = format_parameter("Viscosity Coefficients", &coefficients, &resolver);
        assert_eq!(line.unwrap().as_deref(), Some("0.5,0.05"));
        let line = format_parameter("Cell Size", &Value::Float(2.0), &resolver);
        assert_eq!(line.unwrap().as_deref(), Some("2.0"));
    }

    #[test]
    fn reference_mode_points_at_original() {
        let dir = tempdir().unwrap();
        let resolver = resolver(dir.path(), ExportMode::Reference);
        let layer = dir.path().join("gis_in").join("bc.shp");

        let line = format_parameter(param::READ_GIS_BC, &Value::from(layer.to_str().unwrap()), &resolver)
            .unwrap()
            .unwrap();

        assert_eq!(line, "..\\..\\..\\gis_in\\bc.shp");
        assert!(!dir.path().join("user_models/m/gis/bc.shp").exists());
    }

    #[test]
    fn bundle_mode_copies_shapefile_family() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("gis_in");
        fs::create_dir_all(&input).unwrap();
        for ext in ["shp", "shx", "dbf", "prj"] {
            fs::write(input.join(format!("bc.{ext}")), ext).unwrap();
        }
        let resolver = resolver(dir.path(), ExportMode::Bundle);

        let line = resolver.resolve(&input.join("bc.shp")).unwrap();

        assert_eq!(line, "..\\gis\\bc.shp");
        let gis = dir.path().join("user_models/m/gis");
        for ext in ["shp", "shx", "dbf", "prj"] {
            assert!(gis.join(format!("bc.{ext}")).exists(), "{ext}");
        }
        assert!(!gis.join("bc.cpg").exists());
    }

    #[test]
    fn bundle_mode_keeps_existing_copies() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("dem.asc");
        fs::write(&source, "new").unwrap();
        let grid = dir.path().join("user_models/m/grid");
        fs::create_dir_all(&grid).unwrap();
        fs::write(grid.join("dem.asc"), "edited").unwrap();

        let line = resolver(dir.path(), ExportMode::Bundle).resolve(&source).unwrap();

        assert_eq!(line, "..\\grid\\dem.asc");
        assert_eq!(fs::read_to_string(grid.join("dem.asc")).unwrap(), "edited");
    }

    #[test]
    fn bundle_mode_reports_missing_source() {
        let dir = tempdir().unwrap();
        let err = resolver(dir.path(), ExportMode::Bundle)
            .resolve(&dir.path().join("missing.csv"))
            .unwrap_err();
        assert!(matches!(err, ExportError::Copy { .. }));
    }
}
