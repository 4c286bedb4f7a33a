//! Output tree creation.

use std::fs;
use std::io;
use std::path::Path;

use walkdir::WalkDir;

use super::ExportError;
use crate::paths::{ModelFiles, OUTPUT_FOLDERS};

/// What [`scaffold_output_tree`] did.
#[derive(Debug, Default)]
pub struct Scaffold {
    /// Template files copied into the output tree.
    pub copied: usize,
    /// Entries that could not be copied or created.
    pub errors: Vec<ExportError>,
}

/// Copy the template into the output tree and create the standard folders.
///
/// Files that already exist in the output tree are never overwritten; the
/// operator may have edited them. A failed entry is recorded and the rest of
/// the template is still copied. The standard folders are always attempted.
pub fn scaffold_output_tree(files: &ModelFiles, template_dir: Option<&Path>) -> Scaffold {
    let mut scaffold = Scaffold::default();

    if let Some(template) = template_dir {
        if template.is_dir() {
            copy_tree(template, &files.output_root, &mut scaffold);
        } else {
            log::warn!("Template folder {} does not exist", template.display());
        }
    }

    for folder in OUTPUT_FOLDERS {
        let path = files.output_root.join(folder);
        if let Err(source) = fs::create_dir_all(&path) {
            scaffold.errors.push(ExportError::io(&path, source));
        }
    }

    scaffold
}

fn copy_tree(template: &Path, output_root: &Path, scaffold: &mut Scaffold) {
    for entry in WalkDir::new(template) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().unwrap_or(template).to_path_buf();
                scaffold.errors.push(ExportError::io(&path, io::Error::from(err)));
                continue;
            }
        };

        let Ok(relative) = entry.path().strip_prefix(template) else {
            continue;
        };
        let target = output_root.join(relative);

        if entry.file_type().is_dir() {
            if let Err(source) = fs::create_dir_all(&target) {
                scaffold.errors.push(ExportError::io(&target, source));
            }
        } else if !target.exists() {
            match fs::copy(entry.path(), &target) {
                Ok(_) => scaffold.copied += 1,
                Err(source) => scaffold.errors.push(ExportError::Copy {
                    from: entry.path().to_path_buf(),
                    to: target,
                    source,
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::ProjectLayout;
    use tempfile::tempdir;

    #[test]
    fn creates_standard_folders() {
        let dir = tempdir().unwrap();
        let files = ProjectLayout::new(dir.path()).model_files("m");

        let scaffold = scaffold_output_tree(&files, None);
        assert_eq!(scaffold.copied, 0);
        assert!(scaffold.errors.is_empty());

        for folder in OUTPUT_FOLDERS {
            assert!(files.output_root.join(folder).is_dir(), "{folder}");
        }
    }

    #[test]
    fn template_copy_never_overwrites() {
        let dir = tempdir().unwrap();
        let template = dir.path().join("template");
        fs::create_dir_all(template.join("model")).unwrap();
        fs::write(template.join("model").join("materials.csv"), "template").unwrap();
        fs::write(template.join("readme.txt"), "template").unwrap();

        let files = ProjectLayout::new(dir.path()).model_files("m");
        fs::create_dir_all(&files.output_root).unwrap();
        fs::write(files.output_root.join("readme.txt"), "edited").unwrap();

        let scaffold = scaffold_output_tree(&files, Some(&template));

        assert_eq!(scaffold.copied, 1);
        assert!(scaffold.errors.is_empty());
        assert_eq!(
            fs::read_to_string(files.output_root.join("readme.txt")).unwrap(),
            "edited"
        );
        assert!(files.output_root.join("model").join("materials.csv").exists());
    }

    #[test]
    fn missing_template_is_not_fatal() {
        let dir = tempdir().unwrap();
        let files = ProjectLayout::new(dir.path()).model_files("m");

        let scaffold = scaffold_output_tree(&files, Some(&dir.path().join("nope")));
        assert_eq!(scaffold.copied, 0);
        assert!(files.runs_dir.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn broken_template_entry_does_not_stop_the_copy() {
        let dir = tempdir().unwrap();
        let template = dir.path().join("template");
        fs::create_dir_all(template.join("model")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), template.join("a_dangling")).unwrap();
        fs::write(template.join("model").join("materials.csv"), "template").unwrap();
        fs::write(template.join("readme.txt"), "template").unwrap();

        let files = ProjectLayout::new(dir.path()).model_files("m");
        let scaffold = scaffold_output_tree(&files, Some(&template));

        assert_eq!(scaffold.copied, 2);
        assert_eq!(scaffold.errors.len(), 1);
        assert!(matches!(&scaffold.errors[0], ExportError::Copy { from, .. } if from.ends_with("a_dangling")));
        for folder in OUTPUT_FOLDERS {
            assert!(files.output_root.join(folder).is_dir(), "{folder}");
        }
        assert!(files.output_root.join("model").join("materials.csv").exists());
    }
}
