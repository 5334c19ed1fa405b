//! Finding and parsing the `*.php` files of a directory

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use cage_ast::{UnitId, UnitRole, Units};
use cage_parser::{ParseError, Parser};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to walk {}", dir.display())]
    Walk {
        dir: PathBuf,
        #[source]
        error: walkdir::Error,
    },
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        error: io::Error,
    },
    #[error("failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        text: String,
        #[source]
        error: ParseError,
    },
}

/// Where a loaded unit came from
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub unit: UnitId,
    /// Last component of the scanned directory
    pub dir_name: PathBuf,
    /// Path below the scanned directory
    pub relative: PathBuf,
}

impl SourceFile {
    /// `out/<dir name>/<relative path>`
    pub fn output_path(&self, out: &Path) -> PathBuf {
        out.join(&self.dir_name).join(&self.relative)
    }
}

pub struct Loader {
    depth: usize,
    units: Units,
    files: Vec<SourceFile>,
}

impl Loader {
    /// Files directly inside a scanned directory are at level zero; only
    /// levels below `depth` are loaded
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            units: Units::new(),
            files: Vec::new(),
        }
    }

    /// Parse every `*.php` file under `dir`, returning how many were added
    pub fn load_dir(&mut self, dir: &Path, role: UnitRole) -> Result<usize, LoadError> {
        let dir_name = dir.file_name().map(PathBuf::from).unwrap_or_default();
        let before = self.files.len();

        let walker = WalkDir::new(dir)
            .max_depth(self.depth)
            .sort_by_file_name()
            .into_iter();
        for entry in walker {
            let entry = entry.map_err(|error| LoadError::Walk {
                dir: dir.to_path_buf(),
                error,
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "php") {
                continue;
            }

            let unit = self.load_file(path, role)?;
            let relative = path.strip_prefix(dir).unwrap_or(path).to_path_buf();
            debug!(path = %relative.display(), ?role, "loaded");
            self.files.push(SourceFile {
                unit,
                dir_name: dir_name.clone(),
                relative,
            });
        }

        Ok(self.files.len() - before)
    }

    pub fn load_file(&mut self, path: &Path, role: UnitRole) -> Result<UnitId, LoadError> {
        let text = fs::read_to_string(path).map_err(|error| LoadError::Read {
            path: path.to_path_buf(),
            error,
        })?;
        match Parser::parse(&text) {
            Ok(tree) => Ok(self.units.add(path, text, tree, role)),
            Err(error) => Err(LoadError::Parse {
                path: path.to_path_buf(),
                text,
                error,
            }),
        }
    }

    pub fn finish(self) -> (Units, Vec<SourceFile>) {
        (self.units, self.files)
    }
}
