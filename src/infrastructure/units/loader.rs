//! Handler unit loader - discovers and loads unit libraries from disk

use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};

use crate::application::errors::LoadError;
use crate::domain::entities::CommandBinding;

/// Entry symbol every unit library must export.
pub const UNIT_ENTRY: &[u8] = b"opsbot_unit_entry";

/// Function signature of the unit entry point.
pub type UnitEntryFn = extern "C" fn() -> *mut dyn HandlerUnit;

/// Contract implemented by every handler unit.
///
/// A unit declares its commands explicitly through [`HandlerUnit::commands`];
/// the loader never inspects exported symbol names beyond the single entry
/// point.
pub trait HandlerUnit: Send + Sync {
    /// Informational unit name. The registry keys units by file stem.
    fn name(&self) -> &str;

    /// The commands this unit exports.
    fn commands(&self) -> Vec<CommandBinding>;
}

/// A candidate unit file found by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitCandidate {
    /// Unit identifier, derived from the file stem.
    pub unit: String,
    pub path: PathBuf,
}

/// Everything produced by loading one unit.
pub struct UnitExports {
    pub unit: String,
    pub commands: Vec<CommandBinding>,
    /// Keeps the backing library mapped for as long as its handlers are
    /// installed. `None` for loaders that do not map libraries.
    pub library: Option<Library>,
}

/// Loader seam. The registry depends on this trait, not on libloading,
/// so its behavior is testable without compiled unit artifacts.
pub trait UnitLoader: Send + Sync {
    /// List candidate units, creating the directory if absent.
    fn scan(&self) -> Result<Vec<UnitCandidate>, LoadError>;

    /// Load one candidate. A failure is isolated to that candidate.
    fn load(&self, candidate: &UnitCandidate) -> Result<UnitExports, LoadError>;

    /// Re-load a previously loaded unit from its current on-disk state.
    fn reload(&self, unit: &str) -> Result<UnitExports, LoadError>;
}

/// Lists unit candidates in `dir`, creating the directory if missing.
///
/// Only files with the given extension count; hidden files and `_`-prefixed
/// stems are reserved for non-unit artifacts and skipped. Candidates are
/// returned sorted by unit name so collision resolution does not depend on
/// filesystem enumeration order.
pub fn scan_units(dir: &Path, extension: &str) -> Result<Vec<UnitCandidate>, LoadError> {
    std::fs::create_dir_all(dir).map_err(|e| LoadError::Directory {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let entries = std::fs::read_dir(dir).map_err(|e| LoadError::Directory {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut found = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Failed to read directory entry: {}", e);
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if stem.starts_with('.') || stem.starts_with('_') {
            continue;
        }

        found.push(UnitCandidate {
            unit: stem.to_string(),
            path,
        });
    }

    found.sort_by(|a, b| a.unit.cmp(&b.unit));
    Ok(found)
}

/// Loads handler units from platform dynamic libraries.
pub struct LibraryLoader {
    unit_dir: PathBuf,
}

impl LibraryLoader {
    pub fn new(unit_dir: impl Into<PathBuf>) -> Self {
        Self {
            unit_dir: unit_dir.into(),
        }
    }

    fn load_library(&self, unit: &str, path: &Path) -> Result<UnitExports, LoadError> {
        let library = unsafe { Library::new(path) }.map_err(|e| LoadError::Unit {
            unit: unit.to_string(),
            reason: format!("failed to open library: {}", e),
        })?;

        let entry: Symbol<UnitEntryFn> =
            unsafe { library.get(UNIT_ENTRY) }.map_err(|e| LoadError::Unit {
                unit: unit.to_string(),
                reason: format!("missing entry symbol: {}", e),
            })?;

        let raw = entry();
        if raw.is_null() {
            return Err(LoadError::Unit {
                unit: unit.to_string(),
                reason: "unit entry returned null".to_string(),
            });
        }
        let instance = unsafe { Box::from_raw(raw) };

        let commands = instance.commands();
        tracing::info!(
            "Loaded unit: {} ({}, {} commands)",
            unit,
            instance.name(),
            commands.len()
        );

        // The instance can drop here; the bindings only need the library
        // mapping itself to stay alive.
        Ok(UnitExports {
            unit: unit.to_string(),
            commands,
            library: Some(library),
        })
    }

    fn unit_path(&self, unit: &str) -> PathBuf {
        self.unit_dir
            .join(format!("{}.{}", unit, std::env::consts::DLL_EXTENSION))
    }
}

impl UnitLoader for LibraryLoader {
    fn scan(&self) -> Result<Vec<UnitCandidate>, LoadError> {
        scan_units(&self.unit_dir, std::env::consts::DLL_EXTENSION)
    }

    fn load(&self, candidate: &UnitCandidate) -> Result<UnitExports, LoadError> {
        self.load_library(&candidate.unit, &candidate.path)
    }

    fn reload(&self, unit: &str) -> Result<UnitExports, LoadError> {
        let path = self.unit_path(unit);
        if !path.exists() {
            return Err(LoadError::Missing(unit.to_string()));
        }
        self.load_library(unit, &path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_creates_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("units");

        let found = scan_units(&dir, "unit").unwrap();
        assert!(found.is_empty());
        assert!(dir.is_dir());
    }

    #[test]
    fn scan_skips_marker_and_foreign_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("alpha.unit"), "").unwrap();
        std::fs::write(tmp.path().join("_marker.unit"), "").unwrap();
        std::fs::write(tmp.path().join(".hidden.unit"), "").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "").unwrap();

        let found = scan_units(tmp.path(), "unit").unwrap();
        let names: Vec<&str> = found.iter().map(|c| c.unit.as_str()).collect();
        assert_eq!(names, vec!["alpha"]);
    }

    #[test]
    fn scan_orders_candidates_by_name() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("zeta.unit"), "").unwrap();
        std::fs::write(tmp.path().join("alpha.unit"), "").unwrap();
        std::fs::write(tmp.path().join("mid.unit"), "").unwrap();

        let found = scan_units(tmp.path(), "unit").unwrap();
        let names: Vec<&str> = found.iter().map(|c| c.unit.as_str()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn loading_a_non_library_fails_cleanly() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = LibraryLoader::new(tmp.path());
        let path = tmp
            .path()
            .join(format!("broken.{}", std::env::consts::DLL_EXTENSION));
        std::fs::write(&path, "definitely not a shared library").unwrap();

        let candidate = UnitCandidate {
            unit: "broken".to_string(),
            path,
        };
        assert!(loader.load(&candidate).is_err());
    }

    #[test]
    fn reloading_a_missing_unit_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = LibraryLoader::new(tmp.path());
        assert!(matches!(
            loader.reload("ghost"),
            Err(LoadError::Missing(_))
        ));
    }
}
