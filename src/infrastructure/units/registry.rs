//! Command registry - owns the live command table and its reload cycle

use std::collections::HashMap;
use std::sync::RwLock;

use libloading::Library;

use crate::application::errors::LoadError;
use crate::domain::entities::{CommandBinding, CommandHandler};

use super::loader::{UnitExports, UnitLoader};

/// Help text used for commands that declare none.
const NO_DESCRIPTION: &str = "No description";

/// Outcome of populating the table from a directory scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadOutcome {
    /// Commands currently bound.
    pub commands: usize,
    /// Units that loaded cleanly.
    pub units_loaded: usize,
    /// Units that failed and were skipped.
    pub units_failed: usize,
}

#[derive(Default)]
struct RegistryState {
    /// Command name to handler. Kept consistent with `help` at all times.
    commands: HashMap<String, CommandHandler>,
    /// Command name to first help line.
    help: HashMap<String, String>,
    /// Loaded unit identifiers, each holding its library mapping alive
    /// while the unit's handlers are installed.
    loaded: HashMap<String, Option<Library>>,
}

/// The authoritative command table.
///
/// All reads (lookup, enumeration, help) and the single write path (reload)
/// go through this type. State is replaced wholesale on reload, never merged
/// incrementally. A reload never leaves the registry unusable: total load
/// failure is an empty-but-serving table.
pub struct CommandRegistry {
    loader: Box<dyn UnitLoader>,
    state: RwLock<RegistryState>,
}

impl CommandRegistry {
    pub fn new(loader: Box<dyn UnitLoader>) -> Self {
        Self {
            loader,
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Initial scan + load over the units directory. Called once at startup.
    ///
    /// A directory that cannot be created or read is fatal here; individual
    /// unit failures are counted and skipped.
    pub fn initialize(&self) -> Result<LoadOutcome, LoadError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| LoadError::Internal("Lock poisoned".to_string()))?;
        Self::populate(self.loader.as_ref(), &mut state)
    }

    fn populate(
        loader: &dyn UnitLoader,
        state: &mut RegistryState,
    ) -> Result<LoadOutcome, LoadError> {
        let candidates = loader.scan()?;

        let mut outcome = LoadOutcome::default();
        for candidate in &candidates {
            match loader.load(candidate) {
                Ok(exports) => {
                    Self::install(state, exports);
                    outcome.units_loaded += 1;
                }
                Err(e) => {
                    tracing::error!("Error loading unit {}: {}", candidate.unit, e);
                    outcome.units_failed += 1;
                }
            }
        }
        outcome.commands = state.commands.len();
        Ok(outcome)
    }

    fn install(state: &mut RegistryState, exports: UnitExports) {
        let UnitExports {
            unit,
            commands,
            library,
        } = exports;

        for binding in commands {
            // Last writer wins on name collisions; scan order is sorted,
            // so the winner is deterministic.
            state
                .help
                .insert(binding.name.clone(), first_help_line(&binding.help));
            state.commands.insert(binding.name, binding.handler);
        }
        state.loaded.insert(unit, library);
    }

    /// Resolve a command name to its handler. A miss is a user error,
    /// not a fault.
    pub fn lookup(&self, name: &str) -> Option<CommandHandler> {
        self.state.read().ok()?.commands.get(name).cloned()
    }

    /// Number of commands currently bound.
    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.commands.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render the command list: a header, the two built-in entries, then one
    /// line per registered command in sorted name order. Only the first line
    /// of a command's help text ever appears here.
    pub fn help(&self) -> String {
        let mut lines = vec![
            "Available commands:".to_string(),
            "/help - Show this message".to_string(),
            "/reload - Reload handler units".to_string(),
        ];

        if let Ok(state) = self.state.read() {
            let mut names: Vec<&String> = state.help.keys().collect();
            names.sort();
            for name in names {
                lines.push(format!("/{} - {}", name, state.help[name]));
            }
        }

        lines.join("\n")
    }

    /// Discard the whole table and rebuild it from the current directory
    /// contents. Returns the number of commands bound afterwards.
    ///
    /// The diagnostic pass over previously known units reports how many of
    /// them still load cleanly; the final state comes solely from the fresh
    /// rescan, which also picks up units added or removed since the last
    /// load. If the rescan itself fails the table is left empty and the
    /// error is returned.
    pub fn reload(&self) -> Result<usize, LoadError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| LoadError::Internal("Lock poisoned".to_string()))?;

        let mut known: Vec<String> = state.loaded.keys().cloned().collect();
        known.sort();

        state.commands.clear();
        state.help.clear();

        let mut reloaded = 0usize;
        let mut failed = 0usize;
        for unit in &known {
            // The keepalive must drop before the loader re-opens the file,
            // or the resolver would hand back the already-mapped library
            // instead of re-reading disk.
            state.loaded.remove(unit);
            match self.loader.reload(unit) {
                Ok(_) => reloaded += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!("Error reloading unit {}: {}", unit, e);
                }
            }
        }
        state.loaded.clear();
        tracing::info!(
            "Reload check: {} ok, {} failed of {} known units",
            reloaded,
            failed,
            known.len()
        );

        let outcome = Self::populate(self.loader.as_ref(), &mut state)?;
        tracing::info!(
            "Registry rebuilt: {} commands from {} units ({} failed)",
            outcome.commands,
            outcome.units_loaded,
            outcome.units_failed
        );
        Ok(outcome.commands)
    }

    /// Point-in-time snapshot of every binding, for transport-side command
    /// registration. Not a live view.
    pub fn handler_bindings(&self) -> Vec<CommandBinding> {
        let Ok(state) = self.state.read() else {
            return Vec::new();
        };

        let mut bindings: Vec<CommandBinding> = state
            .commands
            .iter()
            .map(|(name, handler)| CommandBinding {
                name: name.clone(),
                help: state
                    .help
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
                handler: handler.clone(),
            })
            .collect();
        bindings.sort_by(|a, b| a.name.cmp(&b.name));
        bindings
    }
}

fn first_help_line(help: &str) -> String {
    match help.lines().map(str::trim).find(|l| !l.is_empty()) {
        Some(line) => line.to_string(),
        None => NO_DESCRIPTION.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::infrastructure::units::loader::{scan_units, UnitCandidate};

    /// Test loader backed by plain-text unit files in a real directory.
    ///
    /// Each non-empty line of a `.unit` file declares one command as
    /// `name|help` (literal `\n` in the help becomes a newline); a file
    /// whose first line is `!fail` refuses to load.
    struct ScriptedLoader {
        dir: PathBuf,
    }

    impl ScriptedLoader {
        fn new(dir: impl Into<PathBuf>) -> Self {
            Self { dir: dir.into() }
        }

        fn parse(unit: &str, path: &Path) -> Result<UnitExports, LoadError> {
            let text = std::fs::read_to_string(path).map_err(|e| LoadError::Unit {
                unit: unit.to_string(),
                reason: e.to_string(),
            })?;

            let mut commands = Vec::new();
            for line in text.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "!fail" {
                    return Err(LoadError::Unit {
                        unit: unit.to_string(),
                        reason: "scripted failure".to_string(),
                    });
                }
                let (name, help) = line.split_once('|').unwrap_or((line, ""));
                commands.push(CommandBinding::new(
                    name,
                    help.replace("\\n", "\n"),
                    |_req| async { Ok(()) },
                ));
            }

            Ok(UnitExports {
                unit: unit.to_string(),
                commands,
                library: None,
            })
        }
    }

    impl UnitLoader for ScriptedLoader {
        fn scan(&self) -> Result<Vec<UnitCandidate>, LoadError> {
            scan_units(&self.dir, "unit")
        }

        fn load(&self, candidate: &UnitCandidate) -> Result<UnitExports, LoadError> {
            Self::parse(&candidate.unit, &candidate.path)
        }

        fn reload(&self, unit: &str) -> Result<UnitExports, LoadError> {
            let path = self.dir.join(format!("{}.unit", unit));
            if !path.exists() {
                return Err(LoadError::Missing(unit.to_string()));
            }
            Self::parse(unit, &path)
        }
    }

    fn registry_in(dir: &Path) -> CommandRegistry {
        CommandRegistry::new(Box::new(ScriptedLoader::new(dir)))
    }

    fn write_unit(dir: &Path, unit: &str, body: &str) {
        std::fs::write(dir.join(format!("{}.unit", unit)), body).unwrap();
    }

    #[test]
    fn unit_binds_exactly_its_declared_commands() {
        let tmp = tempfile::tempdir().unwrap();
        write_unit(tmp.path(), "alpha", "foo|does foo things");

        let registry = registry_in(tmp.path());
        let outcome = registry.initialize().unwrap();

        assert_eq!(outcome.commands, 1);
        assert!(registry.lookup("foo").is_some());
        assert!(registry.lookup("alpha").is_none());
    }

    #[test]
    fn failing_unit_is_isolated() {
        let tmp = tempfile::tempdir().unwrap();
        write_unit(tmp.path(), "good", "ping|pong\nstatus|host status");
        write_unit(tmp.path(), "bad", "!fail");

        let registry = registry_in(tmp.path());
        let outcome = registry.initialize().unwrap();

        assert_eq!(outcome.units_loaded, 1);
        assert_eq!(outcome.units_failed, 1);
        assert!(registry.lookup("ping").is_some());
        assert!(registry.lookup("status").is_some());
    }

    #[test]
    fn empty_directory_initializes_clean() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("units");

        let registry = registry_in(&dir);
        let outcome = registry.initialize().unwrap();

        assert_eq!(outcome, LoadOutcome::default());
        assert!(registry.is_empty());
        assert!(dir.is_dir());
    }

    #[test]
    fn reload_reflects_current_disk_state() {
        let tmp = tempfile::tempdir().unwrap();
        write_unit(tmp.path(), "a", "alpha|first");
        write_unit(tmp.path(), "b", "beta|second");

        let registry = registry_in(tmp.path());
        registry.initialize().unwrap();
        assert!(registry.lookup("beta").is_some());

        std::fs::remove_file(tmp.path().join("b.unit")).unwrap();
        write_unit(tmp.path(), "c", "gamma|third");

        let count = registry.reload().unwrap();
        assert_eq!(count, 2);
        assert!(registry.lookup("alpha").is_some());
        assert!(registry.lookup("gamma").is_some());
        assert!(registry.lookup("beta").is_none());
    }

    #[test]
    fn reload_picks_up_edited_units() {
        let tmp = tempfile::tempdir().unwrap();
        write_unit(tmp.path(), "a", "greet|old text");

        let registry = registry_in(tmp.path());
        registry.initialize().unwrap();

        write_unit(tmp.path(), "a", "greet|new text");
        registry.reload().unwrap();

        assert!(registry.help().contains("/greet - new text"));
    }

    #[test]
    fn help_lists_builtins_and_first_lines_only() {
        let tmp = tempfile::tempdir().unwrap();
        write_unit(
            tmp.path(),
            "a",
            "multi|First line of help.\\nSecond line stays hidden.\nbare",
        );

        let registry = registry_in(tmp.path());
        registry.initialize().unwrap();
        let help = registry.help();

        assert!(help.contains("/help - Show this message"));
        assert!(help.contains("/reload - Reload handler units"));
        assert!(help.contains("/multi - First line of help."));
        assert!(!help.contains("Second line"));
        assert!(help.contains("/bare - No description"));
    }

    #[test]
    fn name_collision_keeps_last_loaded_binding() {
        let tmp = tempfile::tempdir().unwrap();
        write_unit(tmp.path(), "a", "ping|from unit a");
        write_unit(tmp.path(), "b", "ping|from unit b");

        let registry = registry_in(tmp.path());
        let outcome = registry.initialize().unwrap();

        assert_eq!(outcome.commands, 1);
        // Scan order is sorted, so unit b is processed last and wins.
        assert!(registry.help().contains("/ping - from unit b"));
        assert!(!registry.help().contains("from unit a"));
    }

    #[test]
    fn end_to_end_one_good_one_broken_unit() {
        let tmp = tempfile::tempdir().unwrap();
        write_unit(tmp.path(), "a", "echo|Echo back input");
        write_unit(tmp.path(), "b", "!fail");

        let registry = registry_in(tmp.path());
        let outcome = registry.initialize().unwrap();

        assert_eq!(outcome.commands, 1);
        assert_eq!(outcome.units_failed, 1);

        let help = registry.help();
        assert_eq!(help.lines().count(), 4);
        assert!(help.ends_with("/echo - Echo back input"));
    }

    #[test]
    fn reload_scan_failure_leaves_table_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("units");
        std::fs::create_dir(&dir).unwrap();
        write_unit(&dir, "a", "alpha|first");

        let registry = registry_in(&dir);
        registry.initialize().unwrap();
        assert!(registry.lookup("alpha").is_some());

        // Replace the directory with a plain file so the rescan cannot run.
        std::fs::remove_dir_all(&dir).unwrap();
        std::fs::write(&dir, "not a directory").unwrap();

        assert!(registry.reload().is_err());
        assert!(registry.is_empty());
        assert!(registry.lookup("alpha").is_none());
    }

    #[test]
    fn handler_bindings_is_a_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        write_unit(tmp.path(), "a", "one|first\ntwo|second");

        let registry = registry_in(tmp.path());
        registry.initialize().unwrap();

        let bindings = registry.handler_bindings();
        let names: Vec<&str> = bindings.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["one", "two"]);

        // Mutating the registry afterwards must not affect the snapshot.
        std::fs::remove_file(tmp.path().join("a.unit")).unwrap();
        registry.reload().unwrap();
        assert_eq!(bindings.len(), 2);
        assert!(registry.is_empty());
    }
}
