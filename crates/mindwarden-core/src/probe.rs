//! Read-only views of the host: save slots and CPU temperature.

use std::path::{Path, PathBuf};

use tracing::warn;

const SAVE_EXTENSION: &str = ".msav";
const DEFAULT_THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Save slots written by the game server.
pub trait SlotStore: Send + Sync {
    fn exists(&self, slot: &str) -> bool;
    /// Slot names without extension, backups excluded.
    fn list(&self) -> Vec<String>;
}

/// Slots stored as `<slot>.msav` files in one directory.
#[derive(Debug, Clone)]
pub struct SaveDir {
    dir: PathBuf,
}

impl SaveDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn file_names(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Cannot read save directory");
                return Vec::new();
            }
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }
}

impl SlotStore for SaveDir {
    fn exists(&self, slot: &str) -> bool {
        if slot.is_empty() {
            return false;
        }
        let wanted = format!("{slot}{SAVE_EXTENSION}");
        self.file_names().iter().any(|name| *name == wanted)
    }

    fn list(&self) -> Vec<String> {
        self.file_names()
            .into_iter()
            .filter(|name| !name.contains("backup"))
            .filter_map(|name| name.strip_suffix(SAVE_EXTENSION).map(str::to_string))
            .collect()
    }
}

/// Source of the CPU temperature in degrees Celsius.
pub trait ThermalProbe: Send + Sync {
    fn cpu_temperature(&self) -> f64;
}

/// Linux thermal zone file holding millidegrees.
#[derive(Debug, Clone)]
pub struct ThermalZone {
    path: PathBuf,
}

impl ThermalZone {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ThermalZone {
    fn default() -> Self {
        Self::new(DEFAULT_THERMAL_ZONE)
    }
}

impl ThermalProbe for ThermalZone {
    /// Returns 0.0 when the zone is missing or malformed.
    fn cpu_temperature(&self) -> f64 {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read temperature");
                return 0.0;
            }
        };
        match raw.trim().parse::<i64>() {
            Ok(milli) => milli as f64 / 1000.0,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Temperature is not an integer");
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn slots_exclude_backups_and_other_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["1.msav", "171430.msav", "1-backup.msav", "notes.txt"] {
            touch(dir.path(), name);
        }
        let store = SaveDir::new(dir.path());
        assert_eq!(store.list(), vec!["1", "171430"]);
        assert!(store.exists("171430"));
        assert!(store.exists("1-backup"));
        assert!(!store.exists("2"));
        assert!(!store.exists(""));
    }

    #[test]
    fn missing_save_dir_is_empty() {
        let store = SaveDir::new("/nonexistent/mindwarden/saves");
        assert!(store.list().is_empty());
        assert!(!store.exists("1"));
    }

    #[test]
    fn thermal_zone_reads_millidegrees() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp");
        std::fs::write(&path, "55306\n").unwrap();
        let probe = ThermalZone::new(&path);
        assert!((probe.cpu_temperature() - 55.306).abs() < 1e-9);

        std::fs::write(&path, "hot").unwrap();
        assert_eq!(probe.cpu_temperature(), 0.0);
        assert_eq!(ThermalZone::new(dir.path().join("none")).cpu_temperature(), 0.0);
    }
}
