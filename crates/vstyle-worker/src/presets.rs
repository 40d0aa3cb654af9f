//! Preset catalog: built-ins plus JSON files from the presets directory.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use vstyle_models::Preset;

use crate::error::{WorkerError, WorkerResult};

/// Presets keyed by lowercase name. Custom files override built-ins.
#[derive(Debug, Clone)]
pub struct PresetCatalog {
    dir: Option<PathBuf>,
    presets: BTreeMap<String, Preset>,
}

impl Default for PresetCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PresetCatalog {
    /// Only the built-in presets.
    pub fn builtin() -> Self {
        let presets = Preset::builtins()
            .into_iter()
            .map(|p| (p.name.to_lowercase(), p))
            .collect();
        Self { dir: None, presets }
    }

    /// Built-ins overlaid with every valid `<name>.json` in `dir`.
    ///
    /// A missing directory yields just the built-ins. Unreadable or invalid
    /// files are skipped with a warning.
    pub fn load(dir: impl Into<PathBuf>) -> WorkerResult<Self> {
        let dir = dir.into();
        let mut catalog = Self::builtin();

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Presets directory {} does not exist", dir.display());
                catalog.dir = Some(dir);
                return Ok(catalog);
            }
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_preset(&path) {
                Ok(preset) => {
                    debug!("Loaded preset '{}' from {}", preset.name, path.display());
                    catalog.presets.insert(preset.name.to_lowercase(), preset);
                }
                Err(e) => warn!("Skipping preset {}: {}", path.display(), e),
            }
        }

        catalog.dir = Some(dir);
        Ok(catalog)
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&Preset> {
        self.presets.get(&name.trim().to_lowercase())
    }

    /// Presets sorted by name.
    pub fn list(&self) -> Vec<&Preset> {
        self.presets.values().collect()
    }

    /// Validate `preset`, write it to the presets directory and register it.
    pub fn save(&mut self, preset: Preset) -> WorkerResult<PathBuf> {
        let dir = self
            .dir
            .clone()
            .ok_or_else(|| WorkerError::config_error("No presets directory configured"))?;
        let name = preset.name.trim().to_lowercase();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(WorkerError::invalid_preset(&preset.name, "name must be alphanumeric"));
        }
        preset
            .validate()
            .map_err(|e| WorkerError::invalid_preset(&preset.name, e.to_string()))?;

        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.json", name));
        fs::write(&path, serde_json::to_vec_pretty(&preset)?)?;
        self.presets.insert(name, preset);
        Ok(path)
    }
}

fn read_preset(path: &Path) -> WorkerResult<Preset> {
    let mut preset: Preset = serde_json::from_slice(&fs::read(path)?)?;
    if preset.name.trim().is_empty() {
        preset.name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
    }
    preset
        .validate()
        .map_err(|e| WorkerError::invalid_preset(&preset.name, e.to_string()))?;
    Ok(preset)
}
