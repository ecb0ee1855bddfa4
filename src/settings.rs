use std::{fs, io, path::{Path, PathBuf}};

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{info, warn, error};

use crate::models::AppSettings;

/// Key the form settings live under inside the store file.
pub const SETTINGS_KEY: &str = "sequencerSettings";

/// JSON-file backed key-value store holding the form settings. Reads and
/// writes never fail to the caller: problems are logged and defaults used.
pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<AppSettings>,
}

impl SettingsStore {
    /// Opens the store and restores the last saved settings.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = load_from(&path);
        Self { path, current: RwLock::new(current) }
    }

    pub fn get(&self) -> AppSettings {
        self.current.read().clone()
    }

    /// Replaces the in-memory settings and persists them. A failed write is logged only.
    /// The write lock is held across the save so the file always ends with the last value set.
    pub fn set(&self, settings: AppSettings) {
        let mut current = self.current.write();
        *current = settings;
        if let Err(e) = save_to(&self.path, &current) {
            error!(path = %self.path.display(), "Failed to save settings: {}", e);
        }
    }
}

fn read_map(path: &Path) -> io::Result<Map<String, Value>> {
    let raw = fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&raw)? {
        Value::Object(map) => Ok(map),
        _ => Err(io::Error::new(io::ErrorKind::InvalidData, "settings file is not a JSON object")),
    }
}

fn load_from(path: &Path) -> AppSettings {
    let map = match read_map(path) {
        Ok(map) => map,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No saved settings, using defaults");
            return AppSettings::default();
        }
        Err(e) => {
            warn!(path = %path.display(), "Failed to load settings, using defaults: {}", e);
            return AppSettings::default();
        }
    };

    match map.get(SETTINGS_KEY) {
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            warn!("Stored settings are unreadable, using defaults: {}", e);
            AppSettings::default()
        }),
        None => AppSettings::default(),
    }
}

fn save_to(path: &Path, settings: &AppSettings) -> io::Result<()> {
    // Keep whatever else lives in the store; an unreadable file is replaced.
    let mut map = read_map(path).unwrap_or_default();
    map.insert(SETTINGS_KEY.to_string(), serde_json::to_value(settings)?);

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(&Value::Object(map))?)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}
