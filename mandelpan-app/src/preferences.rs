use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use mandelpan_core::Viewport;
use mandelpan_render::{History, SchedulerConfig};

// ---------------------------------------------------------------------------
// Application preferences
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppPreferences {
    #[serde(default = "default_raster_width")]
    pub raster_width: u32,
    #[serde(default = "default_raster_height")]
    pub raster_height: u32,
    #[serde(default = "default_max_iterations")]
    pub default_max_iterations: u32,
    /// Magnification applied per wheel tick.
    #[serde(default = "default_zoom_step")]
    pub zoom_step: f64,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Row-pool size; 0 lets rayon pick one thread per core.
    #[serde(default)]
    pub render_threads: usize,
    /// Where `save` writes PNGs. When empty, an `images/` folder next to the executable is used.
    #[serde(default)]
    pub export_dir: String,
}

fn default_raster_width() -> u32 {
    800
}
fn default_raster_height() -> u32 {
    600
}
fn default_max_iterations() -> u32 {
    Viewport::DEFAULT_MAX_ITERATIONS
}
fn default_zoom_step() -> f64 {
    2.0
}
fn default_history_limit() -> usize {
    History::DEFAULT_LIMIT
}

impl Default for AppPreferences {
    fn default() -> Self {
        Self {
            raster_width: default_raster_width(),
            raster_height: default_raster_height(),
            default_max_iterations: default_max_iterations(),
            zoom_step: default_zoom_step(),
            history_limit: default_history_limit(),
            render_threads: 0,
            export_dir: String::new(),
        }
    }
}

impl AppPreferences {
    /// Load preferences from next to the executable, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(json) => match serde_json::from_str::<AppPreferences>(&json) {
                    Ok(prefs) => {
                        info!("Loaded preferences from {}", path.display());
                        return prefs.sanitized();
                    }
                    Err(e) => {
                        error!("Failed to parse preferences: {e}");
                    }
                },
                Err(e) => {
                    error!("Failed to read preferences file: {e}");
                }
            }
        } else {
            debug!("No preferences file at {}", path.display());
        }
        Self::default()
    }

    /// Persist preferences to disk.
    pub fn save(&self) {
        self.save_to(&config_path());
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory: {e}");
                return;
            }
        }
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, &json) {
                    error!("Failed to write preferences: {e}");
                } else {
                    debug!("Saved preferences");
                }
            }
            Err(e) => error!("Failed to serialize preferences: {e}"),
        }
    }

    /// Replace out-of-range values with their defaults.
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.raster_width == 0 || self.raster_height == 0 {
            self.raster_width = defaults.raster_width;
            self.raster_height = defaults.raster_height;
        }
        if Viewport::home(self.default_max_iterations).is_err() {
            self.default_max_iterations = defaults.default_max_iterations;
        }
        if !(self.zoom_step.is_finite() && self.zoom_step > 1.0) {
            self.zoom_step = defaults.zoom_step;
        }
        if self.history_limit < History::MIN_LIMIT {
            self.history_limit = defaults.history_limit;
        }
        self
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            history_limit: self.history_limit,
            threads: self.render_threads,
        }
    }

    pub fn export_directory(&self) -> PathBuf {
        if self.export_dir.is_empty() {
            exe_directory().join("images")
        } else {
            PathBuf::from(&self.export_dir)
        }
    }
}

/// Preferences and exports live next to the executable, or in the working
/// directory when its location can't be determined.
fn exe_directory() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn config_path() -> PathBuf {
    exe_directory().join("preferences.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let prefs: AppPreferences = serde_json::from_str(r#"{"zoom_step": 3.0}"#).unwrap();
        assert_eq!(prefs.zoom_step, 3.0);
        assert_eq!(prefs.raster_width, 800);
        assert_eq!(prefs.default_max_iterations, 256);
        assert_eq!(prefs.history_limit, History::DEFAULT_LIMIT);
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join("mandelpan_test_prefs");
        let path = dir.join("preferences.json");
        let prefs = AppPreferences {
            raster_width: 320,
            raster_height: 200,
            render_threads: 2,
            ..AppPreferences::default()
        };
        prefs.save_to(&path);
        assert_eq!(AppPreferences::load_from(&path), prefs);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_or_missing_file_falls_back() {
        let dir = std::env::temp_dir().join("mandelpan_test_prefs_corrupt");
        let path = dir.join("preferences.json");
        assert_eq!(AppPreferences::load_from(&path), AppPreferences::default());

        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(AppPreferences::load_from(&path), AppPreferences::default());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn out_of_range_values_are_sanitized() {
        let dir = std::env::temp_dir().join("mandelpan_test_prefs_range");
        let path = dir.join("preferences.json");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            &path,
            r#"{"raster_width":0,"default_max_iterations":50000,"zoom_step":0.5,"history_limit":1}"#,
        )
        .unwrap();
        let prefs = AppPreferences::load_from(&path);
        assert_eq!(prefs.raster_width, 800);
        assert_eq!(prefs.default_max_iterations, 256);
        assert_eq!(prefs.zoom_step, 2.0);
        assert_eq!(prefs.history_limit, History::DEFAULT_LIMIT);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
