use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use facepixel_core::parameters::parameter_store::Parameters;
use facepixel_core::shared::constants::{DEFAULT_FACE_PADDING, DEFAULT_PIXEL_SCALE};

/// Last committed slider values, restored on the next run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_pixel_scale")]
    pub pixel_scale: f64,
    #[serde(default = "default_face_padding")]
    pub face_padding: f64,
}

fn default_pixel_scale() -> f64 {
    DEFAULT_PIXEL_SCALE
}

fn default_face_padding() -> f64 {
    DEFAULT_FACE_PADDING
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pixel_scale: DEFAULT_PIXEL_SCALE,
            face_padding: DEFAULT_FACE_PADDING,
        }
    }
}

impl From<Parameters> for Settings {
    fn from(p: Parameters) -> Self {
        Self {
            pixel_scale: p.pixel_scale,
            face_padding: p.face_padding,
        }
    }
}

impl From<Settings> for Parameters {
    fn from(s: Settings) -> Self {
        Parameters {
            pixel_scale: s.pixel_scale,
            face_padding: s.face_padding,
        }
        .clamped()
    }
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("FacePixel").join("settings.json"))
    }

    /// Missing or unreadable files fall back to defaults.
    pub fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_load_restores_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            pixel_scale: 120.0,
            face_padding: 0.5,
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            Settings::load_from(&dir.path().join("absent.json")),
            Settings::default()
        );
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn test_partial_file_fills_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"pixel_scale": 80.0}"#).unwrap();
        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.pixel_scale, 80.0);
        assert_eq!(loaded.face_padding, DEFAULT_FACE_PADDING);
    }

    #[test]
    fn test_out_of_range_values_are_clamped_into_parameters() {
        let params: Parameters = Settings {
            pixel_scale: 1000.0,
            face_padding: -1.0,
        }
        .into();
        assert_eq!(params.pixel_scale, 400.0);
        assert_eq!(params.face_padding, 0.0);
    }
}
