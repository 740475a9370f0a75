//! Controller settings and JSON helpers.

use marker_follow_aruco::{builtin_dictionary, Dictionary, DICT_4X4_50};
use marker_follow_scene::CoordinateSpace;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum SettingsIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// A settings field that cannot be applied; the previous value stays active.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    #[error("unknown marker dictionary {0:?}")]
    UnknownDictionary(String),
    #[error("scaling bias must be finite, got {0}")]
    NonFiniteBias(f64),
}

fn default_hide_when_absent() -> bool {
    true
}

fn default_dictionary() -> String {
    DICT_4X4_50.name.to_string()
}

/// User-facing settings of one controller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControllerSettings {
    /// External id of the node to move; empty for none.
    #[serde(default)]
    pub target_node: String,
    #[serde(default)]
    pub marker_id: i32,
    /// Hide the target while the marker is not visible.
    #[serde(default = "default_hide_when_absent")]
    pub hide_when_absent: bool,
    /// Run detection on every `skip_frames`-th frame; 0 runs it on all frames.
    #[serde(default)]
    pub skip_frames: u32,
    /// Proportional scale adjustment, nominally in `[-1, 1]`.
    #[serde(default)]
    pub scaling_bias: f64,
    #[serde(default = "default_dictionary")]
    pub dictionary: String,
    #[serde(default)]
    pub coordinate_space: CoordinateSpace,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            target_node: String::new(),
            marker_id: 0,
            hide_when_absent: default_hide_when_absent(),
            skip_frames: 0,
            scaling_bias: 0.0,
            dictionary: default_dictionary(),
            coordinate_space: CoordinateSpace::default(),
        }
    }
}

impl ControllerSettings {
    /// Load settings from a JSON file; missing fields take their defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, SettingsIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write settings to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), SettingsIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn resolve_dictionary(&self) -> Result<Dictionary, SettingsError> {
        builtin_dictionary(&self.dictionary)
            .ok_or_else(|| SettingsError::UnknownDictionary(self.dictionary.clone()))
    }

    pub fn checked_bias(&self) -> Result<f64, SettingsError> {
        if self.scaling_bias.is_finite() {
            Ok(self.scaling_bias)
        } else {
            Err(SettingsError::NonFiniteBias(self.scaling_bias))
        }
    }
}
