use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::detection::RefineCriteria;
use crate::error::ConfigError;
use crate::flow::FlowToolkit;
use crate::pattern::{PatternGeometry, PatternKind};
use crate::persistence::JsonResultStore;
use crate::session::SessionSettings;

fn default_image_count() -> usize {
    10
}

fn default_save_results() -> bool {
    true
}

/// Calibration target as stored in the config file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternConfig {
    pub kind: PatternKind,
    pub columns: u32,
    pub rows: u32,
    /// Spacing between neighbouring points, in millimetres
    pub spacing: f32,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self::for_kind(PatternKind::default())
    }
}

impl PatternConfig {
    /// Stock printable target of `kind`
    pub fn for_kind(kind: PatternKind) -> Self {
        let geometry = kind.default_geometry();
        Self {
            kind,
            columns: geometry.columns,
            rows: geometry.rows,
            spacing: geometry.spacing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratorConfig {
    pub pattern: PatternConfig,

    /// Images to capture before calibrating
    #[serde(default = "default_image_count")]
    pub image_count: usize,

    /// Sub-pixel refinement applied to each capture
    #[serde(default)]
    pub refine: RefineCriteria,

    /// Token passed to the video source when opening the camera; also
    /// recorded with saved results
    #[serde(default)]
    pub camera_open_token: Option<String>,

    /// Where calibration results are queued; platform default when unset
    #[serde(default)]
    pub results_dir: Option<PathBuf>,

    #[serde(default = "default_save_results")]
    pub save_results: bool,
}

impl Default for CalibratorConfig {
    fn default() -> Self {
        Self {
            pattern: PatternConfig::default(),
            image_count: default_image_count(),
            refine: RefineCriteria::default(),
            camera_open_token: None,
            results_dir: None,
            save_results: default_save_results(),
        }
    }
}

impl CalibratorConfig {
    /// Load configuration from the platform config directory.
    /// Creates default config if file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;

        if path.exists() {
            Self::load_from(&path)
        } else {
            let config = CalibratorConfig::default();
            config.save_to(&path)?;
            info!("Created default config at: {}", path.display());
            Ok(config)
        }
    }

    /// Save to the platform config directory
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        let config: CalibratorConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;
        config.validate()?;

        info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::DirectoryCreationFailed {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        fs::write(path, json).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

        Ok(())
    }

    /// `<config_dir>/CameraCalibrator/config.json`
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("CameraCalibrator").join("config.json"))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.geometry()?;

        if self.image_count == 0 {
            return Err(ConfigError::Invalid("image_count must be at least 1".to_string()));
        }
        if self.refine.window == 0 {
            return Err(ConfigError::Invalid("refine.window must be at least 1".to_string()));
        }
        if self.refine.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "refine.max_iterations must be at least 1".to_string(),
            ));
        }
        if !(self.refine.epsilon.is_finite() && self.refine.epsilon > 0.0) {
            return Err(ConfigError::Invalid("refine.epsilon must be positive".to_string()));
        }
        Ok(())
    }

    /// Validated pattern geometry
    pub fn geometry(&self) -> Result<PatternGeometry, ConfigError> {
        let pattern = &self.pattern;
        PatternGeometry::new(pattern.kind, pattern.columns, pattern.rows, pattern.spacing)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Session settings for frames of `width` x `height`
    pub fn session_settings(&self, width: u32, height: u32) -> Result<SessionSettings, ConfigError> {
        self.validate()?;
        Ok(SessionSettings::new(self.geometry()?, self.image_count, width, height).with_refine(self.refine))
    }

    /// Directory results are saved to, if saving is enabled
    pub fn effective_results_dir(&self) -> Option<PathBuf> {
        if !self.save_results {
            return None;
        }
        self.results_dir.clone().or_else(JsonResultStore::default_dir)
    }

    /// Attach the configured result store and camera identifier
    pub fn configure_toolkit(&self, mut toolkit: FlowToolkit) -> FlowToolkit {
        match self.effective_results_dir() {
            Some(dir) => toolkit = toolkit.with_sink(Box::new(JsonResultStore::new(dir))),
            None if self.save_results => warn!("No results directory available, results will not be saved"),
            None => {}
        }
        if let Some(token) = &self.camera_open_token {
            toolkit = toolkit.with_device_id(token.clone());
        }
        toolkit
    }
}
