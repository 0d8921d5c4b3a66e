/// Calibration result persistence
///
/// Saves computed camera parameters together with an index file describing
/// the run (time, platform, camera size, error statistics). Files land in a
/// queue directory, named after the UTC time of day they were written.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sysinfo::System;
use tracing::{debug, info, warn};

use crate::error::AppResult;
use crate::pattern::PatternGeometry;
use crate::session::CalibrationResult;

/// Everything needed to store one calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub result: CalibrationResult,
    pub geometry: PatternGeometry,
    pub observation_count: usize,
    /// Token identifying the camera, if the frame source provides one
    pub device_id: Option<String>,
}

/// Destination for finished calibrations
pub trait ResultSink: Send {
    /// Store `report`, returning the path of the parameter file
    fn save(&mut self, report: &CalibrationReport) -> AppResult<PathBuf>;
}

/// Run description written next to the parameter file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultIndex {
    /// Seconds since the Unix epoch
    pub timestamp: u64,
    pub os_name: String,
    pub os_arch: String,
    pub os_version: String,
    pub device_id: Option<String>,
    pub camera_width: u32,
    pub camera_height: u32,
    pub err_min: f64,
    pub err_avg: f64,
    pub err_max: f64,
    pub observation_count: usize,
    pub pattern: PatternGeometry,
    pub parameters_file: String,
}

/// Writes `<HHMMSS>-camera_para.json` and `<HHMMSS>-index.json`
#[derive(Debug, Clone)]
pub struct JsonResultStore {
    dir: PathBuf,
}

impl JsonResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<config_dir>/CameraCalibrator/queue`
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("CameraCalibrator").join("queue"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save as if the current time were `now`
    pub fn save_at(&self, report: &CalibrationReport, now: SystemTime) -> AppResult<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create result directory {}", self.dir.display()))?;

        let timestamp = now
            .duration_since(UNIX_EPOCH)
            .context("System clock is before the Unix epoch")?
            .as_secs();
        let id = file_id(timestamp);

        let param_path = self.dir.join(format!("{id}-camera_para.json"));
        let index_path = self.dir.join(format!("{id}-index.json"));

        let written = self.write_pair(report, timestamp, &param_path, &index_path);
        if written.is_err() {
            for path in [&param_path, &index_path] {
                remove_quietly(path);
                remove_quietly(&temp_path(path));
            }
        }
        written?;

        info!("Saved camera parameters to {}", param_path.display());
        Ok(param_path)
    }

    fn write_pair(
        &self,
        report: &CalibrationReport,
        timestamp: u64,
        param_path: &Path,
        index_path: &Path,
    ) -> AppResult<()> {
        let params = serde_json::to_string_pretty(&report.result)
            .context("Failed to serialize camera parameters")?;
        write_atomically(param_path, &params)?;

        let index = ResultIndex {
            timestamp,
            os_name: System::name().unwrap_or_else(|| "unknown".to_string()),
            os_arch: std::env::consts::ARCH.to_string(),
            os_version: System::os_version().unwrap_or_else(|| "unknown".to_string()),
            device_id: report.device_id.clone(),
            camera_width: report.result.parameters.width,
            camera_height: report.result.parameters.height,
            err_min: report.result.error.min,
            err_avg: report.result.error.avg,
            err_max: report.result.error.max,
            observation_count: report.observation_count,
            pattern: report.geometry,
            parameters_file: param_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let index = serde_json::to_string_pretty(&index).context("Failed to serialize result index")?;
        write_atomically(index_path, &index)?;

        debug!("Wrote result index {}", index_path.display());
        Ok(())
    }
}

impl ResultSink for JsonResultStore {
    fn save(&mut self, report: &CalibrationReport) -> AppResult<PathBuf> {
        self.save_at(report, SystemTime::now())
    }
}

/// UTC time of day as HHMMSS
fn file_id(unix_secs: u64) -> String {
    let secs_of_day = unix_secs % 86_400;
    format!(
        "{:02}{:02}{:02}",
        secs_of_day / 3600,
        (secs_of_day / 60) % 60,
        secs_of_day % 60
    )
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_atomically(path: &Path, contents: &str) -> AppResult<()> {
    let temp = temp_path(path);
    fs::write(&temp, contents).with_context(|| format!("Failed to write {}", temp.display()))?;
    fs::rename(&temp, path)
        .with_context(|| format!("Failed to rename {} to {}", temp.display(), path.display()))?;
    Ok(())
}

fn remove_quietly(path: &Path) {
    if path.exists() {
        if let Err(err) = fs::remove_file(path) {
            warn!("Failed to remove {}: {err}", path.display());
        }
    }
}
