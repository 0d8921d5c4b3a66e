/// Camera parameter solver interface
///
/// The numerical fit itself lives outside this crate. Implementations get
/// every accepted observation at once and either return parameters with
/// reprojection error statistics or a `SolverError`.
use nalgebra::{Matrix3, Point2};
use serde::{Deserialize, Serialize};

use super::observation::Observation;
use crate::error::SolverError;
use crate::pattern::PatternGeometry;

/// Intrinsics and lens distortion of one camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraParameters {
    /// Image size the parameters were fitted for
    pub width: u32,
    pub height: u32,
    /// Pinhole camera matrix (fx, fy, cx, cy)
    pub camera_matrix: Matrix3<f64>,
    /// Distortion coefficients in solver order (k1, k2, p1, p2, k3, ...)
    pub distortion: Vec<f64>,
}

impl CameraParameters {
    /// Build from focal lengths and principal point, without distortion
    pub fn pinhole(width: u32, height: u32, fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            width,
            height,
            camera_matrix: Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0),
            distortion: Vec::new(),
        }
    }

    pub fn focal_length(&self) -> (f64, f64) {
        (self.camera_matrix[(0, 0)], self.camera_matrix[(1, 1)])
    }

    pub fn principal_point(&self) -> Point2<f64> {
        Point2::new(self.camera_matrix[(0, 2)], self.camera_matrix[(1, 2)])
    }
}

/// Reprojection error over all observations, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReprojectionError {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub parameters: CameraParameters,
    pub error: ReprojectionError,
}

/// Camera calibration solver trait
pub trait CalibrationSolver: Send + Sync {
    /// Fit camera parameters to `observations` of a target with `geometry`
    fn calibrate(
        &self,
        observations: &[Observation],
        geometry: &PatternGeometry,
        width: u32,
        height: u32,
    ) -> Result<CalibrationResult, SolverError>;

    /// Get solver name (for logging)
    fn name(&self) -> &'static str {
        "solver"
    }
}
