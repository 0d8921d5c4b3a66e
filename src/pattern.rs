/// Calibration target descriptors
///
/// A `PatternGeometry` is fixed when a session starts and never mutated.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Kind of planar calibration target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Chessboard, points are the inner corners
    Chessboard,

    /// Symmetric grid of circles
    CirclesGrid,

    /// Staggered grid of circles (every other row offset by half a column)
    AsymmetricCirclesGrid,
}

impl PatternKind {
    /// Human-readable name
    pub fn title(&self) -> &'static str {
        match self {
            PatternKind::Chessboard => "Chessboard",
            PatternKind::CirclesGrid => "Circles",
            PatternKind::AsymmetricCirclesGrid => "Asymmetric circles",
        }
    }

    /// Default (columns, rows) for this kind
    pub fn default_size(&self) -> (u32, u32) {
        match self {
            PatternKind::Chessboard => (7, 5),
            PatternKind::CirclesGrid => (7, 5),
            PatternKind::AsymmetricCirclesGrid => (4, 11),
        }
    }

    /// Default spacing between neighbouring points, in millimetres
    pub fn default_spacing(&self) -> f32 {
        match self {
            PatternKind::Chessboard => 30.0,
            PatternKind::CirclesGrid => 30.0,
            PatternKind::AsymmetricCirclesGrid => 20.0,
        }
    }

    /// Geometry of the stock printable target for this kind
    pub fn default_geometry(&self) -> PatternGeometry {
        let (columns, rows) = self.default_size();
        PatternGeometry {
            kind: *self,
            columns,
            rows,
            spacing: self.default_spacing(),
        }
    }
}

impl Default for PatternKind {
    fn default() -> Self {
        PatternKind::Chessboard
    }
}

/// Immutable description of the calibration target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternGeometry {
    pub kind: PatternKind,
    /// Points along the first grid axis
    pub columns: u32,
    /// Points along the second grid axis
    pub rows: u32,
    /// Physical distance between neighbouring points
    pub spacing: f32,
}

impl PatternGeometry {
    /// Create a validated geometry
    pub fn new(kind: PatternKind, columns: u32, rows: u32, spacing: f32) -> Result<Self, SessionError> {
        if columns < 2 || rows < 2 {
            return Err(SessionError::InvalidGeometry(format!(
                "need at least 2x2 points, got {}x{}",
                columns, rows
            )));
        }
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(SessionError::InvalidGeometry(format!(
                "spacing must be positive, got {}",
                spacing
            )));
        }

        Ok(Self {
            kind,
            columns,
            rows,
            spacing,
        })
    }

    /// Total number of points a complete detection yields
    pub fn point_count(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// Known planar layout of the target (z = 0), in detection order
    pub fn object_points(&self) -> Vec<Point3<f32>> {
        let mut points = Vec::with_capacity(self.point_count());
        for row in 0..self.rows {
            for col in 0..self.columns {
                let x = match self.kind {
                    PatternKind::AsymmetricCirclesGrid => (2 * col + row % 2) as f32,
                    _ => col as f32,
                };
                points.push(Point3::new(x * self.spacing, row as f32 * self.spacing, 0.0));
            }
        }
        points
    }
}

impl Default for PatternGeometry {
    fn default() -> Self {
        PatternKind::default().default_geometry()
    }
}
