/// Accepted calibration sample
///
/// The 3D side of the correspondence is not stored: it is the same for every
/// observation and comes from `PatternGeometry::object_points`.
use nalgebra::Point2;

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    points: Vec<Point2<f32>>,
    run_id: u64,
}

impl Observation {
    pub fn new(points: Vec<Point2<f32>>, run_id: u64) -> Self {
        Self { points, run_id }
    }

    /// Refined image points, in detection order
    pub fn points(&self) -> &[Point2<f32>] {
        &self.points
    }

    /// Detection run the points came from
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
