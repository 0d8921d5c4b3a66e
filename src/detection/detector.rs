/// Detector traits and common types
///
/// Defines the interface to the numeric collaborators: the pattern finder
/// that runs on the worker thread, and the sub-pixel refiner used when an
/// observation is captured.
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::pattern::PatternGeometry;

/// Borrowed 8-bit luma image
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
}

impl<'a> ImageView<'a> {
    /// Wrap a tightly packed `width * height` luma buffer
    pub fn new(data: &'a [u8], width: u32, height: u32) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize);
        Self {
            data,
            width,
            height,
        }
    }

    /// Pixel at (x, y), row-major
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y as usize * self.width as usize + x as usize).copied()
    }
}

/// Result of a single detector run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DetectOutcome {
    /// Every point of the pattern was located
    pub found: bool,
    /// Number of points written to the output slice
    pub count: usize,
}

impl DetectOutcome {
    pub fn found(count: usize) -> Self {
        Self { found: true, count }
    }

    pub fn not_found() -> Self {
        Self::default()
    }
}

/// Pattern detector trait
///
/// Implementations are expected to be slow (tens to hundreds of milliseconds)
/// and are only ever called from the detection worker thread, one call at a
/// time. Not finding the pattern is a normal outcome, not an error. A panic
/// inside `detect` terminates the worker.
pub trait PatternDetector: Send + Sync {
    /// Locate the pattern in `image`, writing points into `corners`
    ///
    /// `corners` always has `geometry.point_count()` entries and is reused
    /// across calls.
    fn detect(
        &self,
        image: ImageView<'_>,
        geometry: &PatternGeometry,
        corners: &mut [Point2<f32>],
    ) -> DetectOutcome;

    /// Get detector name (for logging)
    fn name(&self) -> &'static str;
}

/// Termination criteria for sub-pixel refinement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefineCriteria {
    /// Half-size of the search window, in pixels
    pub window: u32,
    pub max_iterations: u32,
    pub epsilon: f32,
}

impl Default for RefineCriteria {
    fn default() -> Self {
        Self {
            window: 5,
            max_iterations: 100,
            epsilon: 0.1,
        }
    }
}

/// Sub-pixel corner refiner
pub trait CornerRefiner: Send + Sync {
    /// Refine `corners` in place against `image`
    fn refine(&self, image: ImageView<'_>, corners: &mut [Point2<f32>], criteria: &RefineCriteria);
}

/// Refiner that leaves detected positions untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRefinement;

impl CornerRefiner for NoRefinement {
    fn refine(&self, _image: ImageView<'_>, _corners: &mut [Point2<f32>], _criteria: &RefineCriteria) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_view_get() {
        let data = [0u8, 1, 2, 3, 4, 5];
        let view = ImageView::new(&data, 3, 2);

        assert_eq!(view.get(0, 0), Some(0));
        assert_eq!(view.get(2, 1), Some(5));
        assert_eq!(view.get(3, 0), None);
        assert_eq!(view.get(0, 2), None);
    }

    #[test]
    fn test_detect_outcome_constructors() {
        assert_eq!(DetectOutcome::not_found(), DetectOutcome { found: false, count: 0 });
        assert_eq!(DetectOutcome::found(35), DetectOutcome { found: true, count: 35 });
    }

    #[test]
    fn test_refine_criteria_default() {
        let criteria = RefineCriteria::default();
        assert_eq!(criteria.window, 5);
        assert_eq!(criteria.max_iterations, 100);
        assert_eq!(criteria.epsilon, 0.1);
    }

    #[test]
    fn test_no_refinement_keeps_points() {
        let data = [0u8; 4];
        let mut corners = vec![Point2::new(1.5, 0.5)];
        NoRefinement.refine(ImageView::new(&data, 2, 2), &mut corners, &RefineCriteria::default());
        assert_eq!(corners[0], Point2::new(1.5, 0.5));
    }
}
