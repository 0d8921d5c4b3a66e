/// Detection record
///
/// One image buffer plus the detector output that belongs to it. Exactly two
/// live per session: the worker's record and the snapshot copy. They are
/// never the same memory; handoff always goes through `update_from`.
use std::time::Duration;

use nalgebra::Point2;

use super::detector::{DetectOutcome, ImageView};
use crate::error::SessionError;
use crate::pattern::PatternGeometry;

#[derive(Debug, Clone)]
pub struct DetectionRecord {
    image: Vec<u8>,
    width: u32,
    height: u32,
    geometry: PatternGeometry,
    found: bool,
    count: usize,
    points: Vec<Point2<f32>>,
    run_id: u64,
    elapsed: Duration,
}

impl DetectionRecord {
    /// Allocate a record sized for `width * height` luma frames
    ///
    /// Allocation failure is reported instead of aborting, so a session that
    /// cannot get its buffers is never created.
    pub fn new(geometry: PatternGeometry, width: u32, height: u32) -> Result<Self, SessionError> {
        if width == 0 || height == 0 {
            return Err(SessionError::InvalidDimensions { width, height });
        }

        let image_len = (width as usize)
            .checked_mul(height as usize)
            .ok_or(SessionError::InvalidDimensions { width, height })?;
        let point_count = geometry.point_count();

        let mut image = Vec::new();
        image
            .try_reserve_exact(image_len)
            .map_err(|_| SessionError::BufferAllocation { bytes: image_len })?;
        image.resize(image_len, 0);

        let mut points = Vec::new();
        points
            .try_reserve_exact(point_count)
            .map_err(|_| SessionError::BufferAllocation {
                bytes: point_count.saturating_mul(std::mem::size_of::<Point2<f32>>()),
            })?;
        points.resize(point_count, Point2::origin());

        Ok(Self {
            image,
            width,
            height,
            geometry,
            found: false,
            count: 0,
            points,
            run_id: 0,
            elapsed: Duration::ZERO,
        })
    }

    /// Deep-copy `other` into this record, reusing the existing buffers
    ///
    /// Both records must have been created for the same geometry and
    /// dimensions.
    pub fn update_from(&mut self, other: &DetectionRecord) {
        debug_assert_eq!(self.image.len(), other.image.len());
        debug_assert_eq!(self.points.len(), other.points.len());

        self.image.copy_from_slice(&other.image);
        self.points.copy_from_slice(&other.points);
        self.found = other.found;
        self.count = other.count;
        self.run_id = other.run_id;
        self.elapsed = other.elapsed;
    }

    /// Copy a caller frame into the image buffer
    ///
    /// Returns false when the frame length does not match.
    pub(crate) fn load_frame(&mut self, frame: &[u8]) -> bool {
        if frame.len() != self.image.len() {
            return false;
        }
        self.image.copy_from_slice(frame);
        true
    }

    /// Split borrow used by the worker: image view plus writable points
    pub(crate) fn detection_io(&mut self) -> (ImageView<'_>, &PatternGeometry, &mut [Point2<f32>]) {
        (
            ImageView::new(&self.image, self.width, self.height),
            &self.geometry,
            &mut self.points,
        )
    }

    pub(crate) fn store_outcome(&mut self, outcome: DetectOutcome, run_id: u64, elapsed: Duration) {
        self.found = outcome.found;
        self.count = outcome.count.min(self.points.len());
        self.run_id = run_id;
        self.elapsed = elapsed;
    }

    pub fn image(&self) -> ImageView<'_> {
        ImageView::new(&self.image, self.width, self.height)
    }

    pub fn image_bytes(&self) -> &[u8] {
        &self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn geometry(&self) -> &PatternGeometry {
        &self.geometry
    }

    /// Whether the full pattern was found
    pub fn found(&self) -> bool {
        self.found
    }

    /// Number of points the detector reported
    pub fn count(&self) -> usize {
        self.count
    }

    /// Detected points; only meaningful when `found()` is true
    pub fn points(&self) -> &[Point2<f32>] {
        &self.points
    }

    /// Points the detector actually reported (partial on a miss)
    pub fn located_points(&self) -> &[Point2<f32>] {
        &self.points[..self.count]
    }

    /// Sequence number of the detection run, 0 before the first one
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Time the detector took for this run
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> PatternGeometry {
        PatternGeometry::default()
    }

    #[test]
    fn test_new_record_is_empty() {
        let record = DetectionRecord::new(geometry(), 4, 3).unwrap();
        assert_eq!(record.image_bytes().len(), 12);
        assert_eq!(record.points().len(), 35);
        assert!(!record.found());
        assert_eq!(record.count(), 0);
        assert_eq!(record.run_id(), 0);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(matches!(
            DetectionRecord::new(geometry(), 0, 3),
            Err(SessionError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_load_frame_checks_length() {
        let mut record = DetectionRecord::new(geometry(), 2, 2).unwrap();
        assert!(!record.load_frame(&[1, 2, 3]));
        assert!(record.load_frame(&[1, 2, 3, 4]));
        assert_eq!(record.image_bytes(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_update_from_copies_everything() {
        let mut source = DetectionRecord::new(geometry(), 2, 2).unwrap();
        source.load_frame(&[9, 8, 7, 6]);
        {
            let (_, _, points) = source.detection_io();
            points[0] = Point2::new(1.0, 2.0);
        }
        source.store_outcome(DetectOutcome::found(35), 7, Duration::from_millis(40));

        let mut target = DetectionRecord::new(geometry(), 2, 2).unwrap();
        target.update_from(&source);

        assert_eq!(target.image_bytes(), &[9, 8, 7, 6]);
        assert_eq!(target.points()[0], Point2::new(1.0, 2.0));
        assert!(target.found());
        assert_eq!(target.count(), 35);
        assert_eq!(target.run_id(), 7);

        // Copy, not alias: later writes to the source do not leak through.
        source.load_frame(&[0, 0, 0, 0]);
        assert_eq!(target.image_bytes(), &[9, 8, 7, 6]);
    }

    #[test]
    fn test_count_clamped_to_point_slots() {
        let mut record = DetectionRecord::new(geometry(), 2, 2).unwrap();
        record.store_outcome(DetectOutcome { found: false, count: 99 }, 1, Duration::ZERO);
        assert_eq!(record.count(), 35);
        assert_eq!(record.located_points().len(), 35);
    }
}
