/// Shared copy of the last completed detection
///
/// The capture loop publishes into it after each collected detection; the
/// renderer and `CalibrationSession::capture` read from it. Readers hold the
/// lock only while they copy or draw.
use parking_lot::{Mutex, MutexGuard};

use super::record::DetectionRecord;

pub struct ResultSnapshot {
    record: Mutex<DetectionRecord>,
}

/// Small copy of the snapshot header, taken without keeping the lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub found: bool,
    pub count: usize,
    pub run_id: u64,
}

impl ResultSnapshot {
    /// Wrap a freshly allocated record; it must not be the worker's record
    pub fn new(record: DetectionRecord) -> Self {
        Self {
            record: Mutex::new(record),
        }
    }

    /// Publish a completed detection as one whole
    pub fn update_from(&self, record: &DetectionRecord) {
        self.record.lock().update_from(record);
    }

    /// Lock for reading; drop the guard promptly
    pub fn read(&self) -> MutexGuard<'_, DetectionRecord> {
        self.record.lock()
    }

    pub fn summary(&self) -> SnapshotSummary {
        let record = self.record.lock();
        SnapshotSummary {
            found: record.found(),
            count: record.count(),
            run_id: record.run_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::detector::DetectOutcome;
    use crate::pattern::PatternGeometry;
    use nalgebra::Point2;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn record_with(run_id: u64, found: bool) -> DetectionRecord {
        let mut record = DetectionRecord::new(PatternGeometry::default(), 2, 2).unwrap();
        record.load_frame(&[run_id as u8; 4]);
        {
            let (_, _, points) = record.detection_io();
            for point in points.iter_mut() {
                *point = Point2::new(run_id as f32, run_id as f32);
            }
        }
        let outcome = if found {
            DetectOutcome::found(35)
        } else {
            DetectOutcome::not_found()
        };
        record.store_outcome(outcome, run_id, Duration::ZERO);
        record
    }

    #[test]
    fn test_starts_empty() {
        let snapshot = ResultSnapshot::new(DetectionRecord::new(PatternGeometry::default(), 2, 2).unwrap());
        assert_eq!(
            snapshot.summary(),
            SnapshotSummary {
                found: false,
                count: 0,
                run_id: 0
            }
        );
    }

    #[test]
    fn test_update_publishes_whole_record() {
        let snapshot = ResultSnapshot::new(DetectionRecord::new(PatternGeometry::default(), 2, 2).unwrap());
        snapshot.update_from(&record_with(3, true));

        let guard = snapshot.read();
        assert!(guard.found());
        assert_eq!(guard.run_id(), 3);
        assert_eq!(guard.image_bytes(), &[3, 3, 3, 3]);
        assert!(guard.points().iter().all(|p| p.x == 3.0));
    }

    #[test]
    fn test_readers_never_see_mixed_runs() {
        let snapshot = Arc::new(ResultSnapshot::new(
            DetectionRecord::new(PatternGeometry::default(), 2, 2).unwrap(),
        ));

        let writer = {
            let snapshot = Arc::clone(&snapshot);
            thread::spawn(move || {
                for run_id in 1..=200u64 {
                    snapshot.update_from(&record_with(run_id, run_id % 2 == 0));
                }
            })
        };

        for _ in 0..200 {
            let guard = snapshot.read();
            let run_id = guard.run_id();
            if run_id == 0 {
                continue;
            }
            assert_eq!(guard.found(), run_id % 2 == 0);
            assert!(guard.image_bytes().iter().all(|b| *b == run_id as u8));
            assert!(guard.points().iter().all(|p| p.x == run_id as f32));
        }

        writer.join().unwrap();
        assert_eq!(snapshot.summary().run_id, 200);
    }
}
