/// Detection module
///
/// Runs the pattern detector off the capture thread and publishes its
/// results to readers.
///
/// ## Architecture
///
/// ```text
/// capture loop ── try_submit ──> DetectionWorker ──(thread)──> PatternDetector
///      │                               │
///      │ <──── poll_and_collect ───────┘
///      │
///      └── update_from ──> ResultSnapshot <── read ── renderer / capture()
/// ```
///
/// The worker and the snapshot each own a `DetectionRecord`. The worker's
/// record moves between the two threads; the snapshot's record stays put
/// behind a mutex and is overwritten by deep copy.
///
/// ## Usage
///
/// ```rust,ignore
/// let record = DetectionRecord::new(geometry, width, height)?;
/// let snapshot = ResultSnapshot::new(record.clone());
/// let mut worker = DetectionWorker::start(detector, record)?;
///
/// // Each capture-loop tick
/// if let Some(done) = worker.poll_and_collect()? {
///     snapshot.update_from(done);
/// }
/// worker.try_submit(frame)?;
/// ```

pub mod detector;
pub mod record;
pub mod snapshot;
pub mod worker;

// Re-export commonly used types
pub use detector::{CornerRefiner, DetectOutcome, ImageView, NoRefinement, PatternDetector, RefineCriteria};
pub use record::DetectionRecord;
pub use snapshot::{ResultSnapshot, SnapshotSummary};
pub use worker::{DetectionWorker, WorkerState};
