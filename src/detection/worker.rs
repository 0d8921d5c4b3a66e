/// Background pattern detection
///
/// One long-lived thread runs the detector. The capture loop hands it a
/// frame with `try_submit` and picks up the result with `poll_and_collect`;
/// neither call ever blocks. The record travels to the worker and back over
/// two depth-1 channels, so whoever holds it owns it exclusively.
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use tracing::{debug, error, info};

use super::detector::PatternDetector;
use super::record::DetectionRecord;
use crate::error::{DetectionError, SessionError};

/// Worker lifecycle as seen from the submitting side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Ready for a new frame
    Idle,

    /// Detection in progress on the worker thread
    Busy,

    /// Detection finished, result not yet collected
    ResultReady,

    /// Worker thread is gone (shut down or died)
    Terminated,
}

impl WorkerState {
    /// Get a human-readable description of the state
    pub fn description(&self) -> &'static str {
        match self {
            WorkerState::Idle => "Idle",
            WorkerState::Busy => "Detecting...",
            WorkerState::ResultReady => "Result ready",
            WorkerState::Terminated => "Terminated",
        }
    }
}

pub struct DetectionWorker {
    job_tx: Option<Sender<DetectionRecord>>,
    result_rx: Receiver<DetectionRecord>,
    /// Present whenever the worker is not holding the record
    record: Option<DetectionRecord>,
    result_ready: bool,
    terminated: bool,
    handle: Option<thread::JoinHandle<()>>,
}

impl DetectionWorker {
    /// Spawn the worker thread around `record`
    pub fn start(detector: Arc<dyn PatternDetector>, record: DetectionRecord) -> Result<Self, SessionError> {
        let (job_tx, job_rx) = bounded::<DetectionRecord>(1);
        let (result_tx, result_rx) = bounded::<DetectionRecord>(1);

        let handle = thread::Builder::new()
            .name("pattern-detector".to_string())
            .spawn(move || run_worker(detector, job_rx, result_tx))
            .map_err(SessionError::WorkerSpawn)?;

        Ok(Self {
            job_tx: Some(job_tx),
            result_rx,
            record: Some(record),
            result_ready: false,
            terminated: false,
            handle: Some(handle),
        })
    }

    /// Take back the record if the worker has finished with it
    fn refresh(&mut self) -> Result<(), DetectionError> {
        if self.record.is_some() {
            return Ok(());
        }
        if self.terminated {
            return Err(DetectionError::WorkerTerminated);
        }

        match self.result_rx.try_recv() {
            Ok(record) => {
                self.record = Some(record);
                self.result_ready = true;
                Ok(())
            }
            Err(TryRecvError::Empty) => Ok(()),
            Err(TryRecvError::Disconnected) => {
                self.terminated = true;
                error!("Pattern detector thread died during a detection");
                Err(DetectionError::WorkerTerminated)
            }
        }
    }

    /// Current state, observing any completion that happened since last call
    pub fn state(&mut self) -> WorkerState {
        if self.refresh().is_err() || self.job_tx.is_none() {
            return WorkerState::Terminated;
        }

        match (&self.record, self.result_ready) {
            (Some(_), true) => WorkerState::ResultReady,
            (Some(_), false) => WorkerState::Idle,
            (None, _) => WorkerState::Busy,
        }
    }

    /// Submit a frame if the worker is idle
    ///
    /// The frame is copied into the worker's own buffer, so the caller may
    /// reuse `frame` as soon as this returns. Returns `Ok(false)` without
    /// touching anything when the worker is busy or holds an uncollected
    /// result; the frame is simply dropped.
    pub fn try_submit(&mut self, frame: &[u8]) -> Result<bool, DetectionError> {
        self.refresh()?;
        if self.result_ready {
            return Ok(false);
        }

        let Some(tx) = self.job_tx.as_ref() else {
            return Err(DetectionError::WorkerTerminated);
        };
        let Some(mut record) = self.record.take() else {
            return Ok(false);
        };

        if !record.load_frame(frame) {
            let expected = record.image_bytes().len();
            self.record = Some(record);
            return Err(DetectionError::FrameSizeMismatch {
                expected,
                actual: frame.len(),
            });
        }

        match tx.try_send(record) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(record)) => {
                self.record = Some(record);
                Ok(false)
            }
            Err(TrySendError::Disconnected(record)) => {
                self.record = Some(record);
                self.terminated = true;
                Err(DetectionError::WorkerTerminated)
            }
        }
    }

    /// Collect a finished detection, once
    ///
    /// Returns the record when a detection completed since the last
    /// collection and moves the worker back to Idle; `None` otherwise. Safe
    /// to call on every capture-loop tick.
    pub fn poll_and_collect(&mut self) -> Result<Option<&DetectionRecord>, DetectionError> {
        self.refresh()?;
        if !self.result_ready {
            return Ok(None);
        }

        self.result_ready = false;
        Ok(self.record.as_ref())
    }

    /// Stop the worker and wait for it to exit
    ///
    /// A detection in flight is allowed to finish; its result is discarded.
    /// Calling this more than once is a no-op.
    pub fn shutdown(&mut self) -> Result<(), DetectionError> {
        // Closing the job channel is the exit signal.
        self.job_tx.take();

        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        debug!("Waiting for pattern detector thread to exit");
        handle.join().map_err(|_| DetectionError::WorkerPanicked)
    }
}

impl Drop for DetectionWorker {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            error!("Detection worker shutdown failed: {err}");
        }
    }
}

fn run_worker(
    detector: Arc<dyn PatternDetector>,
    job_rx: Receiver<DetectionRecord>,
    result_tx: Sender<DetectionRecord>,
) {
    info!("Pattern detector thread started ({})", detector.name());

    let mut run_id: u64 = 0;
    while let Ok(mut record) = job_rx.recv() {
        run_id += 1;
        let started = Instant::now();

        let outcome = {
            let (image, geometry, corners) = record.detection_io();
            detector.detect(image, geometry, corners)
        };
        let elapsed = started.elapsed();
        record.store_outcome(outcome, run_id, elapsed);

        debug!(
            run_id,
            found = outcome.found,
            count = outcome.count,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "Pattern detection done"
        );

        if result_tx.send(record).is_err() {
            break;
        }
    }

    info!("Pattern detector thread stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::detector::{DetectOutcome, ImageView};
    use crate::pattern::PatternGeometry;
    use nalgebra::Point2;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Detector that blocks until the test releases it
    struct GatedDetector {
        release: Mutex<Receiver<bool>>,
    }

    impl PatternDetector for GatedDetector {
        fn detect(
            &self,
            image: ImageView<'_>,
            geometry: &PatternGeometry,
            corners: &mut [Point2<f32>],
        ) -> DetectOutcome {
            let found = self.release.lock().recv().unwrap_or(false);
            let marker = image.data[0] as f32;
            for corner in corners.iter_mut() {
                *corner = Point2::new(marker, marker);
            }
            if found {
                DetectOutcome::found(geometry.point_count())
            } else {
                DetectOutcome::not_found()
            }
        }

        fn name(&self) -> &'static str {
            "GatedDetector"
        }
    }

    struct PanickingDetector;

    impl PatternDetector for PanickingDetector {
        fn detect(&self, _: ImageView<'_>, _: &PatternGeometry, _: &mut [Point2<f32>]) -> DetectOutcome {
            panic!("detector blew up");
        }

        fn name(&self) -> &'static str {
            "PanickingDetector"
        }
    }

    fn gated_worker() -> (DetectionWorker, Sender<bool>) {
        let (tx, rx) = bounded(8);
        let detector = Arc::new(GatedDetector {
            release: Mutex::new(rx),
        });
        let record = DetectionRecord::new(PatternGeometry::default(), 2, 2).unwrap();
        (DetectionWorker::start(detector, record).unwrap(), tx)
    }

    fn wait_for_result(worker: &mut DetectionWorker) -> (u64, bool, f32) {
        for _ in 0..400 {
            if let Some(record) = worker.poll_and_collect().unwrap() {
                return (record.run_id(), record.found(), record.points()[0].x);
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("detection never completed");
    }

    #[test]
    fn test_submit_only_when_idle() {
        let (mut worker, release) = gated_worker();
        assert_eq!(worker.state(), WorkerState::Idle);

        assert!(worker.try_submit(&[1, 1, 1, 1]).unwrap());
        assert_eq!(worker.state(), WorkerState::Busy);

        // Everything submitted while busy is dropped.
        assert!(!worker.try_submit(&[2, 2, 2, 2]).unwrap());
        assert!(!worker.try_submit(&[3, 3, 3, 3]).unwrap());
        assert!(worker.poll_and_collect().unwrap().is_none());

        release.send(true).unwrap();
        let (run_id, found, marker) = wait_for_result(&mut worker);
        assert_eq!(run_id, 1);
        assert!(found);
        assert_eq!(marker, 1.0);
    }

    #[test]
    fn test_result_collected_exactly_once() {
        let (mut worker, release) = gated_worker();

        assert!(worker.try_submit(&[5, 5, 5, 5]).unwrap());
        release.send(false).unwrap();
        let (run_id, found, _) = wait_for_result(&mut worker);
        assert_eq!(run_id, 1);
        assert!(!found);

        assert!(worker.poll_and_collect().unwrap().is_none());
        assert_eq!(worker.state(), WorkerState::Idle);

        assert!(worker.try_submit(&[6, 6, 6, 6]).unwrap());
        release.send(true).unwrap();
        let (run_id, _, marker) = wait_for_result(&mut worker);
        assert_eq!(run_id, 2);
        assert_eq!(marker, 6.0);
    }

    #[test]
    fn test_uncollected_result_blocks_submit() {
        let (mut worker, release) = gated_worker();

        assert!(worker.try_submit(&[1, 1, 1, 1]).unwrap());
        release.send(true).unwrap();

        let mut ready = false;
        for _ in 0..400 {
            if worker.state() == WorkerState::ResultReady {
                ready = true;
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert!(ready);
        assert!(!worker.try_submit(&[2, 2, 2, 2]).unwrap());

        let (_, _, marker) = wait_for_result(&mut worker);
        assert_eq!(marker, 1.0);
    }

    #[test]
    fn test_frame_size_mismatch() {
        let (mut worker, _release) = gated_worker();
        let err = worker.try_submit(&[1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            DetectionError::FrameSizeMismatch { expected: 4, actual: 3 }
        ));
        assert_eq!(worker.state(), WorkerState::Idle);
    }

    #[test]
    fn test_shutdown_waits_for_in_flight_detection() {
        let (mut worker, release) = gated_worker();
        assert!(worker.try_submit(&[1, 1, 1, 1]).unwrap());

        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            release.send(true).unwrap();
        });

        worker.shutdown().unwrap();
        releaser.join().unwrap();
        assert_eq!(worker.state(), WorkerState::Terminated);
        assert!(worker.shutdown().is_ok());
    }

    #[test]
    fn test_detector_panic_terminates_worker() {
        let record = DetectionRecord::new(PatternGeometry::default(), 2, 2).unwrap();
        let mut worker = DetectionWorker::start(Arc::new(PanickingDetector), record).unwrap();
        assert!(worker.try_submit(&[0, 0, 0, 0]).unwrap());

        let mut terminated = false;
        for _ in 0..400 {
            match worker.poll_and_collect() {
                Err(DetectionError::WorkerTerminated) => {
                    terminated = true;
                    break;
                }
                Ok(_) => thread::sleep(Duration::from_millis(5)),
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert!(terminated);
        assert!(matches!(worker.shutdown(), Err(DetectionError::WorkerPanicked)));
    }
}
