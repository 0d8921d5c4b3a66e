/// Event gate between the input layer and the flow controller
///
/// Input handlers post events from any thread through an `EventPoster`. The
/// gate filters them against the mask of the current flow state and keeps at
/// most one pending event; the controller takes it on its next tick. Nothing
/// is queued: an event that is not accepted, or that arrives while another
/// is pending, is dropped.
///
/// Modal events are handled at post time. While a modal is open the only
/// accepted event is `ModalClose`; closing restores the state's mask. A
/// `ModalClose` with no modal open is rejected.
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::events::{EventMask, FlowEvent};

#[derive(Debug, Default)]
struct GateState {
    state_mask: EventMask,
    pending: Option<FlowEvent>,
    modal_open: bool,
}

impl GateState {
    /// Only the close of an open modal, or the state's mask minus close
    fn effective_mask(&self) -> EventMask {
        if self.modal_open {
            EventMask::MODAL_CLOSE
        } else {
            self.state_mask.without(EventMask::MODAL_CLOSE)
        }
    }
}

/// Controller side of the gate
#[derive(Debug, Default)]
pub struct EventGate {
    inner: Arc<Mutex<GateState>>,
}

impl EventGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for the input layer
    pub fn poster(&self) -> EventPoster {
        EventPoster {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Install the mask of a newly entered state
    ///
    /// A pending event the new state does not accept is discarded.
    pub fn set_state_mask(&self, mask: EventMask) {
        let mut gate = self.inner.lock();
        gate.state_mask = mask;
        if let Some(event) = gate.pending {
            if !mask.accepts(event) {
                debug!("Discarding stale {} event", event.description());
                gate.pending = None;
            }
        }
    }

    /// Take the pending event, unless a modal is open
    pub fn take_pending(&self) -> Option<FlowEvent> {
        let mut gate = self.inner.lock();
        if gate.modal_open {
            return None;
        }
        gate.pending.take()
    }

    pub fn is_modal_open(&self) -> bool {
        self.inner.lock().modal_open
    }

    pub fn accepted(&self) -> EventMask {
        self.inner.lock().effective_mask()
    }

    /// Forget the pending event and close any modal
    pub fn reset(&self) {
        let mut gate = self.inner.lock();
        gate.pending = None;
        gate.modal_open = false;
    }
}

/// Thread-safe `post` handle given to input handlers
#[derive(Debug, Clone)]
pub struct EventPoster {
    inner: Arc<Mutex<GateState>>,
}

impl EventPoster {
    /// Post an event; returns whether it was accepted
    ///
    /// Never blocks beyond the short gate lock.
    pub fn post(&self, event: FlowEvent) -> bool {
        let mut gate = self.inner.lock();

        if !gate.effective_mask().accepts(event) {
            debug!("Ignoring {} event (not accepted now)", event.description());
            return false;
        }

        match event {
            FlowEvent::ModalOpen => {
                gate.modal_open = true;
                debug!("Modal opened, flow events paused");
                true
            }
            FlowEvent::ModalClose => {
                gate.modal_open = false;
                debug!("Modal closed, flow events resumed");
                true
            }
            FlowEvent::Advance | FlowEvent::Cancel => {
                if let Some(pending) = gate.pending {
                    debug!(
                        "Dropping {} event, {} still pending",
                        event.description(),
                        pending.description()
                    );
                    return false;
                }
                gate.pending = Some(event);
                true
            }
        }
    }
}
