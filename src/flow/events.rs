/// Flow input events
///
/// Events are requests from the input layer. Each kind has one bit, so a
/// state can accept any combination of them.
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Input event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowEvent {
    /// Begin a run, capture the current detection, or acknowledge a result
    Advance,

    /// Undo the last capture, or abort the run
    Cancel,

    /// A settings/help dialog opened over the flow
    ModalOpen,

    /// The dialog closed
    ModalClose,
}

impl FlowEvent {
    /// Bit for this event kind
    pub fn mask(&self) -> EventMask {
        match self {
            FlowEvent::Advance => EventMask::ADVANCE,
            FlowEvent::Cancel => EventMask::CANCEL,
            FlowEvent::ModalOpen => EventMask::MODAL_OPEN,
            FlowEvent::ModalClose => EventMask::MODAL_CLOSE,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> &'static str {
        match self {
            FlowEvent::Advance => "Advance",
            FlowEvent::Cancel => "Cancel",
            FlowEvent::ModalOpen => "Modal open",
            FlowEvent::ModalClose => "Modal close",
        }
    }
}

/// Set of accepted event kinds
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EventMask(u8);

impl EventMask {
    pub const NONE: EventMask = EventMask(0);
    pub const ADVANCE: EventMask = EventMask(1 << 0);
    pub const CANCEL: EventMask = EventMask(1 << 1);
    pub const MODAL_OPEN: EventMask = EventMask(1 << 2);
    pub const MODAL_CLOSE: EventMask = EventMask(1 << 3);
    pub const MODAL: EventMask = EventMask(Self::MODAL_OPEN.0 | Self::MODAL_CLOSE.0);

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// True when every bit of `other` is set here
    pub fn contains(&self, other: EventMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn accepts(&self, event: FlowEvent) -> bool {
        self.contains(event.mask())
    }

    pub fn without(&self, other: EventMask) -> EventMask {
        EventMask(self.0 & !other.0)
    }
}

impl BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: EventMask) -> EventMask {
        EventMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for EventMask {
    fn bitor_assign(&mut self, rhs: EventMask) {
        self.0 |= rhs.0;
    }
}

impl From<FlowEvent> for EventMask {
    fn from(event: FlowEvent) -> Self {
        event.mask()
    }
}

impl fmt::Debug for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            FlowEvent::Advance,
            FlowEvent::Cancel,
            FlowEvent::ModalOpen,
            FlowEvent::ModalClose,
        ]
        .iter()
        .filter(|event| self.accepts(**event))
        .map(|event| event.description())
        .collect();

        write!(f, "EventMask({})", names.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_bits_are_distinct() {
        let all = EventMask::ADVANCE | EventMask::CANCEL | EventMask::MODAL;
        assert_eq!(all.bits(), 0b1111);
        assert!(EventMask::NONE.is_empty());
    }

    #[test]
    fn test_mask_accepts() {
        let mask = EventMask::ADVANCE | EventMask::MODAL;
        assert!(mask.accepts(FlowEvent::Advance));
        assert!(mask.accepts(FlowEvent::ModalOpen));
        assert!(mask.accepts(FlowEvent::ModalClose));
        assert!(!mask.accepts(FlowEvent::Cancel));
        assert!(!EventMask::NONE.accepts(FlowEvent::Advance));
    }

    #[test]
    fn test_mask_without() {
        let mut mask = EventMask::ADVANCE;
        mask |= EventMask::CANCEL;
        assert_eq!(mask.without(EventMask::ADVANCE), EventMask::CANCEL);
    }

    #[test]
    fn test_mask_debug() {
        let mask = EventMask::ADVANCE | EventMask::CANCEL;
        assert_eq!(format!("{:?}", mask), "EventMask(Advance | Cancel)");
    }
}
