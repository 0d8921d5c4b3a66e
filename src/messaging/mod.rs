/// Messaging module for flow notifications
///
/// The flow controller publishes a `Notification` for every state change,
/// capture, discard and calibration outcome. UI layers subscribe and react
/// on their own thread.
///
/// ## Architecture
///
/// ```text
/// ┌────────────────┐   Notification   ┌─────────────────┐
/// │ FlowController │ ───────────────> │ NotificationBus │
/// └────────────────┘                  └─────────────────┘
///                                              │
///                                              │ Publishes
///                                              ▼
///                                       ┌─────────────┐
///                                       │ Subscribers │
///                                       │ (UI, logs)  │
///                                       └─────────────┘
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// let bus = NotificationBus::new();
/// let (rx, _id) = bus.subscribe();
///
/// let controller = FlowController::new(settings, toolkit.with_bus(bus.clone()));
///
/// while let Ok(notification) = rx.recv() {
///     println!("{}", notification.description());
/// }
/// ```

pub mod bus;
pub mod events;

// Re-export commonly used types
pub use bus::{NotificationBus, SubscriberId};
pub use events::Notification;
