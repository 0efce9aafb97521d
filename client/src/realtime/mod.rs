//! Realtime change notifications.
//!
//! One WebSocket connection per session carries `{target, action, result}`
//! frames for every entity type. The reader task decodes them and publishes
//! each to every subscriber of its target through the [`SubscriberRegistry`].

mod channel;
mod protocol;
mod registry;

pub use channel::RealtimeChannel;
pub use protocol::{decode, Inbound};
pub use registry::{NotificationSender, SubscriberRegistry, Subscription};
