//! Notification fan-out to the transport.

pub mod manager;
pub mod sender;

pub use manager::NotificationManager;
pub use sender::{ChannelSender, NotificationSender, Outbound};
