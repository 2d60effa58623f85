//! Notifications, topics and the subscription routing between components

pub mod bus;
pub mod memory;
pub mod notification;
pub mod publisher;
pub mod routes;

pub use bus::{Delivery, Dispatcher, LocalBus};
pub use memory::MemoryTopic;
pub use notification::{component, Attributes, Notification, PublishReceipt};
pub use publisher::{HttpTopicPublisher, Publisher};
pub use routes::{subscribers, HandlerKind, SUBSCRIPTIONS};
