#![forbid(unsafe_code)]

mod builtin;
mod consumer;
pub mod operations;
mod service;
mod snapshot;

pub use builtin::{BUILTIN_CONSUMERS, ExecConsumer, LogConsumer, SleepConsumer, builtin_consumer};
pub use consumer::{AsyncConsumer, Consumer, ConsumerArgs, ConsumerInvoker, SyncConsumer};
pub use service::{NotificationService, ServiceConfig};
pub use snapshot::{PriorityOrder, QueueSnapshot, decode_entries, evaluate, time_until_expiry};
