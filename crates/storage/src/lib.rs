#![forbid(unsafe_code)]

mod connection;
mod memory;
mod package;
mod pubsub;
mod redis;
mod store;

pub use connection::Connection;
pub use memory::{MemoryStore, MemorySubscriber};
pub use package::{Package, SEPARATOR};
pub use redis::{RedisStore, RedisSubscriber};
pub use store::{EntryStore, Subscriber};
