#![forbid(unsafe_code)]

mod error;

pub use error::*;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_HOST: &str = "localhost";
/// Nome do sorted set e do canal pub/sub.
pub const DEFAULT_KEY: &str = "kamikaze";
/// Mensagem publicada após qualquer alteração na fila.
pub const CHANGE_MESSAGE: &str = "new_message";
/// Timeout inicial bem pequeno para que a fila seja lida logo no início.
pub const INITIAL_TIMEOUT: Duration = Duration::from_millis(10);
pub const SCAN_COUNT: usize = 100;
pub const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024; // 4 KB
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024; // 64 MB

/// Instante atual em segundos desde a época Unix.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
