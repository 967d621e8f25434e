#![forbid(unsafe_code)]

mod command;
mod frame;
mod parse;
mod reply;

pub use command::{Command, format_score};
pub use frame::Frame;
pub use parse::{Parse, parse_float};
pub use reply::{PushMessage, ScanPage};
