//! Storyverse Core - Data Types, Errors, and Configuration
//!
//! Pure types shared by every Storyverse crate. The only I/O here is
//! reading the configuration file.

mod config;
mod entities;
mod enums;
mod error;

pub use config::*;
pub use entities::*;
pub use enums::*;
pub use error::*;

/// Milliseconds since the Unix epoch, used when minting story ids.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
