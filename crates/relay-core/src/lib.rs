//! Foundational low-level utilities shared across relay crates.
//!
//! Provides atomic file-write helpers and UTC time utilities used by the
//! event store, the evidence object store, and the status renderer.

pub mod atomic_io;
pub mod time_utils;

pub use atomic_io::{write_bytes_atomic, write_text_atomic};
pub use time_utils::{
    clock_hhmm, current_unix_timestamp, current_unix_timestamp_ms, utc_now_rfc3339,
};
