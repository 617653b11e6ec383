//! Low-level utilities shared across hwa crates.
//!
//! Atomic whole-file replacement, exclusive advisory file locks, size-rotated
//! JSONL appends, poison-tolerant mutex locking, and an epoch-millis clock used by the job ledger and its
//! lifecycle event log.

pub mod atomic_io;
pub mod file_lock;
pub mod log_rotation;
pub mod sync_utils;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use file_lock::FileLock;
pub use log_rotation::{append_line_with_rotation, LogRotationPolicy};
pub use sync_utils::lock_unpoisoned;
pub use time_utils::current_unix_timestamp_ms;
