use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, saturating instead of failing on clock skew.
pub fn current_unix_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

