use server::constants::{CARGO_VERSION, VERSION};
use std::time::{SystemTime, UNIX_EPOCH};

/// gets the current timestamp
pub fn get_current_timestamp_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

pub fn get_version() -> String {
    CARGO_VERSION.to_string()
}

pub fn get_revision() -> String {
    VERSION.to_string()
}
