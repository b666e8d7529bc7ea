mod container_info;
pub use container_info::*;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub fn seconds_since_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

pub fn milliseconds_since_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

pub fn get_env_bool(variable_name: impl AsRef<str>) -> Option<bool> {
    std::env::var(variable_name.as_ref())
        .ok()
        .map(|val| matches!(val.to_lowercase().as_str(), "1" | "true" | "on"))
}
