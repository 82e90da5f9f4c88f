//! Utility functions and helpers

use std::time::{SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

/// Initialize logging based on configuration
pub fn init_logging(level: &str, format: &str) {
    let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
    }
}

/// Get current timestamp in milliseconds
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Get current timestamp in seconds
pub fn current_timestamp_secs() -> u64 {
    current_timestamp_ms() / 1_000
}

/// Format hashrate for display
pub fn format_hashrate(hashrate: u64) -> String {
    if hashrate >= 1_000_000_000_000 {
        format!("{:.2} TH/s", hashrate as f64 / 1_000_000_000_000.0)
    } else if hashrate >= 1_000_000_000 {
        format!("{:.2} GH/s", hashrate as f64 / 1_000_000_000.0)
    } else if hashrate >= 1_000_000 {
        format!("{:.2} MH/s", hashrate as f64 / 1_000_000.0)
    } else if hashrate >= 1_000 {
        format!("{:.2} KH/s", hashrate as f64 / 1_000.0)
    } else {
        format!("{} H/s", hashrate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hashrate() {
        assert_eq!(format_hashrate(500), "500 H/s");
        assert_eq!(format_hashrate(1_500), "1.50 KH/s");
        assert_eq!(format_hashrate(2_000_000), "2.00 MH/s");
        assert_eq!(format_hashrate(3_000_000_000), "3.00 GH/s");
        assert_eq!(format_hashrate(4_000_000_000_000), "4.00 TH/s");
    }

    #[test]
    fn test_timestamps_consistent() {
        let ms = current_timestamp_ms();
        let secs = current_timestamp_secs();
        assert!(ms / 1_000 >= secs);
        assert!(ms > 1_600_000_000_000);
    }
}
