//! Utility helpers for timestamps and log formatting.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix time in seconds.
pub fn current_timestamp() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("system clock before Unix epoch")
		.as_secs()
}

/// Current Unix time in seconds as a signed value, for expiry comparisons.
pub fn current_timestamp_i64() -> i64 {
	current_timestamp() as i64
}

/// Truncates an identifier for display purposes.
///
/// Shows only the first 8 characters followed by ".." for longer strings.
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 8 {
		id.to_string()
	} else {
		format!("{}..", &id[..8])
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn truncates_long_ids() {
		assert_eq!(truncate_id("abcdefghij"), "abcdefgh..");
		assert_eq!(truncate_id("short"), "short");
	}
}
