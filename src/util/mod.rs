pub mod msr;
pub mod sysfs;

use crate::constants::POWER_SCALE;

/// Calculates power in microwatts from two energy readings
///
/// # Arguments
///
/// * `energy_start_uj` - Starting energy reading in microjoules
/// * `energy_end_uj` - Ending energy reading in microjoules
/// * `time_interval_ms` - Time between the readings in milliseconds
///
/// # Returns
///
/// Power in microwatts, 0 when the counter went backwards or no time elapsed
pub const fn calculate_power_uw(energy_start_uj: u64, energy_end_uj: u64, time_interval_ms: u64) -> u64 {
	if time_interval_ms == 0 {
		return 0;
	}
	let energy_difference = energy_end_uj.saturating_sub(energy_start_uj);

	// µJ/ms = mW, scale by 1000 for µW
	(energy_difference as u128 * (POWER_SCALE / 1000) as u128 / time_interval_ms as u128) as u64
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn power_from_energy_delta() {
		// 5 J over 100 ms is 50 W
		assert_eq!(calculate_power_uw(1_000_000, 6_000_000, 100), 50_000_000);
	}

	#[test]
	fn power_is_zero_on_reset_or_empty_window() {
		assert_eq!(calculate_power_uw(10, 5, 100), 0);
		assert_eq!(calculate_power_uw(0, 5, 0), 0);
	}
}
