use tracing::{debug, trace};

use crate::error::{Result, SmiError};

/// How a batch reacts to a failed sensor read
///
/// "Device absent" never counts as a failure: the slot stays at zero and the
/// batch moves on under either policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPolicy {
	/// Keep reading the remaining sensors and report the last failure
	ContinueOnError,
	/// Stop at the first failure, leaving later slots untouched
	AbortOnError,
}

/// Values of a batch read, one slot per sensor, plus the aggregate outcome
#[derive(Debug)]
pub struct BatchReading {
	pub values: Vec<u64>,
	/// Failure other than "device absent", if any sensor reported one
	pub error: Option<SmiError>,
}

impl BatchReading {
	pub fn is_ok(&self) -> bool {
		self.error.is_none()
	}

	/// Normalized errno of the aggregate outcome, 0 on success
	pub fn errno(&self) -> i32 {
		self.error.as_ref().map_or(0, SmiError::errno)
	}

	/// Drops partial values when the batch failed
	pub fn into_result(self) -> Result<Vec<u64>> {
		match self.error {
			Some(e) => Err(e),
			None => Ok(self.values),
		}
	}
}

/// Reads `count` slots with `read`, applying `policy` to failures
///
/// `read` gets the slot index and maps it to its sensor itself. The output is
/// zero-filled before the first read, so every slot that was absent, failed or
/// never attempted reads as 0.
pub fn batch_read<F>(count: usize, policy: BatchPolicy, mut read: F) -> BatchReading
where
	F: FnMut(usize) -> Result<u64>,
{
	let mut values = vec![0u64; count];
	let mut error = None;

	for (slot, value) in values.iter_mut().enumerate() {
		match read(slot) {
			Ok(v) => *value = v,
			Err(e) if e.is_device_absent() => {
				trace!(slot, "sensor absent");
			},
			Err(e) => {
				debug!(slot, error = %e, ?policy, "batch read failed");
				error = Some(e);
				if policy == BatchPolicy::AbortOnError {
					break;
				}
			},
		}
	}

	BatchReading { values, error }
}

#[cfg(test)]
mod tests {
	use std::cell::RefCell;
	use std::io;

	use super::*;

	fn os_error(errno: i32) -> SmiError {
		SmiError::io("sensor", io::Error::from_raw_os_error(errno))
	}

	#[test]
	fn absent_sensor_is_tolerated() {
		let reading = batch_read(8, BatchPolicy::ContinueOnError, |slot| {
			if slot == 2 {
				Err(os_error(libc::ENODEV))
			} else {
				Ok(slot as u64 + 100)
			}
		});

		assert!(reading.is_ok());
		assert_eq!(reading.values, vec![100, 101, 0, 103, 104, 105, 106, 107]);
	}

	#[test]
	fn continue_policy_attempts_every_slot() {
		let attempted = RefCell::new(Vec::new());
		let reading = batch_read(5, BatchPolicy::ContinueOnError, |slot| {
			attempted.borrow_mut().push(slot);
			match slot {
				1 => Err(os_error(libc::EACCES)),
				3 => Err(os_error(libc::EIO)),
				_ => Ok(1),
			}
		});

		assert_eq!(*attempted.borrow(), vec![0, 1, 2, 3, 4]);
		assert_eq!(reading.values, vec![1, 0, 1, 0, 1]);
		// The last failure wins
		assert_eq!(reading.errno(), libc::EIO);
	}

	#[test]
	fn abort_policy_stops_at_first_failure() {
		let attempted = RefCell::new(Vec::new());
		let reading = batch_read(8, BatchPolicy::AbortOnError, |slot| {
			attempted.borrow_mut().push(slot);
			if slot == 2 { Err(os_error(libc::EACCES)) } else { Ok(9) }
		});

		assert_eq!(*attempted.borrow(), vec![0, 1, 2]);
		assert_eq!(reading.values, vec![9, 9, 0, 0, 0, 0, 0, 0]);
		assert_eq!(reading.errno(), libc::EACCES);
		assert!(reading.into_result().is_err());
	}

	#[test]
	fn abort_policy_still_tolerates_absence() {
		let reading = batch_read(4, BatchPolicy::AbortOnError, |slot| {
			if slot == 0 { Err(os_error(libc::ENODEV)) } else { Ok(5) }
		});

		assert_eq!(reading.into_result().unwrap(), vec![0, 5, 5, 5]);
	}

	#[test]
	fn empty_batch_succeeds() {
		let reading = batch_read(0, BatchPolicy::AbortOnError, |_| Ok(1));
		assert!(reading.values.is_empty());
		assert_eq!(reading.errno(), 0);
	}
}
