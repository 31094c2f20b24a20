use std::fs;
use std::path::Path;

use tracing::{debug, trace};

use crate::constants::FILESIZ;
use crate::error::{Result, SmiError};
use crate::util::sysfs::read_text_string;

/// Finds the hwmon directory whose `name` file matches `device`
///
/// Scans the immediate subdirectories of `hwmon_root` in name order and returns
/// the first one declaring `device` (compared case-sensitively). Entries without
/// a readable `name` file are skipped.
///
/// # Returns
///
/// The matching directory name, e.g. `hwmon3`
pub fn find_energy(hwmon_root: &Path, device: &str) -> Result<String> {
	if hwmon_root.as_os_str().is_empty() {
		return Err(SmiError::InvalidArgument("hwmon root"));
	}
	if device.is_empty() {
		return Err(SmiError::InvalidArgument("device name"));
	}

	let entries = fs::read_dir(hwmon_root)
		.map_err(|e| SmiError::NotFound(format!("{}: {}", hwmon_root.display(), e)))?;
	let mut names: Vec<String> = entries
		.filter_map(|entry| entry.ok())
		.map(|entry| entry.file_name().to_string_lossy().into_owned())
		.collect();
	names.sort();

	for name in names {
		let name_file = hwmon_root.join(&name).join("name");
		let declared = match read_text_string(&name_file, FILESIZ) {
			Ok(declared) => declared,
			Err(e) => {
				trace!(entry = %name, error = %e, "skipping hwmon entry");
				continue;
			},
		};

		if declared.split_whitespace().next() == Some(device) {
			debug!(device, entry = %name, "found energy hwmon device");
			return Ok(name);
		}
	}

	Err(SmiError::NotFound(format!("no hwmon device named {device}")))
}
