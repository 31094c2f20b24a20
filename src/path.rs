use std::path::{Path, PathBuf};

use tracing::warn;

use crate::constants::{ENERGY_FILE_TEMPLATE, FILEPATHSIZ, MSR_SAFE_FILE_TEMPLATE, PATH_PLACEHOLDER};

/// Backend a sensor is read through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorType {
	/// `energyN_input` files of the energy hwmon device
	EnergySysfs,
	/// Per-CPU `msr_safe` pseudo-devices
	MsrSafe,
}

impl MonitorType {
	/// File name template relative to the backend root
	pub const fn template(self) -> &'static str {
		match self {
			MonitorType::EnergySysfs => ENERGY_FILE_TEMPLATE,
			MonitorType::MsrSafe => MSR_SAFE_FILE_TEMPLATE,
		}
	}
}

/// Outcome of a placeholder substitution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substituted {
	pub path: String,
	/// Set when characters were dropped to stay within capacity
	pub truncated: bool,
}

/// Replaces the first `placeholder` in `template` with the decimal digits of `id`
///
/// `capacity` is the size of the destination buffer including its terminator, so
/// the result never grows past `capacity - 1` bytes. When the expansion would
/// overflow, characters are dropped from the end of the tail first and from the
/// low-order digits only once the tail is gone. A template without the
/// placeholder comes back unchanged.
pub fn substitute(template: &str, placeholder: char, id: u32, capacity: usize) -> Substituted {
	let Some(pos) = template.find(placeholder) else {
		return Substituted {
			path: template.to_owned(),
			truncated: false,
		};
	};

	let limit = capacity.saturating_sub(1);
	let prefix = clip(&template[..pos], limit);
	let tail = &template[pos + placeholder.len_utf8()..];
	let mut digits = id.to_string();

	let room = limit - prefix.len();
	let truncated = prefix.len() < pos || tail.len() + digits.len() > room;
	let tail = if digits.len() > room {
		digits.truncate(room);
		""
	} else {
		clip(tail, room - digits.len())
	};

	Substituted {
		path: format!("{prefix}{digits}{tail}"),
		truncated,
	}
}

/// Longest prefix of `s` that fits in `len` bytes without splitting a character
fn clip(s: &str, len: usize) -> &str {
	if s.len() <= len {
		return s;
	}
	let mut end = len;
	while !s.is_char_boundary(end) {
		end -= 1;
	}
	&s[..end]
}

/// Builds the path of sensor `sensor_id` of `monitor` below `root`
///
/// Both the `root/template` string and the substituted result are bounded to
/// `FILEPATHSIZ - 1` bytes; `truncated` reports a cut at either step.
pub fn sensor_path(monitor: MonitorType, root: &Path, sensor_id: u32) -> Substituted {
	let full = format!("{}/{}", root.to_string_lossy(), monitor.template());
	let template = clip(&full, FILEPATHSIZ - 1);
	let result = substitute(template, PATH_PLACEHOLDER, sensor_id, FILEPATHSIZ);
	Substituted {
		truncated: result.truncated || template.len() < full.len(),
		path: result.path,
	}
}

/// [`sensor_path`] as a `PathBuf`, warning when it had to be truncated
pub fn make_path(monitor: MonitorType, root: &Path, sensor_id: u32) -> PathBuf {
	let result = sensor_path(monitor, root, sensor_id);
	if result.truncated {
		warn!(?monitor, sensor_id, path = %result.path, "sensor path truncated to {} bytes", FILEPATHSIZ - 1);
	}
	PathBuf::from(result.path)
}
