use std::env;
use std::path::{Path, PathBuf};

use crate::constants::{ENV_HSMP_DEVICE, ENV_HWMON_ROOT, ENV_MSR_ROOT, HSMP_CHAR_DEVFILE_NAME, HWMON_PATH, MSR_PATH};

/// Locations of the kernel interfaces this crate talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmiPaths {
	/// Directory scanned for the energy hwmon device
	pub hwmon_root: PathBuf,

	/// Directory holding one `<cpu>/msr_safe` node per logical CPU
	pub msr_root: PathBuf,

	/// HSMP management character device
	pub hsmp_device: PathBuf,
}

impl Default for SmiPaths {
	fn default() -> Self {
		Self {
			hwmon_root: PathBuf::from(HWMON_PATH),
			msr_root: PathBuf::from(MSR_PATH),
			hsmp_device: PathBuf::from(HSMP_CHAR_DEVFILE_NAME),
		}
	}
}

impl SmiPaths {
	/// Default locations, each overridable through its environment variable
	pub fn from_env() -> Self {
		let mut paths = Self::default();
		if let Some(root) = env_path(ENV_HWMON_ROOT) {
			paths.hwmon_root = root;
		}
		if let Some(root) = env_path(ENV_MSR_ROOT) {
			paths.msr_root = root;
		}
		if let Some(device) = env_path(ENV_HSMP_DEVICE) {
			paths.hsmp_device = device;
		}
		paths
	}

	pub fn with_hwmon_root(mut self, root: impl AsRef<Path>) -> Self {
		self.hwmon_root = root.as_ref().to_path_buf();
		self
	}

	pub fn with_msr_root(mut self, root: impl AsRef<Path>) -> Self {
		self.msr_root = root.as_ref().to_path_buf();
		self
	}

	pub fn with_hsmp_device(mut self, device: impl AsRef<Path>) -> Self {
		self.hsmp_device = device.as_ref().to_path_buf();
		self
	}
}

fn env_path(var: &str) -> Option<PathBuf> {
	env::var_os(var).filter(|v| !v.is_empty()).map(PathBuf::from)
}
