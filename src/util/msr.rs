use std::fmt::Debug;
use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::error::{Result, SmiError};
use crate::path::{MonitorType, make_path};
use crate::util::sysfs::require_path;

/// Reads a 64-bit register from an MSR pseudo-device
///
/// # Arguments
///
/// * `path` - The `msr_safe` node of the CPU to read from
/// * `register` - The register address, used as the file offset
///
/// # Returns
///
/// The register value, or the OS error of the open or of a failed/short read
pub fn read_binary_u64_at(path: &Path, register: u64) -> Result<u64> {
	require_path(path)?;
	trace!(path = %path.display(), register = format_args!("{register:#x}"), "read msr");

	let file = File::open(path).map_err(|e| SmiError::io(path, e))?;
	let mut buf = [0u8; 8];
	file.read_exact_at(&mut buf, register).map_err(|e| SmiError::io(path, e))?;
	Ok(u64::from_ne_bytes(buf))
}

/// Per-CPU register access used by the energy readers
pub trait MsrAccess: Debug + Send + Sync {
	/// Reads `register` of logical CPU `cpu`
	fn read(&self, cpu: u32, register: u64) -> Result<u64>;

	/// Clone implementation for trait objects
	fn clone_box(&self) -> Box<dyn MsrAccess>;
}

/// `msr_safe` nodes below a root, one `<cpu>/msr_safe` per logical CPU
#[derive(Debug, Clone)]
pub struct MsrSafe {
	root: PathBuf,
}

impl MsrSafe {
	pub fn new(root: impl AsRef<Path>) -> Self {
		Self {
			root: root.as_ref().to_path_buf(),
		}
	}

	pub fn root(&self) -> &Path {
		&self.root
	}
}

impl MsrAccess for MsrSafe {
	fn read(&self, cpu: u32, register: u64) -> Result<u64> {
		read_binary_u64_at(&make_path(MonitorType::MsrSafe, &self.root, cpu), register)
	}

	fn clone_box(&self) -> Box<dyn MsrAccess> {
		Box::new(self.clone())
	}
}
