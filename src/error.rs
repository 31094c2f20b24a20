//! Error and status types shared by every backend
//!
//! Every failure carries enough context to log it, and can be flattened into the
//! integer codes callers of the C-style API expect: an errno through
//! [`SmiError::errno`] or a library status through [`SmiError::status`].

use std::io;
use std::path::PathBuf;

/// Result type alias using SmiError
pub type Result<T> = std::result::Result<T, SmiError>;

/// Unified error type for all telemetry operations
#[derive(thiserror::Error, Debug)]
pub enum SmiError {
	#[error("Invalid argument: {0}")]
	InvalidArgument(&'static str),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Not initialized: {0}")]
	NotInitialized(&'static str),

	#[error("No energy driver present (amd_energy or msr_safe)")]
	NoEnergyDriver,

	#[error("I/O error on {path}: {source}")]
	Io {
		path: PathBuf,
		source: io::Error,
	},

	#[error("Failed to parse {content:?} from {path}")]
	Parse {
		path: PathBuf,
		content: String,
	},
}

impl SmiError {
	/// Wraps an OS error together with the path it happened on
	pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
		Self::Io {
			path: path.into(),
			source,
		}
	}

	/// Normalized errno for this error
	///
	/// OS errors pass through unchanged so callers can tell "no such sensor"
	/// from "permission denied" from a hardware fault.
	pub fn errno(&self) -> i32 {
		match self {
			SmiError::InvalidArgument(_) => libc::EFAULT,
			SmiError::NotFound(_) | SmiError::NoEnergyDriver => libc::ENOENT,
			SmiError::NotInitialized(_) => libc::ENXIO,
			SmiError::Io { source, .. } => source.raw_os_error().unwrap_or(libc::EIO),
			SmiError::Parse { .. } => libc::EIO,
		}
	}

	/// True when the sensor behind this error does not exist on the system
	pub fn is_device_absent(&self) -> bool {
		self.errno() == libc::ENODEV
	}

	/// Library status code for this error
	pub fn status(&self) -> Status {
		match self {
			SmiError::InvalidArgument(_) => Status::ArgPtrNull,
			SmiError::NotInitialized(_) => Status::NotInitialized,
			SmiError::NoEnergyDriver => Status::NoEnergyDrv,
			SmiError::Parse { .. } => Status::FileError,
			_ => Status::from_errno(self.errno()),
		}
	}
}

/// Status codes reported to callers of the high-level API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
	Success = 0,
	NoEnergyDrv,
	NoHsmpDrv,
	NoHsmpSup,
	NoDrv,
	FileNotFound,
	DevBusy,
	Permission,
	NotSupported,
	FileError,
	Interrupted,
	IoError,
	UnexpectedSize,
	UnknownError,
	ArgPtrNull,
	NoMemory,
	NotInitialized,
	InvalidInput,
	HsmpTimeout,
	NoHsmpMsgSup,
}

impl Status {
	/// Maps an errno onto a status code
	pub fn from_errno(errno: i32) -> Self {
		match errno {
			0 => Status::Success,
			libc::EACCES => Status::Permission,
			libc::EPERM | libc::ENODEV | libc::EINVAL => Status::NotSupported,
			libc::EBUSY => Status::DevBusy,
			libc::ETIMEDOUT => Status::HsmpTimeout,
			libc::ENOENT => Status::FileNotFound,
			libc::EINTR => Status::Interrupted,
			libc::EIO => Status::IoError,
			libc::EFAULT => Status::ArgPtrNull,
			libc::ENOMEM => Status::NoMemory,
			libc::ENOMSG => Status::NoHsmpMsgSup,
			_ => Status::UnknownError,
		}
	}

	/// Integer value of the status
	pub fn code(self) -> i32 {
		self as i32
	}

	/// Returns a human-readable description of the status
	pub fn as_str(&self) -> &'static str {
		match self {
			Status::Success => "Success",
			Status::NoEnergyDrv => "Energy driver not present",
			Status::NoHsmpDrv => "HSMP driver not present",
			Status::NoHsmpSup => "HSMP not supported",
			Status::NoDrv => "Both Energy and HSMP drivers not present",
			Status::FileNotFound => "Could not find file",
			Status::DevBusy => "Device busy",
			Status::Permission => "Permission denied",
			Status::NotSupported => "Not supported",
			Status::FileError => "File error",
			Status::Interrupted => "Task interrupted",
			Status::IoError => "Input/output error",
			Status::UnexpectedSize => "Unexpected size of data was read",
			Status::UnknownError => "Unknown error",
			Status::ArgPtrNull => "Invalid argument",
			Status::NoMemory => "Not enough memory",
			Status::NotInitialized => "Not initialized",
			Status::InvalidInput => "Input value is invalid",
			Status::HsmpTimeout => "HSMP message timed out",
			Status::NoHsmpMsgSup => "HSMP message not supported",
		}
	}
}

impl std::fmt::Display for Status {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}
