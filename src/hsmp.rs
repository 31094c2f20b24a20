//! Host System Management Port access through `/dev/hsmp`
//!
//! The driver takes one fixed-layout message per ioctl, forwards it to the SMU
//! mailbox of the addressed socket and writes the response words back into the
//! same buffer. [`Hsmp::xfer`] is that raw exchange; [`Hsmp::send`] and the
//! helpers on top of it add the typed request/response boundary.

use std::fs::OpenOptions;
use std::io;
use std::mem::size_of;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::config::SmiPaths;
use crate::constants::{HSMP_BASE_IOCTL_NR, HSMP_MAX_MSG_LEN};
use crate::error::{Result, SmiError};

/// `struct hsmp_message` of the kernel uapi
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HsmpMessage {
	/// Message id
	pub msg_id: u32,
	/// Number of input argument words
	pub num_args: u16,
	/// Number of expected response words
	pub response_sz: u16,
	/// Argument words in, response words out
	pub args: [u32; HSMP_MAX_MSG_LEN],
	/// Socket the message is sent to
	pub sock_ind: u16,
}

const fn iowr(ty: u32, nr: u32, size: usize) -> u32 {
	const IOC_READ_WRITE: u32 = 3;
	(IOC_READ_WRITE << 30) | ((size as u32) << 16) | (ty << 8) | nr
}

/// `_IOWR(HSMP_BASE_IOCTL_NR, 0, struct hsmp_message)`
pub const HSMP_IOCTL_CMD: u32 = iowr(HSMP_BASE_IOCTL_NR, 0, size_of::<HsmpMessage>());

/// How the management device is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
	/// Getters, open with O_RDONLY
	ReadOnly,
	/// Setters, open with O_RDWR
	ReadWrite,
}

/// HSMP message ids of protocol versions 2 to 5
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum HsmpMessageId {
	Test = 1,
	SmuFwVersion,
	ProtoVersion,
	SocketPower,
	SetSocketPowerLimit,
	SocketPowerLimit,
	SocketPowerLimitMax,
	SetBoostLimit,
	SetBoostLimitSocket,
	BoostLimit,
	ProcHot,
	SetXgmiLinkWidth,
	SetDfPstate,
	SetAutoDfPstate,
	FclkMclk,
	CclkThrottleLimit,
	C0Percent,
	SetNbioDpmLevel,
	NbioDpmLevel,
	DdrBandwidth,
	TempMonitor,
}

impl HsmpMessageId {
	const ALL: [HsmpMessageId; 21] = [
		HsmpMessageId::Test,
		HsmpMessageId::SmuFwVersion,
		HsmpMessageId::ProtoVersion,
		HsmpMessageId::SocketPower,
		HsmpMessageId::SetSocketPowerLimit,
		HsmpMessageId::SocketPowerLimit,
		HsmpMessageId::SocketPowerLimitMax,
		HsmpMessageId::SetBoostLimit,
		HsmpMessageId::SetBoostLimitSocket,
		HsmpMessageId::BoostLimit,
		HsmpMessageId::ProcHot,
		HsmpMessageId::SetXgmiLinkWidth,
		HsmpMessageId::SetDfPstate,
		HsmpMessageId::SetAutoDfPstate,
		HsmpMessageId::FclkMclk,
		HsmpMessageId::CclkThrottleLimit,
		HsmpMessageId::C0Percent,
		HsmpMessageId::SetNbioDpmLevel,
		HsmpMessageId::NbioDpmLevel,
		HsmpMessageId::DdrBandwidth,
		HsmpMessageId::TempMonitor,
	];

	/// Looks up a message id by its wire value
	pub fn from_raw(raw: u32) -> Option<Self> {
		Self::ALL.iter().copied().find(|id| *id as u32 == raw)
	}

	/// Number of argument words the message takes
	pub const fn num_args(self) -> u16 {
		match self {
			HsmpMessageId::Test
			| HsmpMessageId::SetSocketPowerLimit
			| HsmpMessageId::SetBoostLimit
			| HsmpMessageId::SetBoostLimitSocket
			| HsmpMessageId::BoostLimit
			| HsmpMessageId::SetXgmiLinkWidth
			| HsmpMessageId::SetDfPstate
			| HsmpMessageId::SetNbioDpmLevel
			| HsmpMessageId::NbioDpmLevel => 1,
			_ => 0,
		}
	}

	/// Number of response words the message returns
	pub const fn response_size(self) -> u16 {
		match self {
			HsmpMessageId::FclkMclk => 2,
			HsmpMessageId::SetSocketPowerLimit
			| HsmpMessageId::SetBoostLimit
			| HsmpMessageId::SetBoostLimitSocket
			| HsmpMessageId::SetXgmiLinkWidth
			| HsmpMessageId::SetDfPstate
			| HsmpMessageId::SetAutoDfPstate
			| HsmpMessageId::SetNbioDpmLevel => 0,
			_ => 1,
		}
	}

	/// Setters need the device opened for writing
	pub const fn access_mode(self) -> AccessMode {
		match self {
			HsmpMessageId::SetSocketPowerLimit
			| HsmpMessageId::SetBoostLimit
			| HsmpMessageId::SetBoostLimitSocket
			| HsmpMessageId::SetXgmiLinkWidth
			| HsmpMessageId::SetDfPstate
			| HsmpMessageId::SetAutoDfPstate
			| HsmpMessageId::SetNbioDpmLevel => AccessMode::ReadWrite,
			_ => AccessMode::ReadOnly,
		}
	}
}

/// A typed HSMP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HsmpRequest {
	pub id: HsmpMessageId,
	pub socket: u16,
	pub args: Vec<u32>,
}

impl HsmpRequest {
	pub fn new(id: HsmpMessageId, socket: u16, args: &[u32]) -> Self {
		Self {
			id,
			socket,
			args: args.to_vec(),
		}
	}

	/// Lays the request out as the driver expects it
	pub fn encode(&self) -> Result<HsmpMessage> {
		if self.args.len() != usize::from(self.id.num_args()) {
			return Err(SmiError::InvalidArgument("HSMP argument count"));
		}

		let mut msg = HsmpMessage {
			msg_id: self.id as u32,
			num_args: self.id.num_args(),
			response_sz: self.id.response_size(),
			sock_ind: self.socket,
			..HsmpMessage::default()
		};
		msg.args[..self.args.len()].copy_from_slice(&self.args);
		Ok(msg)
	}
}

/// Response words of an HSMP exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsmpResponse {
	args: [u32; HSMP_MAX_MSG_LEN],
	len: usize,
}

impl HsmpResponse {
	/// Reads the response words back out of an exchanged message
	pub fn decode(msg: &HsmpMessage) -> Self {
		Self {
			args: msg.args,
			len: usize::from(msg.response_sz).min(HSMP_MAX_MSG_LEN),
		}
	}

	pub fn args(&self) -> &[u32] {
		&self.args[..self.len]
	}

	/// First response word
	pub fn value(&self) -> u32 {
		self.args[0]
	}
}

/// SMU firmware version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmuFwVersion {
	pub major: u8,
	pub minor: u8,
	pub debug: u8,
}

impl From<u32> for SmuFwVersion {
	fn from(raw: u32) -> Self {
		Self {
			debug: raw as u8,
			minor: (raw >> 8) as u8,
			major: (raw >> 16) as u8,
		}
	}
}

impl std::fmt::Display for SmuFwVersion {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}.{}.{}", self.major, self.minor, self.debug)
	}
}

/// Handle to the HSMP management device
///
/// Holds only the device path; every exchange opens and closes the node.
#[derive(Debug, Clone)]
pub struct Hsmp {
	device: PathBuf,
}

impl Hsmp {
	pub fn new(device: impl AsRef<Path>) -> Self {
		Self {
			device: device.as_ref().to_path_buf(),
		}
	}

	pub fn from_paths(paths: &SmiPaths) -> Self {
		Self::new(&paths.hsmp_device)
	}

	pub fn device(&self) -> &Path {
		&self.device
	}

	/// Performs one ioctl exchange of `msg` with the device
	///
	/// Nothing is sent when the device cannot be opened; the open error is
	/// returned as is. The device is closed again on every path.
	pub fn xfer(&self, msg: &mut HsmpMessage, mode: AccessMode) -> Result<()> {
		let device = match mode {
			AccessMode::ReadOnly => OpenOptions::new().read(true).open(&self.device),
			AccessMode::ReadWrite => OpenOptions::new().read(true).write(true).open(&self.device),
		}
		.map_err(|e| SmiError::io(&self.device, e))?;

		trace!(msg_id = msg.msg_id, socket = msg.sock_ind, ?mode, "hsmp ioctl");
		// SAFETY: msg is a live, exclusively borrowed hsmp_message for the whole call
		let ret = unsafe { libc::ioctl(device.as_raw_fd(), HSMP_IOCTL_CMD as libc::Ioctl, msg as *mut HsmpMessage) };
		if ret < 0 {
			return Err(SmiError::io(&self.device, io::Error::last_os_error()));
		}
		Ok(())
	}

	/// Sends a typed request and decodes its response
	pub fn send(&self, request: &HsmpRequest) -> Result<HsmpResponse> {
		let mut msg = request.encode()?;
		self.xfer(&mut msg, request.id.access_mode())?;
		let response = HsmpResponse::decode(&msg);
		debug!(id = ?request.id, socket = request.socket, response = ?response.args(), "hsmp exchange");
		Ok(response)
	}

	fn get(&self, id: HsmpMessageId, socket: u16, args: &[u32]) -> Result<u32> {
		self.send(&HsmpRequest::new(id, socket, args)).map(|r| r.value())
	}

	/// Sends the test message; a healthy SMU answers `value + 1`
	pub fn test(&self, value: u32) -> Result<u32> {
		self.get(HsmpMessageId::Test, 0, &[value])
	}

	pub fn smu_fw_version(&self) -> Result<SmuFwVersion> {
		self.get(HsmpMessageId::SmuFwVersion, 0, &[]).map(SmuFwVersion::from)
	}

	pub fn proto_version(&self) -> Result<u32> {
		self.get(HsmpMessageId::ProtoVersion, 0, &[])
	}

	/// Current socket power in milliwatts
	pub fn socket_power(&self, socket: u16) -> Result<u32> {
		self.get(HsmpMessageId::SocketPower, socket, &[])
	}

	/// Socket power limit in milliwatts
	pub fn socket_power_limit(&self, socket: u16) -> Result<u32> {
		self.get(HsmpMessageId::SocketPowerLimit, socket, &[])
	}

	pub fn set_socket_power_limit(&self, socket: u16, limit_mw: u32) -> Result<()> {
		self.send(&HsmpRequest::new(HsmpMessageId::SetSocketPowerLimit, socket, &[limit_mw]))
			.map(|_| ())
	}

	pub fn prochot_status(&self, socket: u16) -> Result<bool> {
		self.get(HsmpMessageId::ProcHot, socket, &[]).map(|v| v & 1 == 1)
	}

	/// Data fabric and memory clocks in MHz
	pub fn fclk_mclk(&self, socket: u16) -> Result<(u32, u32)> {
		let response = self.send(&HsmpRequest::new(HsmpMessageId::FclkMclk, socket, &[]))?;
		let args = response.args();
		match args {
			[fclk, mclk, ..] => Ok((*fclk, *mclk)),
			_ => Err(SmiError::InvalidArgument("HSMP response size")),
		}
	}

	/// Core clock limit in MHz
	pub fn cclk_limit(&self, socket: u16) -> Result<u32> {
		self.get(HsmpMessageId::CclkThrottleLimit, socket, &[])
	}

	/// Residency of the socket cores in C0, in percent
	pub fn c0_percent(&self, socket: u16) -> Result<u32> {
		self.get(HsmpMessageId::C0Percent, socket, &[])
	}
}
