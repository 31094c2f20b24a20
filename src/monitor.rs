use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::batch::{BatchPolicy, BatchReading, batch_read};
use crate::config::SmiPaths;
use crate::constants::{DRVPATHSIZ, ENERGY_CORE_MSR, ENERGY_DEV_NAME, ENERGY_PKG_MSR};
use crate::discovery::find_energy;
use crate::energy::{EnergyUnit, calibrate};
use crate::error::{Result, SmiError};
use crate::path::{MonitorType, make_path};
use crate::util::msr::{MsrAccess, MsrSafe};
use crate::util::sysfs::read_text_u64;

/// An MSR energy reading in both scales
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsrEnergy {
	/// Energy in microjoules
	pub microjoules: u64,
	/// Register value as read
	pub raw: u64,
}

/// Initialized energy backends
///
/// Discovery and calibration run once, in [`EnergyMonitor::init`]; every reader
/// then works from the stored results. A backend that failed to initialize stays
/// unavailable and its readers return [`SmiError::NotInitialized`].
pub struct EnergyMonitor {
	paths: SmiPaths,

	/// Register access for the MSR backend
	msr: Box<dyn MsrAccess>,

	/// Energy hwmon directory, e.g. /sys/class/hwmon/hwmon3
	energymon_dir: Option<PathBuf>,

	/// Unit of the MSR energy counters
	energy_unit: Option<EnergyUnit>,
}

impl Clone for EnergyMonitor {
	fn clone(&self) -> Self {
		Self {
			paths: self.paths.clone(),
			msr: self.msr.clone_box(),
			energymon_dir: self.energymon_dir.clone(),
			energy_unit: self.energy_unit,
		}
	}
}

impl fmt::Debug for EnergyMonitor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EnergyMonitor")
			.field("paths", &self.paths)
			.field("msr", &self.msr)
			.field("energymon_dir", &self.energymon_dir)
			.field("energy_unit", &self.energy_unit)
			.finish()
	}
}

impl MonitorType {
	/// Failure handling of batch reads over this backend
	///
	/// The hwmon driver reports every sensor it can, while an MSR failure ends the
	/// batch. The two differ on purpose and are kept apart.
	pub const fn batch_policy(self) -> BatchPolicy {
		match self {
			MonitorType::EnergySysfs => BatchPolicy::ContinueOnError,
			MonitorType::MsrSafe => BatchPolicy::AbortOnError,
		}
	}
}

impl EnergyMonitor {
	/// Discovers the energy hwmon device and calibrates the MSR energy unit
	///
	/// Either backend may be missing; only when neither is usable does this fail.
	pub fn init(paths: SmiPaths) -> Result<Self> {
		let msr = MsrSafe::new(&paths.msr_root);
		Self::init_with(paths, Box::new(msr))
	}

	/// Like [`EnergyMonitor::init`], reading MSRs through `msr` instead of `msr_safe`
	pub fn init_with(paths: SmiPaths, msr: Box<dyn MsrAccess>) -> Result<Self> {
		let energymon_dir = match discover(&paths.hwmon_root) {
			Ok(dir) => Some(dir),
			Err(e) => {
				warn!(error = %e, "energy hwmon device not available");
				None
			},
		};

		let energy_unit = match calibrate(msr.as_ref()) {
			Ok(unit) => Some(unit),
			Err(e) => {
				warn!(error = %e, "msr_safe energy unit not available");
				None
			},
		};

		if energymon_dir.is_none() && energy_unit.is_none() {
			return Err(SmiError::NoEnergyDriver);
		}

		Ok(Self {
			paths,
			msr,
			energymon_dir,
			energy_unit,
		})
	}

	/// Builds a monitor from backends initialized elsewhere
	pub fn with_state(paths: SmiPaths, energymon_dir: Option<PathBuf>, energy_unit: Option<EnergyUnit>) -> Self {
		let msr = Box::new(MsrSafe::new(&paths.msr_root));
		Self {
			paths,
			msr,
			energymon_dir,
			energy_unit,
		}
	}

	/// Replaces the MSR register access
	pub fn with_msr(mut self, msr: Box<dyn MsrAccess>) -> Self {
		self.msr = msr;
		self
	}

	pub fn paths(&self) -> &SmiPaths {
		&self.paths
	}

	pub fn energymon_dir(&self) -> Option<&Path> {
		self.energymon_dir.as_deref()
	}

	pub fn energy_unit(&self) -> Option<EnergyUnit> {
		self.energy_unit
	}

	/// Backend used by [`EnergyMonitor::batch_read`] when the caller has no preference
	pub fn preferred_backend(&self) -> Option<MonitorType> {
		if self.energymon_dir.is_some() {
			Some(MonitorType::EnergySysfs)
		} else if self.energy_unit.is_some() {
			Some(MonitorType::MsrSafe)
		} else {
			None
		}
	}

	/// Re-reads the energy unit, replacing the stored one
	///
	/// On failure the MSR backend becomes unavailable.
	pub fn recalibrate(&mut self) -> Result<EnergyUnit> {
		self.energy_unit = None;
		let unit = calibrate(self.msr.as_ref())?;
		self.energy_unit = Some(unit);
		Ok(unit)
	}

	/// Reads `energyN_input` of the hwmon device, already in microjoules
	pub fn read_energy(&self, sensor_id: u32) -> Result<u64> {
		let dir = self.sysfs_dir()?;
		read_text_u64(&make_path(MonitorType::EnergySysfs, dir, sensor_id))
	}

	/// Reads the core energy counter of CPU `sensor_id`
	pub fn read_msr_energy(&self, sensor_id: u32) -> Result<MsrEnergy> {
		self.read_msr_energy_at(sensor_id, ENERGY_CORE_MSR)
	}

	/// Reads the package energy counter through CPU `sensor_id`
	pub fn read_package_energy(&self, sensor_id: u32) -> Result<MsrEnergy> {
		self.read_msr_energy_at(sensor_id, ENERGY_PKG_MSR)
	}

	/// Reads energy register `register` of CPU `sensor_id` and converts it
	pub fn read_msr_energy_at(&self, sensor_id: u32, register: u64) -> Result<MsrEnergy> {
		let unit = self.msr_unit()?;
		let raw = self.msr.read(sensor_id, register)?;
		Ok(MsrEnergy {
			microjoules: unit.to_microjoules(raw),
			raw,
		})
	}

	/// Reads `energy1_input` to `energy<cpus>_input` into slots `0..cpus`
	pub fn batch_read_energy(&self, cpus: u32) -> BatchReading {
		let dir = match self.sysfs_dir() {
			Ok(dir) => dir,
			Err(e) => return uninitialized(cpus, e),
		};

		batch_read(cpus as usize, MonitorType::EnergySysfs.batch_policy(), |slot| {
			read_text_u64(&make_path(MonitorType::EnergySysfs, dir, slot as u32 + 1))
		})
	}

	/// Reads the core energy of CPUs `0..cpus`, in microjoules
	pub fn batch_read_msr_energy(&self, cpus: u32) -> BatchReading {
		if let Err(e) = self.msr_unit() {
			return uninitialized(cpus, e);
		}

		batch_read(cpus as usize, MonitorType::MsrSafe.batch_policy(), |slot| {
			self.read_msr_energy(slot as u32).map(|energy| energy.microjoules)
		})
	}

	/// Batch read over an explicit backend
	pub fn batch_read(&self, monitor: MonitorType, cpus: u32) -> BatchReading {
		match monitor {
			MonitorType::EnergySysfs => self.batch_read_energy(cpus),
			MonitorType::MsrSafe => self.batch_read_msr_energy(cpus),
		}
	}

	fn sysfs_dir(&self) -> Result<&Path> {
		self.energymon_dir
			.as_deref()
			.ok_or(SmiError::NotInitialized("energy hwmon device"))
	}

	fn msr_unit(&self) -> Result<EnergyUnit> {
		self.energy_unit.ok_or(SmiError::NotInitialized("msr_safe energy unit"))
	}
}

/// Locates the energy hwmon directory below `hwmon_root`
pub fn discover(hwmon_root: &Path) -> Result<PathBuf> {
	let entry = find_energy(hwmon_root, ENERGY_DEV_NAME)?;
	let dir = hwmon_root.join(entry);
	if dir.as_os_str().len() >= DRVPATHSIZ {
		return Err(SmiError::InvalidArgument("hwmon device path too long"));
	}
	debug!(dir = %dir.display(), "using energy hwmon directory");
	Ok(dir)
}

fn uninitialized(cpus: u32, error: SmiError) -> BatchReading {
	BatchReading {
		values: vec![0; cpus as usize],
		error: Some(error),
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;
	use std::fs::{self, OpenOptions};
	use std::io;
	use std::os::unix::fs::FileExt;

	use tempfile::TempDir;

	use super::*;
	use crate::constants::ENERGY_PWR_UNIT_MSR;

	/// Registers held in memory, keyed by CPU and register number
	#[derive(Debug, Clone, Default)]
	struct FakeMsr {
		registers: HashMap<(u32, u64), u64>,
		errors: HashMap<u32, i32>,
	}

	impl FakeMsr {
		fn with(mut self, cpu: u32, register: u64, value: u64) -> Self {
			self.registers.insert((cpu, register), value);
			self
		}

		fn failing(mut self, cpu: u32, errno: i32) -> Self {
			self.errors.insert(cpu, errno);
			self
		}
	}

	impl MsrAccess for FakeMsr {
		fn read(&self, cpu: u32, register: u64) -> Result<u64> {
			let path = format!("{cpu}/msr_safe");
			if let Some(&errno) = self.errors.get(&cpu) {
				return Err(SmiError::io(path, io::Error::from_raw_os_error(errno)));
			}
			self.registers
				.get(&(cpu, register))
				.copied()
				.ok_or_else(|| SmiError::io(path, io::Error::from_raw_os_error(libc::ENOENT)))
		}

		fn clone_box(&self) -> Box<dyn MsrAccess> {
			Box::new(self.clone())
		}
	}

	// msr_safe maps offsets to registers; a plain file can only hold one of them
	fn write_msr_file(root: &Path, cpu: u32, register: u64, value: u64) {
		let dir = root.join(cpu.to_string());
		fs::create_dir_all(&dir).unwrap();
		let file = OpenOptions::new().create(true).write(true).open(dir.join("msr_safe")).unwrap();
		file.write_all_at(&value.to_ne_bytes(), register).unwrap();
	}

	fn sysfs_monitor(root: &Path) -> EnergyMonitor {
		EnergyMonitor::with_state(SmiPaths::default(), Some(root.to_path_buf()), None)
	}

	fn msr_monitor(msr: FakeMsr, exponent: u8) -> EnergyMonitor {
		EnergyMonitor::with_state(SmiPaths::default(), None, Some(EnergyUnit::from_exponent(exponent)))
			.with_msr(Box::new(msr))
	}

	#[test]
	fn sysfs_energy_is_returned_unscaled() {
		let root = TempDir::new().unwrap();
		fs::write(root.path().join("energy3_input"), "123456789\n").unwrap();

		assert_eq!(sysfs_monitor(root.path()).read_energy(3).unwrap(), 123_456_789);
	}

	#[test]
	fn msr_energy_is_scaled_by_unit() {
		let msr = FakeMsr::default()
			.with(12, ENERGY_CORE_MSR, 5 << 16)
			.with(12, ENERGY_PKG_MSR, 1 << 17);

		let monitor = msr_monitor(msr, 16);
		assert_eq!(
			monitor.read_msr_energy(12).unwrap(),
			MsrEnergy {
				microjoules: 5_000_000,
				raw: 5 << 16,
			}
		);
		assert_eq!(monitor.read_package_energy(12).unwrap().microjoules, 2_000_000);
	}

	#[test]
	fn msr_energy_reads_msr_safe_node() {
		let root = TempDir::new().unwrap();
		write_msr_file(root.path(), 2, ENERGY_CORE_MSR, 3 << 15);

		let monitor = EnergyMonitor::with_state(
			SmiPaths::default().with_msr_root(root.path()),
			None,
			Some(EnergyUnit::from_exponent(16)),
		);
		assert_eq!(monitor.read_msr_energy(2).unwrap().microjoules, 1_500_000);
	}

	#[test]
	fn msr_zero_register_reads_zero() {
		let msr = FakeMsr::default().with(0, ENERGY_CORE_MSR, 0);
		assert_eq!(msr_monitor(msr, 16).read_msr_energy(0).unwrap().microjoules, 0);
	}

	#[test]
	fn readers_require_their_backend() {
		let monitor = EnergyMonitor::with_state(SmiPaths::default(), None, None);
		assert!(matches!(monitor.read_energy(1), Err(SmiError::NotInitialized(_))));
		assert!(matches!(monitor.read_msr_energy(0), Err(SmiError::NotInitialized(_))));

		let batch = monitor.batch_read_msr_energy(4);
		assert_eq!(batch.values, vec![0; 4]);
		assert!(matches!(batch.error, Some(SmiError::NotInitialized(_))));
		assert_eq!(monitor.preferred_backend(), None);
	}

	#[test]
	fn sysfs_batch_is_one_based_and_continues() {
		let root = TempDir::new().unwrap();
		for sensor in [1, 2, 4] {
			fs::write(root.path().join(format!("energy{sensor}_input")), format!("{}\n", sensor * 10)).unwrap();
		}

		let batch = sysfs_monitor(root.path()).batch_read_energy(4);
		// energy3_input is missing, which is not "device absent"
		assert_eq!(batch.values, vec![10, 20, 0, 40]);
		assert_eq!(batch.errno(), libc::ENOENT);
	}

	#[test]
	fn msr_batch_stops_at_missing_cpu() {
		let mut msr = FakeMsr::default();
		for cpu in [0, 1, 3] {
			msr = msr.with(cpu, ENERGY_CORE_MSR, u64::from(cpu + 1) << 16);
		}

		let batch = msr_monitor(msr, 16).batch_read_msr_energy(4);
		assert_eq!(batch.values, vec![1_000_000, 2_000_000, 0, 0]);
		assert_eq!(batch.errno(), libc::ENOENT);
	}

	#[test]
	fn msr_batch_skips_absent_cpu() {
		let msr = FakeMsr::default()
			.with(0, ENERGY_CORE_MSR, 1 << 16)
			.failing(1, libc::ENODEV)
			.with(2, ENERGY_CORE_MSR, 2 << 16);

		let batch = msr_monitor(msr, 16).batch_read_msr_energy(3);
		assert!(batch.is_ok());
		assert_eq!(batch.values, vec![1_000_000, 0, 2_000_000]);
	}

	#[test]
	fn init_uses_whatever_backend_exists() {
		let hwmon = TempDir::new().unwrap();
		let msr = TempDir::new().unwrap();
		let paths = SmiPaths::default().with_hwmon_root(hwmon.path()).with_msr_root(msr.path());

		let err = EnergyMonitor::init(paths.clone()).unwrap_err();
		assert!(matches!(err, SmiError::NoEnergyDriver));
		assert_eq!(err.status(), crate::error::Status::NoEnergyDrv);

		write_msr_file(msr.path(), 0, ENERGY_PWR_UNIT_MSR, 0x000A_1003);
		let monitor = EnergyMonitor::init(paths.clone()).unwrap();
		assert_eq!(monitor.energy_unit(), Some(EnergyUnit::from_exponent(16)));
		assert_eq!(monitor.energymon_dir(), None);
		assert_eq!(monitor.preferred_backend(), Some(MonitorType::MsrSafe));

		fs::create_dir_all(hwmon.path().join("hwmon4")).unwrap();
		fs::write(hwmon.path().join("hwmon4/name"), "amd_energy\n").unwrap();
		let monitor = EnergyMonitor::init(paths).unwrap();
		assert_eq!(monitor.energymon_dir(), Some(hwmon.path().join("hwmon4").as_path()));
		assert_eq!(monitor.preferred_backend(), Some(MonitorType::EnergySysfs));
	}

	#[test]
	fn init_with_calibrates_through_given_access() {
		let hwmon = TempDir::new().unwrap();
		let paths = SmiPaths::default().with_hwmon_root(hwmon.path());
		let msr = FakeMsr::default()
			.with(0, ENERGY_PWR_UNIT_MSR, 0x000A_0E03)
			.with(0, ENERGY_CORE_MSR, 1 << 14);

		let monitor = EnergyMonitor::init_with(paths, Box::new(msr)).unwrap();
		assert_eq!(monitor.energy_unit(), Some(EnergyUnit::from_exponent(14)));
		assert_eq!(monitor.clone().read_msr_energy(0).unwrap().microjoules, 1_000_000);
	}

	#[test]
	fn recalibrate_overwrites_unit() {
		let msr = TempDir::new().unwrap();
		write_msr_file(msr.path(), 0, ENERGY_PWR_UNIT_MSR, 0x0E00);
		let mut monitor = EnergyMonitor::with_state(
			SmiPaths::default().with_msr_root(msr.path()),
			None,
			Some(EnergyUnit::from_exponent(16)),
		);

		assert_eq!(monitor.recalibrate().unwrap().exponent(), 14);
		assert_eq!(monitor.recalibrate().unwrap().exponent(), 14);

		fs::remove_file(msr.path().join("0/msr_safe")).unwrap();
		assert!(monitor.recalibrate().is_err());
		assert_eq!(monitor.energy_unit(), None);
	}

	#[test]
	fn backends_have_distinct_batch_policies() {
		assert_eq!(MonitorType::EnergySysfs.batch_policy(), BatchPolicy::ContinueOnError);
		assert_eq!(MonitorType::MsrSafe.batch_policy(), BatchPolicy::AbortOnError);
	}
}
