// Kernel-exposed locations
pub const HWMON_PATH: &str = "/sys/class/hwmon";
pub const MSR_PATH: &str = "/dev/cpu";
pub const HSMP_CHAR_DEVFILE_NAME: &str = "/dev/hsmp";

/// hwmon `name` of the supported energy driver
pub const ENERGY_DEV_NAME: &str = "amd_energy";

// Path templates, '#' is replaced by the sensor index
pub const PATH_PLACEHOLDER: char = '#';
pub const ENERGY_FILE_TEMPLATE: &str = "energy#_input";
pub const MSR_SAFE_FILE_TEMPLATE: &str = "#/msr_safe";

// Buffer ceilings, each includes room for a terminator
pub const FILESIZ: usize = 64;
pub const FILEPATHSIZ: usize = 512;
pub const DRVPATHSIZ: usize = 1024;

// AMD RAPL MSR addresses
pub const ENERGY_PWR_UNIT_MSR: u64 = 0xC001_0299;
pub const ENERGY_CORE_MSR: u64 = 0xC001_029A;
pub const ENERGY_PKG_MSR: u64 = 0xC001_029B;

// Energy status unit, bits 12:8 of the power unit register
pub const AMD_ENERGY_UNIT_MASK: u64 = 0x1F00;
pub const AMD_ENERGY_UNIT_OFFSET: u32 = 8;

pub const POWER_SCALE: u64 = 1_000_000;

// HSMP ioctl interface (linux/include/uapi/asm/amd_hsmp.h)
pub const HSMP_MAX_MSG_LEN: usize = 8;
pub const HSMP_BASE_IOCTL_NR: u32 = 0xF8;

// Environment overrides for the kernel-exposed locations
pub const ENV_HWMON_ROOT: &str = "CPU_SMI_HWMON_ROOT";
pub const ENV_MSR_ROOT: &str = "CPU_SMI_MSR_ROOT";
pub const ENV_HSMP_DEVICE: &str = "CPU_SMI_HSMP_DEVICE";
pub const ENV_LOG: &str = "CPU_SMI_LOG";

// Sampling window used by the power subcommand
pub const DATA_COLLECTION_INTERVAL_MS: u64 = 100;
