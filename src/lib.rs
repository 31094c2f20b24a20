//! Energy counters and HSMP management access for AMD EPYC platforms
//!
//! Energy is read either from the `amd_energy` hwmon device or from per-CPU
//! `msr_safe` nodes. [`EnergyMonitor::init`] locates the hwmon device and
//! calibrates the MSR energy unit once; the readers then build each sensor path
//! from a template and read it with a single open/read/close. Management
//! commands go through [`Hsmp`], one ioctl per exchange.

pub mod batch;
pub mod config;
pub mod constants;
pub mod discovery;
pub mod energy;
pub mod error;
pub mod hsmp;
pub mod monitor;
pub mod path;
pub mod util;

pub use crate::batch::{BatchPolicy, BatchReading};
pub use crate::config::SmiPaths;
pub use crate::energy::EnergyUnit;
pub use crate::error::{Result, SmiError, Status};
pub use crate::hsmp::{AccessMode, Hsmp, HsmpMessage, HsmpMessageId, HsmpRequest, HsmpResponse};
pub use crate::monitor::{EnergyMonitor, MsrEnergy};
pub use crate::path::MonitorType;
pub use crate::util::msr::{MsrAccess, MsrSafe};
