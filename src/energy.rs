use tracing::debug;

use crate::constants::{AMD_ENERGY_UNIT_MASK, AMD_ENERGY_UNIT_OFFSET, ENERGY_PWR_UNIT_MSR, POWER_SCALE};
use crate::error::Result;
use crate::util::msr::MsrAccess;

/// Energy status unit of the RAPL counters
///
/// One raw counter tick is worth `2^-exponent` joules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnergyUnit(u8);

impl EnergyUnit {
	/// Extracts the unit from a raw power unit register value
	pub const fn from_register(raw: u64) -> Self {
		Self(((raw & AMD_ENERGY_UNIT_MASK) >> AMD_ENERGY_UNIT_OFFSET) as u8)
	}

	pub const fn from_exponent(exponent: u8) -> Self {
		Self(exponent)
	}

	pub const fn exponent(self) -> u8 {
		self.0
	}

	/// Converts raw counter ticks to microjoules, truncating the fraction
	pub fn to_microjoules(self, ticks: u64) -> u64 {
		(ticks as f64 * 0.5f64.powi(i32::from(self.0)) * POWER_SCALE as f64) as u64
	}
}

/// Reads the energy unit from the power unit register of CPU 0
///
/// The unit is package-wide, so one read serves every later conversion.
pub fn calibrate(msr: &dyn MsrAccess) -> Result<EnergyUnit> {
	let raw = msr.read(0, ENERGY_PWR_UNIT_MSR)?;
	let unit = EnergyUnit::from_register(raw);
	debug!(raw = format_args!("{raw:#x}"), exponent = unit.exponent(), "calibrated energy unit");
	Ok(unit)
}
