use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::warn;

use cpu_smi::constants::{DATA_COLLECTION_INTERVAL_MS, ENV_LOG, POWER_SCALE};
use cpu_smi::util::calculate_power_uw;
use cpu_smi::{BatchReading, EnergyMonitor, Hsmp, MonitorType, SmiError, SmiPaths};

#[derive(Parser)]
#[command(name = "cpu-smi", version, about = "Read AMD EPYC energy counters and HSMP telemetry")]
struct Cli {
	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Print the accumulated energy of every core
	Energy {
		/// Number of cores to read, defaults to the physical core count
		#[arg(long)]
		cpus: Option<u32>,
		/// Read through msr_safe even when the hwmon driver is present
		#[arg(long)]
		msr: bool,
	},
	/// Sample core energy twice and print the average power
	Power {
		#[arg(long)]
		cpus: Option<u32>,
		#[arg(long, default_value_t = DATA_COLLECTION_INTERVAL_MS)]
		interval_ms: u64,
	},
	/// Query the HSMP management interface
	Hsmp {
		#[command(subcommand)]
		query: HsmpQuery,
	},
}

#[derive(Subcommand)]
enum HsmpQuery {
	/// HSMP protocol version
	Proto,
	/// SMU firmware version
	Smu,
	/// Socket power and power limit
	Power {
		#[arg(long, default_value_t = 0)]
		socket: u16,
	},
}

fn main() -> ExitCode {
	let log_level = std::env::var(ENV_LOG).unwrap_or_else(|_| "warn".to_string());
	tracing_subscriber::fmt()
		.with_target(false)
		.with_writer(std::io::stderr)
		.with_env_filter(&log_level)
		.init();

	let cli = Cli::parse();
	let paths = SmiPaths::from_env();

	let result = match cli.command {
		Command::Energy { cpus, msr } => print_energy(paths, cpus, msr),
		Command::Power { cpus, interval_ms } => print_power(paths, cpus, interval_ms),
		Command::Hsmp { query } => run_hsmp(&Hsmp::from_paths(&paths), query),
	};

	match result {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			eprintln!("{}", failure_message(&e));
			ExitCode::from(e.status().code() as u8)
		},
	}
}

/// One line per failed command, status first
fn failure_message(e: &SmiError) -> String {
	format!("Error: {} ({})", e.status(), e)
}

fn default_cpus(cpus: Option<u32>) -> u32 {
	cpus.unwrap_or_else(|| num_cpus::get_physical() as u32)
}

fn select_backend(monitor: &EnergyMonitor, force_msr: bool) -> Result<MonitorType, SmiError> {
	if force_msr {
		return Ok(MonitorType::MsrSafe);
	}
	monitor
		.preferred_backend()
		.ok_or(SmiError::NotInitialized("energy backend"))
}

fn read_batch(monitor: &EnergyMonitor, backend: MonitorType, cpus: u32) -> Result<Vec<u64>, SmiError> {
	let BatchReading { values, error } = monitor.batch_read(backend, cpus);
	match error {
		// A sysfs batch still carries every readable sensor
		Some(e) if backend == MonitorType::EnergySysfs => {
			warn!(status = %e.status(), "{e}");
			Ok(values)
		},
		Some(e) => Err(e),
		None => Ok(values),
	}
}

fn print_energy(paths: SmiPaths, cpus: Option<u32>, force_msr: bool) -> Result<(), SmiError> {
	let monitor = EnergyMonitor::init(paths)?;
	let backend = select_backend(&monitor, force_msr)?;
	let values = read_batch(&monitor, backend, default_cpus(cpus))?;

	println!("{:>6} | {:>14}", "Core", "Energy (J)");
	for (core, uj) in values.iter().enumerate() {
		println!("{:>6} | {:>14.3}", core, *uj as f64 / POWER_SCALE as f64);
	}
	Ok(())
}

fn print_power(paths: SmiPaths, cpus: Option<u32>, interval_ms: u64) -> Result<(), SmiError> {
	let monitor = EnergyMonitor::init(paths)?;
	let backend = select_backend(&monitor, false)?;
	let cpus = default_cpus(cpus);

	let start = read_batch(&monitor, backend, cpus)?;
	thread::sleep(Duration::from_millis(interval_ms));
	let end = read_batch(&monitor, backend, cpus)?;

	println!("{:>6} | {:>10}", "Core", "Power (W)");
	let mut total = 0;
	for (core, (s, e)) in start.iter().zip(&end).enumerate() {
		let uw = calculate_power_uw(*s, *e, interval_ms);
		total += uw;
		println!("{:>6} | {:>10.2}", core, uw as f64 / POWER_SCALE as f64);
	}
	println!("{:>6} | {:>10.2}", "Total", total as f64 / POWER_SCALE as f64);
	Ok(())
}

fn run_hsmp(hsmp: &Hsmp, query: HsmpQuery) -> Result<(), SmiError> {
	match query {
		HsmpQuery::Proto => println!("HSMP protocol version: {}", hsmp.proto_version()?),
		HsmpQuery::Smu => println!("SMU firmware version: {}", hsmp.smu_fw_version()?),
		HsmpQuery::Power { socket } => {
			let power = hsmp.socket_power(socket)?;
			let limit = hsmp.socket_power_limit(socket)?;
			println!("Socket {socket} power: {:.3} W (limit {:.3} W)", power as f64 / 1000.0, limit as f64 / 1000.0);
		},
	}
	Ok(())
}
