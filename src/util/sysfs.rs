use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::str::FromStr;

use tracing::trace;

use crate::error::{Result, SmiError};

/// Reads an unsigned 32-bit decimal value from a sysfs text file
pub fn read_text_u32(path: &Path) -> Result<u32> {
	read_text_uint(path)
}

/// Reads an unsigned 64-bit decimal value from a sysfs text file
pub fn read_text_u64(path: &Path) -> Result<u64> {
	read_text_uint(path)
}

/// Writes a signed value to a sysfs text file, without a trailing newline
pub fn write_text_i32(path: &Path, value: i32) -> Result<()> {
	write_text(path, value)
}

/// Writes an unsigned value to a sysfs text file, without a trailing newline
pub fn write_text_u32(path: &Path, value: u32) -> Result<()> {
	write_text(path, value)
}

/// Reads one line of at most `max_len - 1` bytes
///
/// The trailing newline, if it fits, is not part of the result. An empty file
/// reads as an empty string.
pub fn read_text_string(path: &Path, max_len: usize) -> Result<String> {
	require_path(path)?;
	if max_len == 0 {
		return Err(SmiError::InvalidArgument("string buffer length"));
	}
	trace!(path = %path.display(), max_len, "read string");

	let file = File::open(path).map_err(|e| SmiError::io(path, e))?;
	let mut reader = BufReader::new(file).take((max_len - 1) as u64);
	let mut line = Vec::new();
	reader.read_until(b'\n', &mut line).map_err(|e| SmiError::io(path, e))?;
	if line.last() == Some(&b'\n') {
		line.pop();
	}
	Ok(String::from_utf8_lossy(&line).into_owned())
}

fn read_text_uint<T: FromStr>(path: &Path) -> Result<T> {
	require_path(path)?;
	trace!(path = %path.display(), "read value");

	let mut content = String::new();
	File::open(path)
		.and_then(|mut file| file.read_to_string(&mut content))
		.map_err(|e| SmiError::io(path, e))?;

	// Scan the first whitespace-delimited token, as sysfs values are newline-terminated
	content
		.split_whitespace()
		.next()
		.and_then(|token| token.parse().ok())
		.ok_or_else(|| SmiError::Parse {
			path: path.to_path_buf(),
			content: content.trim_end().to_owned(),
		})
}

fn write_text<T: Display>(path: &Path, value: T) -> Result<()> {
	require_path(path)?;
	trace!(path = %path.display(), %value, "write value");

	let mut file = OpenOptions::new()
		.write(true)
		.create(true)
		.truncate(true)
		.open(path)
		.map_err(|e| SmiError::io(path, e))?;
	write!(file, "{value}").map_err(|e| SmiError::io(path, e))
}

pub(crate) fn require_path(path: &Path) -> Result<()> {
	if path.as_os_str().is_empty() {
		return Err(SmiError::InvalidArgument("path"));
	}
	Ok(())
}
