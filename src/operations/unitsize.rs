#![deny(warnings)]

// Storage unit conversion and human-readable sizes

use crate::error::{FileIoError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageUnit {
    Byte,
    Kilobyte,
    Megabyte,
    Gigabyte,
    Terabyte,
    Petabyte,
}

impl StorageUnit {
    /// Smallest to largest
    pub const ALL: [StorageUnit; 6] = [
        StorageUnit::Byte,
        StorageUnit::Kilobyte,
        StorageUnit::Megabyte,
        StorageUnit::Gigabyte,
        StorageUnit::Terabyte,
        StorageUnit::Petabyte,
    ];

    /// Bytes per unit (binary multiples)
    pub fn factor(self) -> u64 {
        match self {
            StorageUnit::Byte => 1,
            StorageUnit::Kilobyte => 1 << 10,
            StorageUnit::Megabyte => 1 << 20,
            StorageUnit::Gigabyte => 1 << 30,
            StorageUnit::Terabyte => 1 << 40,
            StorageUnit::Petabyte => 1 << 50,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            StorageUnit::Byte => "B",
            StorageUnit::Kilobyte => "KB",
            StorageUnit::Megabyte => "MB",
            StorageUnit::Gigabyte => "GB",
            StorageUnit::Terabyte => "TB",
            StorageUnit::Petabyte => "PB",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StorageUnit::Byte => "byte",
            StorageUnit::Kilobyte => "kilobyte",
            StorageUnit::Megabyte => "megabyte",
            StorageUnit::Gigabyte => "gigabyte",
            StorageUnit::Terabyte => "terabyte",
            StorageUnit::Petabyte => "petabyte",
        }
    }
}

impl FromStr for StorageUnit {
    type Err = crate::error::FopsError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        let unit = match lowered.as_str() {
            "" | "b" | "byte" | "bytes" => StorageUnit::Byte,
            "k" | "kb" | "kib" | "kilobyte" | "kilobytes" => StorageUnit::Kilobyte,
            "m" | "mb" | "mib" | "megabyte" | "megabytes" => StorageUnit::Megabyte,
            "g" | "gb" | "gib" | "gigabyte" | "gigabytes" => StorageUnit::Gigabyte,
            "t" | "tb" | "tib" | "terabyte" | "terabytes" => StorageUnit::Terabyte,
            "p" | "pb" | "pib" | "petabyte" | "petabytes" => StorageUnit::Petabyte,
            _ => return Err(FileIoError::InvalidUnit(format!("Unknown unit: {}", s)).into()),
        };
        Ok(unit)
    }
}

impl fmt::Display for StorageUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// Compiled on first use
static SIZE_PATTERN: Lazy<std::result::Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^\s*([0-9]+(?:\.[0-9]+)?)\s*([A-Za-z]*)\s*$"));

/// A byte quantity that can be set and read in any storage unit.
///
/// ```
/// use fops_mcp::operations::unitsize::{StorageUnit, UnitSize};
///
/// let mut size = UnitSize::new();
/// size.set(StorageUnit::Megabyte, 1.0);
/// assert_eq!(size.bytes(), 1_048_576);
/// assert_eq!(size.get(StorageUnit::Kilobyte), 1024.0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitSize {
    bytes: u64,
}

impl UnitSize {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: u64) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Set the quantity as `value` of `unit`; fractional bytes round to nearest,
    /// negatives and NaN clamp to zero.
    pub fn set(&mut self, unit: StorageUnit, value: f64) {
        let bytes = (value * unit.factor() as f64).round();
        self.bytes = if bytes.is_nan() || bytes <= 0.0 {
            0
        } else if bytes >= u64::MAX as f64 {
            u64::MAX
        } else {
            bytes as u64
        };
    }

    pub fn get(&self, unit: StorageUnit) -> f64 {
        self.bytes as f64 / unit.factor() as f64
    }

    /// Every unit's reading of this size, smallest first
    pub fn table(&self) -> Vec<(StorageUnit, f64)> {
        StorageUnit::ALL.iter().map(|u| (*u, self.get(*u))).collect()
    }
}

impl FromStr for UnitSize {
    type Err = crate::error::FopsError;

    /// Parse `"512"`, `"1.5 MB"`, `"2gb"`, `"3 kilobytes"`
    fn from_str(s: &str) -> Result<Self> {
        let re = SIZE_PATTERN
            .as_ref()
            .map_err(|e| FileIoError::RegexError(e.clone()))?;
        let caps = re
            .captures(s)
            .ok_or_else(|| FileIoError::InvalidUnit(format!("Cannot parse size: {}", s)))?;
        let value: f64 = caps[1]
            .parse()
            .map_err(|_| FileIoError::InvalidUnit(format!("Invalid number in size: {}", s)))?;
        let unit: StorageUnit = caps[2].parse()?;

        let mut size = UnitSize::new();
        size.set(unit, value);
        Ok(size)
    }
}

impl fmt::Display for UnitSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&storage_unit_lookup(self.bytes))
    }
}

/// Render a byte count in the largest unit that keeps the value at or above 1,
/// with at most two decimals (`0 B`, `1.5 KB`, `1 MB`).
pub fn storage_unit_lookup(bytes: u64) -> String {
    let unit = StorageUnit::ALL
        .iter()
        .rev()
        .copied()
        .find(|u| bytes >= u.factor())
        .unwrap_or(StorageUnit::Byte);

    let value = bytes as f64 / unit.factor() as f64;
    let rendered = format!("{:.2}", value);
    let trimmed = rendered.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, unit.symbol())
}
