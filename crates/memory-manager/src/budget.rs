// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Arena capacity parsing.
//!
//! A [`MemoryBudget`] is the fixed byte capacity reserved for the arena at
//! startup. It is parsed from the configuration file, so it accepts
//! human-readable strings including fractional sizes such as `"2.5M"`.

use crate::MemoryError;
use std::fmt;

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;
const GIB: usize = 1024 * MIB;

/// The fixed capacity of an arena, in bytes.
///
/// # Parsing
/// - `"2.5M"` or `"2.5MB"` → 2 621 440 bytes
/// - `"512K"` or `"512KB"` → 524 288 bytes
/// - `"1G"` → 1 073 741 824 bytes
/// - `"4096"` or `"4096B"` → raw byte count
///
/// Fractional values are truncated to whole bytes.
///
/// # Examples
/// ```
/// use memory_manager::MemoryBudget;
///
/// let b = MemoryBudget::parse("2.5M").unwrap();
/// assert_eq!(b.as_bytes(), 2_621_440);
/// assert_eq!(b.to_string(), "2.50 MB");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct MemoryBudget {
    bytes: usize,
}

impl MemoryBudget {
    /// Creates a budget from a byte count.
    pub const fn from_bytes(bytes: usize) -> Self {
        Self { bytes }
    }

    /// Creates a budget from kibibytes.
    pub const fn from_kb(kb: usize) -> Self {
        Self { bytes: kb * KIB }
    }

    /// Creates a budget from mebibytes.
    pub const fn from_mb(mb: usize) -> Self {
        Self { bytes: mb * MIB }
    }

    /// Returns the budget in bytes.
    pub const fn as_bytes(&self) -> usize {
        self.bytes
    }

    /// Returns the budget in kibibytes (truncated).
    pub const fn as_kb(&self) -> usize {
        self.bytes / KIB
    }

    /// Parses a human-readable size string. Case-insensitive.
    pub fn parse(s: &str) -> Result<Self, MemoryError> {
        let trimmed = s.trim();
        let invalid = |detail: &str| MemoryError::InvalidBudget {
            input: s.to_string(),
            detail: detail.to_string(),
        };

        let upper = trimmed.to_ascii_uppercase();
        let digits_end = upper
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(upper.len());
        let (number, suffix) = upper.split_at(digits_end);

        let multiplier = match suffix.trim() {
            "" | "B" => 1,
            "K" | "KB" => KIB,
            "M" | "MB" => MIB,
            "G" | "GB" => GIB,
            _ => return Err(invalid("unknown suffix, expected K, M or G")),
        };

        let (whole, fraction) = match number.split_once('.') {
            Some((w, f)) => (w, f),
            None => (number, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("missing number"));
        }

        let whole: usize = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("not a number"))?
        };
        let mut bytes = whole
            .checked_mul(multiplier)
            .ok_or_else(|| invalid("size overflows usize"))?;

        // Integer arithmetic keeps "2.5M" exact; digits past the ninth are ignored.
        if !fraction.is_empty() {
            let digits = &fraction[..fraction.len().min(9)];
            let numerator: u128 = digits.parse().map_err(|_| invalid("not a number"))?;
            let denominator = 10u128.pow(digits.len() as u32);
            let extra = (numerator * multiplier as u128 / denominator) as usize;
            bytes = bytes
                .checked_add(extra)
                .ok_or_else(|| invalid("size overflows usize"))?;
        }

        if bytes == 0 {
            return Err(invalid("capacity must be non-zero"));
        }
        Ok(Self { bytes })
    }
}

impl fmt::Display for MemoryBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.bytes;
        if b >= GIB {
            write!(f, "{:.2} GB", b as f64 / GIB as f64)
        } else if b >= MIB {
            write!(f, "{:.2} MB", b as f64 / MIB as f64)
        } else if b >= KIB && b % KIB == 0 {
            write!(f, "{} KB", b / KIB)
        } else {
            write!(f, "{b} B")
        }
    }
}

impl std::str::FromStr for MemoryBudget {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fractional_megabytes() {
        assert_eq!(MemoryBudget::parse("2.5M").unwrap().as_bytes(), 2_621_440);
        assert_eq!(MemoryBudget::parse("2.5mb").unwrap().as_bytes(), 2_621_440);
        assert_eq!(MemoryBudget::parse(".5K").unwrap().as_bytes(), 512);
    }

    #[test]
    fn test_parse_whole_units() {
        assert_eq!(MemoryBudget::parse("512K").unwrap().as_kb(), 512);
        assert_eq!(MemoryBudget::parse("16MB").unwrap(), MemoryBudget::from_mb(16));
        assert_eq!(MemoryBudget::parse("1G").unwrap().as_bytes(), GIB);
        assert_eq!(MemoryBudget::parse(" 4096 ").unwrap().as_bytes(), 4096);
        assert_eq!(MemoryBudget::parse("4096B").unwrap().as_bytes(), 4096);
    }

    #[test]
    fn test_fraction_truncates_to_bytes() {
        // 0.0001 KB is below one byte and contributes nothing.
        assert_eq!(MemoryBudget::parse("1.0001K").unwrap().as_bytes(), 1024);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(MemoryBudget::parse("").is_err());
        assert!(MemoryBudget::parse("M").is_err());
        assert!(MemoryBudget::parse("0K").is_err());
        assert!(MemoryBudget::parse("12X").is_err());
        assert!(MemoryBudget::parse("1.2.3M").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(MemoryBudget::from_bytes(2_621_440).to_string(), "2.50 MB");
        assert_eq!(MemoryBudget::from_kb(512).to_string(), "512 KB");
        assert_eq!(MemoryBudget::from_bytes(100).to_string(), "100 B");
    }

    #[test]
    fn test_from_str_and_serde() {
        let b: MemoryBudget = "64K".parse().unwrap();
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(json, "65536");
        let back: MemoryBudget = serde_json::from_str(&json).unwrap();
        assert_eq!(back, b);
    }
}
