// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core types used throughout the SDDS library.
//!
//! This module provides the foundational types for the library:
//! - [`SddsError`] - Comprehensive error handling
//! - [`SddsType`] - The scalar type catalog
//! - [`Value`] / [`ColumnData`] - Typed scalars and buffers
//! - [`FormatSpec`] - printf-style ASCII formatting
//! - [`Encoding`], [`ByteOrder`], [`MajorOrder`] - Data mode identifiers

pub mod error;
pub mod format;
pub mod types;
pub mod value;

pub use error::{Result, SddsError};
pub use format::FormatSpec;
pub use types::SddsType;
pub use value::{ColumnData, Scalar, Value};

use serde::{Deserialize, Serialize};

/// Page body encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Human-readable text
    #[default]
    Ascii,
    /// Compact binary
    Binary,
}

/// Error returned when parsing a data mode identifier fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseModeError {
    expected: &'static str,
}

impl std::fmt::Display for ParseModeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid value, expected {}", self.expected)
    }
}

impl std::error::Error for ParseModeError {}

impl std::str::FromStr for Encoding {
    type Err = ParseModeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ascii" => Ok(Encoding::Ascii),
            "binary" => Ok(Encoding::Binary),
            _ => Err(ParseModeError {
                expected: "'ascii' or 'binary'",
            }),
        }
    }
}

impl Encoding {
    /// Check if this encoding is ASCII.
    pub fn is_ascii(&self) -> bool {
        matches!(self, Encoding::Ascii)
    }

    /// Check if this encoding is binary.
    pub fn is_binary(&self) -> bool {
        matches!(self, Encoding::Binary)
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Ascii => "ascii",
            Encoding::Binary => "binary",
        }
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte order of binary page bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Byte order of the running host.
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ByteOrder::Little => "little",
            ByteOrder::Big => "big",
        }
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        ByteOrder::native()
    }
}

impl std::str::FromStr for ByteOrder {
    type Err = ParseModeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "little" | "little-endian" => Ok(ByteOrder::Little),
            "big" | "big-endian" => Ok(ByteOrder::Big),
            _ => Err(ParseModeError {
                expected: "'little' or 'big'",
            }),
        }
    }
}

/// Layout of the column block in binary pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MajorOrder {
    /// Each row contiguous
    #[default]
    Row,
    /// Each column contiguous
    Column,
}

impl MajorOrder {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MajorOrder::Row => "row",
            MajorOrder::Column => "column",
        }
    }
}

impl std::str::FromStr for MajorOrder {
    type Err = ParseModeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "row" => Ok(MajorOrder::Row),
            "column" => Ok(MajorOrder::Column),
            _ => Err(ParseModeError {
                expected: "'row' or 'column'",
            }),
        }
    }
}
