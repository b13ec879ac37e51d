// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! The scalar type catalog.
//!
//! Each [`SddsType`] knows its header name, binary width, default ASCII
//! format and which other types it widens to without loss.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{Result, SddsError};

/// Scalar types a parameter, array or column can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SddsType {
    /// Extended precision float, held as `f64`
    LongDouble,
    /// 64-bit float
    Double,
    /// 32-bit float
    Float,
    /// Signed 64-bit integer
    Long64,
    /// Unsigned 64-bit integer
    ULong64,
    /// Signed 32-bit integer
    Long,
    /// Unsigned 32-bit integer
    ULong,
    /// Signed 16-bit integer
    Short,
    /// Unsigned 16-bit integer
    UShort,
    /// Variable length string
    String,
    /// Single byte character
    Character,
}

impl SddsType {
    /// Every type, in catalog order.
    pub const ALL: [SddsType; 11] = [
        SddsType::LongDouble,
        SddsType::Double,
        SddsType::Float,
        SddsType::Long64,
        SddsType::ULong64,
        SddsType::Long,
        SddsType::ULong,
        SddsType::Short,
        SddsType::UShort,
        SddsType::String,
        SddsType::Character,
    ];

    /// Name used in the header `type=` attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            SddsType::LongDouble => "longdouble",
            SddsType::Double => "double",
            SddsType::Float => "float",
            SddsType::Long64 => "long64",
            SddsType::ULong64 => "ulong64",
            SddsType::Long => "long",
            SddsType::ULong => "ulong",
            SddsType::Short => "short",
            SddsType::UShort => "ushort",
            SddsType::String => "string",
            SddsType::Character => "character",
        }
    }

    /// Size of one binary element, `None` for strings.
    pub fn binary_width(&self) -> Option<usize> {
        match self {
            SddsType::LongDouble => Some(16),
            SddsType::Double | SddsType::Long64 | SddsType::ULong64 => Some(8),
            SddsType::Float | SddsType::Long | SddsType::ULong => Some(4),
            SddsType::Short | SddsType::UShort => Some(2),
            SddsType::Character => Some(1),
            SddsType::String => None,
        }
    }

    /// printf-style format used when a field declares none.
    pub fn default_format(&self) -> &'static str {
        match self {
            SddsType::LongDouble => "%21.18e",
            SddsType::Double => "%21.15e",
            SddsType::Float => "%15.8e",
            SddsType::Long64 => "%lld",
            SddsType::ULong64 => "%llu",
            SddsType::Long => "%d",
            SddsType::ULong => "%u",
            SddsType::Short => "%hd",
            SddsType::UShort => "%hu",
            SddsType::String => "%s",
            SddsType::Character => "%c",
        }
    }

    /// Check if this is an integer type.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            SddsType::Long64
                | SddsType::ULong64
                | SddsType::Long
                | SddsType::ULong
                | SddsType::Short
                | SddsType::UShort
        )
    }

    /// Check if this is a floating point type.
    pub fn is_floating(&self) -> bool {
        matches!(
            self,
            SddsType::LongDouble | SddsType::Double | SddsType::Float
        )
    }

    /// Check if this is a numeric type.
    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_floating()
    }

    /// Check if this is an unsigned integer type.
    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            SddsType::ULong64 | SddsType::ULong | SddsType::UShort
        )
    }

    /// Bit width of integer types, used for `%x`/`%o` output of negatives.
    pub(crate) fn integer_bits(&self) -> u32 {
        match self {
            SddsType::Short | SddsType::UShort => 16,
            SddsType::Long | SddsType::ULong => 32,
            _ => 64,
        }
    }

    /// Whether every value of `self` is representable in `target`.
    ///
    /// `Double` and `LongDouble` share `f64` storage and convert freely.
    pub fn widens_to(self, target: SddsType) -> bool {
        use SddsType::*;
        if self == target {
            return true;
        }
        match self {
            Short => matches!(target, Long | Long64 | Float | Double | LongDouble),
            UShort => matches!(
                target,
                Long | ULong | Long64 | ULong64 | Float | Double | LongDouble
            ),
            Long => matches!(target, Long64 | Double | LongDouble),
            ULong => matches!(target, Long64 | ULong64 | Double | LongDouble),
            Float => matches!(target, Double | LongDouble),
            Double => target == LongDouble,
            LongDouble => target == Double,
            Character => target == String,
            Long64 | ULong64 | String => false,
        }
    }

    /// Minimum file version able to carry this type.
    pub(crate) fn min_version(&self) -> u32 {
        match self {
            SddsType::Long64 | SddsType::ULong64 => 5,
            SddsType::LongDouble => 4,
            SddsType::UShort | SddsType::ULong => 3,
            _ => 1,
        }
    }
}

impl fmt::Display for SddsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SddsType {
    type Err = SddsError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        SddsType::ALL
            .iter()
            .copied()
            .find(|ty| ty.as_str() == lowered)
            .ok_or_else(|| SddsError::invalid_attribute(s, "type", "unknown type name"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for ty in SddsType::ALL {
            assert_eq!(ty.as_str().parse::<SddsType>().unwrap(), ty);
        }
        assert_eq!("DOUBLE".parse::<SddsType>().unwrap(), SddsType::Double);
        assert!("quad".parse::<SddsType>().is_err());
    }

    #[test]
    fn test_binary_widths() {
        assert_eq!(SddsType::LongDouble.binary_width(), Some(16));
        assert_eq!(SddsType::Short.binary_width(), Some(2));
        assert_eq!(SddsType::Character.binary_width(), Some(1));
        assert_eq!(SddsType::String.binary_width(), None);
    }

    #[test]
    fn test_classification() {
        assert!(SddsType::Long64.is_integer());
        assert!(SddsType::UShort.is_unsigned());
        assert!(!SddsType::Short.is_unsigned());
        assert!(SddsType::Float.is_floating());
        assert!(!SddsType::String.is_numeric());
        assert!(!SddsType::Character.is_numeric());
    }

    #[test]
    fn test_widening() {
        assert!(SddsType::Short.widens_to(SddsType::Double));
        assert!(SddsType::UShort.widens_to(SddsType::ULong));
        assert!(SddsType::Long.widens_to(SddsType::Long64));
        assert!(SddsType::Float.widens_to(SddsType::Double));
        assert!(SddsType::Double.widens_to(SddsType::LongDouble));
        assert!(SddsType::LongDouble.widens_to(SddsType::Double));
        assert!(SddsType::Character.widens_to(SddsType::String));

        assert!(!SddsType::Double.widens_to(SddsType::Short));
        assert!(!SddsType::Short.widens_to(SddsType::UShort));
        assert!(!SddsType::Long.widens_to(SddsType::Float));
        assert!(!SddsType::Long64.widens_to(SddsType::Double));
        assert!(!SddsType::String.widens_to(SddsType::Character));
        assert!(!SddsType::Short.widens_to(SddsType::String));
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&SddsType::ULong64).unwrap();
        assert_eq!(json, "\"ulong64\"");
        let ty: SddsType = serde_json::from_str("\"longdouble\"").unwrap();
        assert_eq!(ty, SddsType::LongDouble);
    }
}
