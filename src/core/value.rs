// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Value and column storage.
//!
//! [`Value`] is the tagged scalar used for parameters and single-element
//! access. [`ColumnData`] is the typed, contiguous buffer used for columns
//! and flattened arrays. Both convert to other types only through
//! [`SddsType::widens_to`], so a conversion never loses information.
//! Lossy conversions are explicit (`as_f64`, `as_i64`).

use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::SddsType;

/// A single typed scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    LongDouble(f64),
    Double(f64),
    Float(f32),
    Long64(i64),
    ULong64(u64),
    Long(i32),
    ULong(u32),
    Short(i16),
    UShort(u16),
    String(String),
    Character(u8),
}

impl Value {
    /// Zero (or empty) value of a type.
    pub fn default_for(ty: SddsType) -> Value {
        match ty {
            SddsType::LongDouble => Value::LongDouble(0.0),
            SddsType::Double => Value::Double(0.0),
            SddsType::Float => Value::Float(0.0),
            SddsType::Long64 => Value::Long64(0),
            SddsType::ULong64 => Value::ULong64(0),
            SddsType::Long => Value::Long(0),
            SddsType::ULong => Value::ULong(0),
            SddsType::Short => Value::Short(0),
            SddsType::UShort => Value::UShort(0),
            SddsType::String => Value::String(String::new()),
            SddsType::Character => Value::Character(0),
        }
    }

    /// Parse a textual token as a value of `ty`.
    ///
    /// Integer types also accept an integral floating token such as `3.0`.
    pub fn parse_as(ty: SddsType, token: &str) -> Result<Value, String> {
        let text = token.trim();
        let bad = || format!("cannot parse '{token}' as {ty}");
        match ty {
            SddsType::LongDouble => parse_float(text).map(Value::LongDouble).ok_or_else(bad),
            SddsType::Double => parse_float(text).map(Value::Double).ok_or_else(bad),
            SddsType::Float => text
                .parse::<f32>()
                .map(Value::Float)
                .map_err(|_| bad()),
            SddsType::Long64 => parse_integer::<i64>(text).map(Value::Long64).ok_or_else(bad),
            SddsType::ULong64 => parse_integer::<u64>(text).map(Value::ULong64).ok_or_else(bad),
            SddsType::Long => parse_integer::<i32>(text).map(Value::Long).ok_or_else(bad),
            SddsType::ULong => parse_integer::<u32>(text).map(Value::ULong).ok_or_else(bad),
            SddsType::Short => parse_integer::<i16>(text).map(Value::Short).ok_or_else(bad),
            SddsType::UShort => parse_integer::<u16>(text).map(Value::UShort).ok_or_else(bad),
            SddsType::String => Ok(Value::String(token.to_string())),
            SddsType::Character => token
                .as_bytes()
                .first()
                .copied()
                .map(Value::Character)
                .ok_or_else(|| "empty character value".to_string()),
        }
    }

    // ========================================================================
    // Type Checking Predicates
    // ========================================================================

    /// The catalog type of this value.
    pub fn sdds_type(&self) -> SddsType {
        match self {
            Value::LongDouble(_) => SddsType::LongDouble,
            Value::Double(_) => SddsType::Double,
            Value::Float(_) => SddsType::Float,
            Value::Long64(_) => SddsType::Long64,
            Value::ULong64(_) => SddsType::ULong64,
            Value::Long(_) => SddsType::Long,
            Value::ULong(_) => SddsType::ULong,
            Value::Short(_) => SddsType::Short,
            Value::UShort(_) => SddsType::UShort,
            Value::String(_) => SddsType::String,
            Value::Character(_) => SddsType::Character,
        }
    }

    /// Header name of this value's type.
    pub fn type_name(&self) -> &'static str {
        self.sdds_type().as_str()
    }

    /// Check if this value is numeric.
    pub fn is_numeric(&self) -> bool {
        self.sdds_type().is_numeric()
    }

    /// Check if this value is a string.
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    // ========================================================================
    // Conversions
    // ========================================================================

    /// Lossy conversion of any numeric value to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::LongDouble(v) | Value::Double(v) => Some(*v),
            Value::Float(v) => Some(*v as f64),
            Value::Long64(v) => Some(*v as f64),
            Value::ULong64(v) => Some(*v as f64),
            Value::Long(v) => Some(*v as f64),
            Value::ULong(v) => Some(*v as f64),
            Value::Short(v) => Some(*v as f64),
            Value::UShort(v) => Some(*v as f64),
            Value::String(_) | Value::Character(_) => None,
        }
    }

    /// Integer values as `i64`; `None` for non-integers and out-of-range `ulong64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Long64(v) => Some(*v),
            Value::ULong64(v) => i64::try_from(*v).ok(),
            Value::Long(v) => Some(*v as i64),
            Value::ULong(v) => Some(*v as i64),
            Value::Short(v) => Some(*v as i64),
            Value::UShort(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// String contents, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert without loss to `target`, or `None` if that would narrow.
    pub fn widen_to(&self, target: SddsType) -> Option<Value> {
        let source = self.sdds_type();
        if source == target {
            return Some(self.clone());
        }
        if !source.widens_to(target) {
            return None;
        }
        let widened = match (self, target) {
            (Value::Character(c), SddsType::String) => {
                Value::String(text_from_bytes(vec![*c]).ok()?)
            }
            (_, SddsType::LongDouble) => Value::LongDouble(self.as_f64()?),
            (_, SddsType::Double) => Value::Double(self.as_f64()?),
            (Value::Short(v), SddsType::Float) => Value::Float(*v as f32),
            (Value::UShort(v), SddsType::Float) => Value::Float(*v as f32),
            (_, SddsType::Long64) => Value::Long64(self.as_i64()?),
            (Value::UShort(v), SddsType::ULong64) => Value::ULong64(*v as u64),
            (Value::ULong(v), SddsType::ULong64) => Value::ULong64(*v as u64),
            (Value::Short(v), SddsType::Long) => Value::Long(*v as i32),
            (Value::UShort(v), SddsType::Long) => Value::Long(*v as i32),
            (Value::UShort(v), SddsType::ULong) => Value::ULong(*v as u32),
            _ => return None,
        };
        Some(widened)
    }
}

/// Decode string bytes read from a file; bytes that are not UTF-8 are
/// rejected rather than replaced.
pub(crate) fn text_from_bytes(bytes: Vec<u8>) -> std::result::Result<String, String> {
    String::from_utf8(bytes).map_err(|err| {
        let bad = err.utf8_error().valid_up_to();
        format!(
            "string is not valid UTF-8 (byte 0x{:02x} at offset {bad})",
            err.as_bytes()[bad]
        )
    })
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::LongDouble(v) | Value::Double(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Long64(v) => write!(f, "{v}"),
            Value::ULong64(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::ULong(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::UShort(v) => write!(f, "{v}"),
            Value::String(s) => f.write_str(s),
            Value::Character(c) => write!(f, "{}", *c as char),
        }
    }
}

fn parse_float(text: &str) -> Option<f64> {
    text.parse::<f64>().ok()
}

fn parse_integer<T>(text: &str) -> Option<T>
where
    T: std::str::FromStr + TryFrom<i128>,
{
    let text = text.strip_prefix('+').unwrap_or(text);
    if let Ok(v) = text.parse::<T>() {
        return Some(v);
    }
    let float = text.parse::<f64>().ok()?;
    if float.fract() != 0.0 || !float.is_finite() || float.abs() > 1.8e19 {
        return None;
    }
    T::try_from(float as i128).ok()
}

/// Typed contiguous storage for a column or a flattened array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    LongDouble(Vec<f64>),
    Double(Vec<f64>),
    Float(Vec<f32>),
    Long64(Vec<i64>),
    ULong64(Vec<u64>),
    Long(Vec<i32>),
    ULong(Vec<u32>),
    Short(Vec<i16>),
    UShort(Vec<u16>),
    String(Vec<String>),
    Character(Vec<u8>),
}

macro_rules! each_column {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ColumnData::LongDouble($v) => $body,
            ColumnData::Double($v) => $body,
            ColumnData::Float($v) => $body,
            ColumnData::Long64($v) => $body,
            ColumnData::ULong64($v) => $body,
            ColumnData::Long($v) => $body,
            ColumnData::ULong($v) => $body,
            ColumnData::Short($v) => $body,
            ColumnData::UShort($v) => $body,
            ColumnData::String($v) => $body,
            ColumnData::Character($v) => $body,
        }
    };
}

impl ColumnData {
    /// Empty buffer of a type.
    pub fn new(ty: SddsType) -> ColumnData {
        ColumnData::with_capacity(ty, 0)
    }

    /// Empty buffer of a type with room for `capacity` elements.
    pub fn with_capacity(ty: SddsType, capacity: usize) -> ColumnData {
        match ty {
            SddsType::LongDouble => ColumnData::LongDouble(Vec::with_capacity(capacity)),
            SddsType::Double => ColumnData::Double(Vec::with_capacity(capacity)),
            SddsType::Float => ColumnData::Float(Vec::with_capacity(capacity)),
            SddsType::Long64 => ColumnData::Long64(Vec::with_capacity(capacity)),
            SddsType::ULong64 => ColumnData::ULong64(Vec::with_capacity(capacity)),
            SddsType::Long => ColumnData::Long(Vec::with_capacity(capacity)),
            SddsType::ULong => ColumnData::ULong(Vec::with_capacity(capacity)),
            SddsType::Short => ColumnData::Short(Vec::with_capacity(capacity)),
            SddsType::UShort => ColumnData::UShort(Vec::with_capacity(capacity)),
            SddsType::String => ColumnData::String(Vec::with_capacity(capacity)),
            SddsType::Character => ColumnData::Character(Vec::with_capacity(capacity)),
        }
    }

    /// The element type.
    pub fn sdds_type(&self) -> SddsType {
        match self {
            ColumnData::LongDouble(_) => SddsType::LongDouble,
            ColumnData::Double(_) => SddsType::Double,
            ColumnData::Float(_) => SddsType::Float,
            ColumnData::Long64(_) => SddsType::Long64,
            ColumnData::ULong64(_) => SddsType::ULong64,
            ColumnData::Long(_) => SddsType::Long,
            ColumnData::ULong(_) => SddsType::ULong,
            ColumnData::Short(_) => SddsType::Short,
            ColumnData::UShort(_) => SddsType::UShort,
            ColumnData::String(_) => SddsType::String,
            ColumnData::Character(_) => SddsType::Character,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        each_column!(self, v => v.len())
    }

    /// Check if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep the first `len` elements.
    pub fn truncate(&mut self, len: usize) {
        each_column!(self, v => v.truncate(len))
    }

    /// Remove all elements, keeping the allocation.
    pub fn clear(&mut self) {
        each_column!(self, v => v.clear())
    }

    /// Reserve room for `additional` more elements.
    pub fn reserve(&mut self, additional: usize) {
        each_column!(self, v => v.reserve(additional))
    }

    /// Keep the elements whose entry in `keep` is true; elements past the
    /// end of `keep` are dropped.
    pub fn retain_mask(&mut self, keep: &[bool]) {
        each_column!(self, v => {
            let mut index = 0;
            v.retain(|_| {
                let kept = keep.get(index).copied().unwrap_or(false);
                index += 1;
                kept
            })
        })
    }

    /// Grow (with zero/empty values) or shrink to `len` elements.
    pub fn resize_default(&mut self, len: usize) {
        each_column!(self, v => v.resize_with(len, Default::default))
    }

    /// Element `index` as a [`Value`].
    pub fn get(&self, index: usize) -> Option<Value> {
        match self {
            ColumnData::LongDouble(v) => v.get(index).map(|x| Value::LongDouble(*x)),
            ColumnData::Double(v) => v.get(index).map(|x| Value::Double(*x)),
            ColumnData::Float(v) => v.get(index).map(|x| Value::Float(*x)),
            ColumnData::Long64(v) => v.get(index).map(|x| Value::Long64(*x)),
            ColumnData::ULong64(v) => v.get(index).map(|x| Value::ULong64(*x)),
            ColumnData::Long(v) => v.get(index).map(|x| Value::Long(*x)),
            ColumnData::ULong(v) => v.get(index).map(|x| Value::ULong(*x)),
            ColumnData::Short(v) => v.get(index).map(|x| Value::Short(*x)),
            ColumnData::UShort(v) => v.get(index).map(|x| Value::UShort(*x)),
            ColumnData::String(v) => v.get(index).map(|x| Value::String(x.clone())),
            ColumnData::Character(v) => v.get(index).map(|x| Value::Character(*x)),
        }
    }

    /// Append a value, widening it to the buffer's type.
    ///
    /// Returns the value back if it cannot be stored without loss.
    pub fn push(&mut self, value: Value) -> std::result::Result<(), Value> {
        let Some(value) = value.widen_to(self.sdds_type()) else {
            return Err(value);
        };
        match (self, value) {
            (ColumnData::LongDouble(v), Value::LongDouble(x)) => v.push(x),
            (ColumnData::Double(v), Value::Double(x)) => v.push(x),
            (ColumnData::Float(v), Value::Float(x)) => v.push(x),
            (ColumnData::Long64(v), Value::Long64(x)) => v.push(x),
            (ColumnData::ULong64(v), Value::ULong64(x)) => v.push(x),
            (ColumnData::Long(v), Value::Long(x)) => v.push(x),
            (ColumnData::ULong(v), Value::ULong(x)) => v.push(x),
            (ColumnData::Short(v), Value::Short(x)) => v.push(x),
            (ColumnData::UShort(v), Value::UShort(x)) => v.push(x),
            (ColumnData::String(v), Value::String(x)) => v.push(x),
            (ColumnData::Character(v), Value::Character(x)) => v.push(x),
            (_, value) => return Err(value),
        }
        Ok(())
    }

    /// Overwrite element `index`, widening the value to the buffer's type.
    pub fn set(&mut self, index: usize, value: Value) -> std::result::Result<(), Value> {
        if index >= self.len() {
            return Err(value);
        }
        let Some(value) = value.widen_to(self.sdds_type()) else {
            return Err(value);
        };
        match (self, value) {
            (ColumnData::LongDouble(v), Value::LongDouble(x)) => v[index] = x,
            (ColumnData::Double(v), Value::Double(x)) => v[index] = x,
            (ColumnData::Float(v), Value::Float(x)) => v[index] = x,
            (ColumnData::Long64(v), Value::Long64(x)) => v[index] = x,
            (ColumnData::ULong64(v), Value::ULong64(x)) => v[index] = x,
            (ColumnData::Long(v), Value::Long(x)) => v[index] = x,
            (ColumnData::ULong(v), Value::ULong(x)) => v[index] = x,
            (ColumnData::Short(v), Value::Short(x)) => v[index] = x,
            (ColumnData::UShort(v), Value::UShort(x)) => v[index] = x,
            (ColumnData::String(v), Value::String(x)) => v[index] = x,
            (ColumnData::Character(v), Value::Character(x)) => v[index] = x,
            (_, value) => return Err(value),
        }
        Ok(())
    }

    /// Convert the whole buffer to `target` without loss.
    pub fn widen_to(&self, target: SddsType) -> Option<ColumnData> {
        let source = self.sdds_type();
        if source == target {
            return Some(self.clone());
        }
        if !source.widens_to(target) {
            return None;
        }
        let mut out = ColumnData::with_capacity(target, self.len());
        for index in 0..self.len() {
            out.push(self.get(index)?).ok()?;
        }
        Some(out)
    }

    /// Iterate over the elements as [`Value`]s.
    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        (0..self.len()).filter_map(move |index| self.get(index))
    }
}

/// Rust types that map onto one SDDS storage type.
///
/// `f64` reads both `double` and `longdouble` buffers.
pub trait Scalar: Clone + Sized {
    /// Catalog type used when storing this Rust type.
    const SDDS_TYPE: SddsType;

    /// Extract from a value of exactly the matching storage type.
    fn from_value(value: &Value) -> Option<Self>;

    /// Wrap as a [`Value`].
    fn into_value(self) -> Value;

    /// Borrow a buffer of the matching storage type.
    fn slice(data: &ColumnData) -> Option<&[Self]>;

    /// Wrap a vector as a buffer.
    fn into_column(values: Vec<Self>) -> ColumnData;
}

macro_rules! impl_scalar {
    ($ty:ty, $variant:ident) => {
        impl Scalar for $ty {
            const SDDS_TYPE: SddsType = SddsType::$variant;

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(x) => Some(x.clone()),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn slice(data: &ColumnData) -> Option<&[Self]> {
                match data {
                    ColumnData::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn into_column(values: Vec<Self>) -> ColumnData {
                ColumnData::$variant(values)
            }
        }

        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::$variant(value)
            }
        }

        impl From<Vec<$ty>> for ColumnData {
            fn from(values: Vec<$ty>) -> Self {
                ColumnData::$variant(values)
            }
        }
    };
}

impl_scalar!(f32, Float);
impl_scalar!(i64, Long64);
impl_scalar!(u64, ULong64);
impl_scalar!(i32, Long);
impl_scalar!(u32, ULong);
impl_scalar!(i16, Short);
impl_scalar!(u16, UShort);
impl_scalar!(String, String);
impl_scalar!(u8, Character);

impl Scalar for f64 {
    const SDDS_TYPE: SddsType = SddsType::Double;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Double(x) | Value::LongDouble(x) => Some(*x),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Double(self)
    }

    fn slice(data: &ColumnData) -> Option<&[Self]> {
        match data {
            ColumnData::Double(v) | ColumnData::LongDouble(v) => Some(v),
            _ => None,
        }
    }

    fn into_column(values: Vec<Self>) -> ColumnData {
        ColumnData::Double(values)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<Vec<f64>> for ColumnData {
    fn from(values: Vec<f64>) -> Self {
        ColumnData::Double(values)
    }
}
