// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! printf-style format strings for ASCII output.
//!
//! A format holds literal text around exactly one conversion
//! `%[flags][width][.precision][length]conv`. Length modifiers are
//! accepted and ignored since the value type is known from the schema.

use super::error::{Result, SddsError};
use super::types::SddsType;
use super::value::Value;

/// A parsed printf-style format with a single conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSpec {
    prefix: String,
    suffix: String,
    left_align: bool,
    plus_sign: bool,
    space_sign: bool,
    zero_pad: bool,
    alternate: bool,
    width: Option<usize>,
    precision: Option<usize>,
    conversion: char,
}

impl FormatSpec {
    /// Parse a format string.
    pub fn parse(format: &str) -> Result<Self> {
        let invalid = |reason: &str| SddsError::invalid_attribute(format, "format_string", reason);
        let chars: Vec<char> = format.chars().collect();
        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut spec: Option<FormatSpec> = None;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if c != '%' {
                if spec.is_some() {
                    suffix.push(c);
                } else {
                    prefix.push(c);
                }
                i += 1;
                continue;
            }
            if chars.get(i + 1) == Some(&'%') {
                if spec.is_some() {
                    suffix.push('%');
                } else {
                    prefix.push('%');
                }
                i += 2;
                continue;
            }
            if spec.is_some() {
                return Err(invalid("more than one conversion"));
            }
            i += 1;

            let mut parsed = FormatSpec {
                prefix: String::new(),
                suffix: String::new(),
                left_align: false,
                plus_sign: false,
                space_sign: false,
                zero_pad: false,
                alternate: false,
                width: None,
                precision: None,
                conversion: 'd',
            };
            while let Some(&flag) = chars.get(i) {
                match flag {
                    '-' => parsed.left_align = true,
                    '+' => parsed.plus_sign = true,
                    ' ' => parsed.space_sign = true,
                    '0' => parsed.zero_pad = true,
                    '#' => parsed.alternate = true,
                    _ => break,
                }
                i += 1;
            }
            let (width, next) = read_number(&chars, i);
            parsed.width = width;
            i = next;
            if chars.get(i) == Some(&'.') {
                let (precision, next) = read_number(&chars, i + 1);
                parsed.precision = Some(precision.unwrap_or(0));
                i = next;
            }
            while let Some(&m) = chars.get(i) {
                if matches!(m, 'h' | 'l' | 'L' | 'q' | 'j' | 'z' | 't') {
                    i += 1;
                } else {
                    break;
                }
            }
            match chars.get(i) {
                Some(&conv) if "diuoxXeEfFgGsc".contains(conv) => parsed.conversion = conv,
                Some(_) => return Err(invalid("unsupported conversion")),
                None => return Err(invalid("incomplete conversion")),
            }
            i += 1;
            spec = Some(parsed);
        }

        let mut spec = spec.ok_or_else(|| invalid("no conversion"))?;
        spec.prefix = prefix;
        spec.suffix = suffix;
        Ok(spec)
    }

    /// Parse and check that the conversion suits `ty`.
    pub fn for_type(format: &str, ty: SddsType) -> Result<Self> {
        let spec = Self::parse(format)?;
        spec.check_type(format, ty)?;
        Ok(spec)
    }

    /// The conversion character.
    pub fn conversion(&self) -> char {
        self.conversion
    }

    fn check_type(&self, format: &str, ty: SddsType) -> Result<()> {
        let ok = match self.conversion {
            'd' | 'i' | 'u' | 'o' | 'x' | 'X' => ty.is_integer(),
            'e' | 'E' | 'f' | 'F' | 'g' | 'G' => ty.is_floating(),
            's' => ty == SddsType::String,
            'c' => ty == SddsType::Character,
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(SddsError::invalid_attribute(
                format,
                "format_string",
                format!("conversion '%{}' does not suit type {ty}", self.conversion),
            ))
        }
    }

    /// Render a value.
    pub fn format(&self, value: &Value) -> String {
        let body = match (self.conversion, value) {
            ('s', Value::String(s)) => {
                let s: String = match self.precision {
                    Some(p) => s.chars().take(p).collect(),
                    None => s.clone(),
                };
                self.pad(String::new(), s, false)
            }
            ('c', Value::Character(c)) => self.pad(String::new(), (*c as char).to_string(), false),
            ('e' | 'E' | 'f' | 'F' | 'g' | 'G', _) => {
                let v = value.as_f64().unwrap_or(0.0);
                self.format_float(v)
            }
            (_, Value::String(s)) => self.pad(String::new(), s.clone(), false),
            (_, Value::Character(c)) => self.pad(String::new(), (*c as char).to_string(), false),
            (_, _) => self.format_integer(value),
        };
        format!("{}{}{}", self.prefix, body, self.suffix)
    }

    fn sign_prefix(&self, negative: bool) -> String {
        if negative {
            "-".to_string()
        } else if self.plus_sign {
            "+".to_string()
        } else if self.space_sign {
            " ".to_string()
        } else {
            String::new()
        }
    }

    /// Apply width padding; `numeric` allows zero padding after the sign.
    fn pad(&self, sign: String, digits: String, numeric: bool) -> String {
        let len = sign.chars().count() + digits.chars().count();
        let width = self.width.unwrap_or(0);
        if len >= width {
            return format!("{sign}{digits}");
        }
        let fill = width - len;
        if self.left_align {
            format!("{sign}{digits}{}", " ".repeat(fill))
        } else if self.zero_pad && numeric {
            format!("{sign}{}{digits}", "0".repeat(fill))
        } else {
            format!("{}{sign}{digits}", " ".repeat(fill))
        }
    }

    fn format_integer(&self, value: &Value) -> String {
        let (negative, magnitude): (bool, u128) = match value {
            Value::Long64(v) => (*v < 0, (*v as i128).unsigned_abs()),
            Value::ULong64(v) => (false, *v as u128),
            Value::Long(v) => (*v < 0, (*v as i128).unsigned_abs()),
            Value::ULong(v) => (false, *v as u128),
            Value::Short(v) => (*v < 0, (*v as i128).unsigned_abs()),
            Value::UShort(v) => (false, *v as u128),
            other => {
                let f = other.as_f64().unwrap_or(0.0).trunc();
                (f < 0.0, f.abs() as u128)
            }
        };

        let (negative, mut digits) = match self.conversion {
            'd' | 'i' => (negative, magnitude.to_string()),
            conv => {
                // Negative values print as their two's complement at the type's width.
                let bits = value.sdds_type().integer_bits();
                let raw = if negative {
                    let modulus = 1u128 << bits;
                    modulus - magnitude
                } else {
                    magnitude
                };
                let text = match conv {
                    'o' => format!("{raw:o}"),
                    'x' => format!("{raw:x}"),
                    'X' => format!("{raw:X}"),
                    _ => raw.to_string(),
                };
                (false, text)
            }
        };

        if let Some(p) = self.precision {
            if p == 0 && magnitude == 0 {
                digits.clear();
            } else if digits.len() < p {
                digits = format!("{}{digits}", "0".repeat(p - digits.len()));
            }
        }
        if self.alternate && magnitude != 0 {
            match self.conversion {
                'o' if !digits.starts_with('0') => digits.insert(0, '0'),
                'x' => digits.insert_str(0, "0x"),
                'X' => digits.insert_str(0, "0X"),
                _ => {}
            }
        }

        let sign = if matches!(self.conversion, 'd' | 'i') {
            self.sign_prefix(negative)
        } else {
            String::new()
        };
        // Zero padding is ignored for integers when a precision is given.
        let numeric = self.precision.is_none();
        self.pad(sign, digits, numeric)
    }

    fn format_float(&self, v: f64) -> String {
        let upper = self.conversion.is_ascii_uppercase();
        let negative = v.is_sign_negative() && !v.is_nan();
        let sign = self.sign_prefix(negative);
        let magnitude = v.abs();

        if !magnitude.is_finite() {
            let text = if magnitude.is_nan() { "nan" } else { "inf" };
            let text = if upper {
                text.to_ascii_uppercase()
            } else {
                text.to_string()
            };
            return self.pad(sign, text, false);
        }

        let precision = self.precision.unwrap_or(6);
        let digits = match self.conversion.to_ascii_lowercase() {
            'e' => format_exponential(magnitude, precision, self.alternate),
            'f' => format_fixed(magnitude, precision, self.alternate),
            _ => format_general(magnitude, precision, self.alternate),
        };
        let digits = if upper {
            digits.to_ascii_uppercase()
        } else {
            digits
        };
        self.pad(sign, digits, true)
    }
}

fn read_number(chars: &[char], mut i: usize) -> (Option<usize>, usize) {
    let start = i;
    let mut n = 0usize;
    while let Some(d) = chars.get(i).and_then(|c| c.to_digit(10)) {
        n = n.saturating_mul(10).saturating_add(d as usize);
        i += 1;
    }
    if i == start {
        (None, i)
    } else {
        (Some(n), i)
    }
}

fn format_fixed(v: f64, precision: usize, alternate: bool) -> String {
    let mut s = format!("{v:.precision$}");
    if alternate && precision == 0 {
        s.push('.');
    }
    s
}

/// `%e` with a C-style exponent: explicit sign and at least two digits.
fn format_exponential(v: f64, precision: usize, alternate: bool) -> String {
    let s = format!("{v:.precision$e}");
    let (mantissa, exponent) = s.split_once('e').unwrap_or((&s, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let mut mantissa = mantissa.to_string();
    if alternate && precision == 0 {
        mantissa.push('.');
    }
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exponent.abs())
}

/// `%g`: shortest of `%e`/`%f` per the C rules, trailing zeros removed.
fn format_general(v: f64, precision: usize, alternate: bool) -> String {
    let p = if precision == 0 { 1 } else { precision };
    let scientific = format!("{:.*e}", p - 1, v);
    let exponent: i32 = scientific
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);

    if exponent < -4 || exponent >= p as i32 {
        let s = format_exponential(v, p - 1, alternate);
        if alternate {
            return s;
        }
        match s.split_once('e') {
            Some((mantissa, exp)) => format!("{}e{exp}", trim_fraction(mantissa)),
            None => s,
        }
    } else {
        let decimals = (p as i32 - 1 - exponent).max(0) as usize;
        let s = format_fixed(v, decimals, alternate);
        if alternate {
            s
        } else {
            trim_fraction(&s).to_string()
        }
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
