// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! 80-bit x87 extended precision in a 16-byte slot.
//!
//! Little-endian layout: 64-bit mantissa (explicit integer bit), 16-bit
//! sign/exponent, six zero pad bytes. The big-endian layout is the
//! reversal of all 16 bytes.

/// Bytes occupied by one `longdouble`.
pub const SLOT: usize = 16;

const EXP_BIAS: i32 = 16383;
const MANTISSA_SHIFT: i32 = 63;

/// Encode an `f64` exactly, little-endian.
pub fn to_ext80(value: f64) -> [u8; SLOT] {
    let bits = value.to_bits();
    let sign = (bits >> 63) as u16;
    let exp = ((bits >> 52) & 0x7ff) as i32;
    let frac = bits & ((1u64 << 52) - 1);

    let (exponent, mantissa) = match (exp, frac) {
        (0, 0) => (0u16, 0u64),
        (0x7ff, 0) => (0x7fff, 1u64 << 63),
        (0x7ff, _) => (0x7fff, (1u64 << 63) | (frac << 11)),
        (0, _) => {
            // Subnormal: normalise so the integer bit is set.
            let lz = frac.leading_zeros() as i32;
            ((15372 - lz) as u16, frac << lz)
        }
        _ => ((exp - 1023 + EXP_BIAS) as u16, (1u64 << 63) | (frac << 11)),
    };

    let mut out = [0u8; SLOT];
    out[..8].copy_from_slice(&mantissa.to_le_bytes());
    out[8..10].copy_from_slice(&((sign << 15) | exponent).to_le_bytes());
    out
}

/// Decode a little-endian slot, rounding to the nearest `f64`.
pub fn from_ext80(bytes: &[u8; SLOT]) -> f64 {
    let mut mantissa_bytes = [0u8; 8];
    mantissa_bytes.copy_from_slice(&bytes[..8]);
    let mantissa = u64::from_le_bytes(mantissa_bytes);
    let se = u16::from_le_bytes([bytes[8], bytes[9]]);
    let negative = se >> 15 == 1;
    let exponent = i32::from(se & 0x7fff);

    let magnitude = if exponent == 0x7fff {
        if mantissa << 1 == 0 {
            f64::INFINITY
        } else {
            f64::NAN
        }
    } else if mantissa == 0 {
        0.0
    } else {
        scale(mantissa as f64, exponent - EXP_BIAS - MANTISSA_SHIFT)
    };
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

/// `x * 2^exp`, stepping so every intermediate power is a normal `f64`.
fn scale(mut x: f64, mut exp: i32) -> f64 {
    while exp > 1023 {
        x *= f64::from_bits(0x7fe << 52);
        exp -= 1023;
        if x.is_infinite() {
            return x;
        }
    }
    while exp < -1022 {
        x *= f64::from_bits(1 << 52);
        exp += 1022;
        if x == 0.0 {
            return x;
        }
    }
    x * f64::from_bits(((exp + 1023) as u64) << 52)
}

/// Convert between the in-memory little-endian slot and `big` file order.
pub fn reorder(mut slot: [u8; SLOT], big: bool) -> [u8; SLOT] {
    if big {
        slot.reverse();
    }
    slot
}
