//! Binary-coded decimal helpers.
//!
//! Every timekeeping and alarm register on the MCP7940 stores its value as two
//! packed decimal digits: tens in the high nibble, ones in the low nibble.

use crate::datetime::DateTimeError;

/// Largest value two BCD digits can hold.
pub const BCD_MAX: u8 = 99;

/// Decodes a packed BCD byte into its integer value.
///
/// Callers mask off any flag bits sharing the register before decoding.
#[must_use]
pub const fn bcd_to_int(bcd: u8) -> u8 {
    (bcd >> 4) * 10 + (bcd & 0x0F)
}

/// Encodes an integer in `0..=99` as a packed BCD byte.
///
/// # Errors
///
/// Returns [`DateTimeError::OutOfRange`] for values above 99 instead of
/// producing a wrapped byte.
pub const fn int_to_bcd(value: u8) -> Result<u8, DateTimeError> {
    if value > BCD_MAX {
        return Err(DateTimeError::OutOfRange(value));
    }
    Ok(((value / 10) << 4) | (value % 10))
}

/// Splits a value into `(ones, tens)` digits after checking it against `max_value`.
pub(crate) fn make_bcd(value: u32, max_value: u32) -> Result<(u8, u8), DateTimeError> {
    let byte = u8::try_from(value).map_err(|_| DateTimeError::OutOfRange(u8::MAX))?;
    if value > max_value {
        return Err(DateTimeError::OutOfRange(byte));
    }
    let bcd = int_to_bcd(byte)?;
    Ok((bcd & 0x0F, bcd >> 4))
}
