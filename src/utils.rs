//! Utility functions.

use anyhow::{anyhow, Context, Result};

/// Returns true if `value` is an exact multiple of `align`.
///
/// Power-of-two alignments are tested with a mask; anything else falls back to a modulus.
/// An `align` of zero never constrains anything.
pub fn is_aligned(value: u64, align: u64) -> bool {
    if align == 0 {
        return true;
    }
    if align.is_power_of_two() {
        value & (align - 1) == 0
    } else {
        value % align == 0
    }
}

/// Parses an unsigned integer written either in decimal or as `0x`-prefixed hexadecimal.
pub fn parse_u64(text: &str) -> Result<u64> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        if hex.is_empty() {
            return Err(anyhow!("empty hexadecimal literal: {:?}", text));
        }
        u64::from_str_radix(hex, 16)
            .with_context(|| format!("invalid hexadecimal value {:?}", text))
    } else {
        text.parse::<u64>()
            .with_context(|| format!("invalid decimal value {:?}", text))
    }
}
