//! Human-readable storage quotas.
//!
//! Quotas are written as a decimal number immediately followed by a binary
//! unit, for example `500MB`, `1.5GB` or `2tb`. The empty string means "no
//! quota" and parses to zero.

use crate::error::QuotaFormatError;

/// Bytes in one mebibyte.
pub const MB: u64 = 1 << 20;
/// Bytes in one gibibyte.
pub const GB: u64 = 1 << 30;
/// Bytes in one tebibyte.
pub const TB: u64 = 1 << 40;

const UNITS: [(&str, u64); 3] = [("MB", MB), ("GB", GB), ("TB", TB)];

/// Parse a quota string into a byte count.
///
/// The result is `mantissa * multiplier` truncated toward zero, computed in
/// floating point so fractional quotas like `1.5GB` keep the same rounding as
/// other deployments reading the same configuration.
pub fn parse_quota(text: &str) -> Result<u64, QuotaFormatError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }

    if !trimmed.is_ascii() || trimmed.len() < 2 {
        return Err(QuotaFormatError::new(text));
    }

    let (mantissa, unit) = trimmed.split_at(trimmed.len() - 2);
    let multiplier = UNITS
        .iter()
        .find(|(name, _)| unit.eq_ignore_ascii_case(name))
        .map(|(_, m)| *m)
        .ok_or_else(|| QuotaFormatError::new(text))?;

    if !is_decimal(mantissa) {
        return Err(QuotaFormatError::new(text));
    }

    let value: f64 = if mantissa.is_empty() || mantissa == "." {
        0.0
    } else {
        mantissa.parse().map_err(|_| QuotaFormatError::new(text))?
    };

    Ok((value * multiplier as f64) as u64)
}

/// Digits with at most one `.`, possibly empty.
fn is_decimal(s: &str) -> bool {
    let mut seen_dot = false;
    for c in s.chars() {
        match c {
            '0'..='9' => {}
            '.' if !seen_dot => seen_dot = true,
            _ => return false,
        }
    }
    true
}

/// Render a byte count for logs and status output.
///
/// Zero renders as `unlimited` since a zero quota means no ceiling.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "unlimited".to_string();
    }

    for (name, multiplier) in UNITS.iter().rev() {
        if bytes >= *multiplier {
            let value = bytes as f64 / *multiplier as f64;
            return if bytes % multiplier == 0 {
                format!("{}{}", bytes / multiplier, name)
            } else {
                format!("{:.2}{}", value, name)
            };
        }
    }

    format!("{}B", bytes)
}
