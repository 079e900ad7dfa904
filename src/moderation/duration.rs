//! Timeout duration parsing

use thiserror::Error;

/// Longest timeout the platform accepts (28 days)
pub const MAX_TIMEOUT_MINUTES: u32 = 28 * 24 * 60;

/// Errors from [`parse_duration`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    #[error("Use format: 1m, 1h, 1d")]
    InvalidFormat,

    #[error("Duration must be greater than zero")]
    Zero,

    #[error("Duration exceeds maximum of 28 days")]
    TooLong,
}

/// Parse `"<n>m"`, `"<n>h"` or `"<n>d"` into minutes
pub fn parse_duration(input: &str) -> Result<u32, DurationError> {
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    let (number, multiplier) = match cleaned.chars().last() {
        Some('m') => (&cleaned[..cleaned.len() - 1], 1u64),
        Some('h') => (&cleaned[..cleaned.len() - 1], 60),
        Some('d') => (&cleaned[..cleaned.len() - 1], 1440),
        _ => return Err(DurationError::InvalidFormat),
    };

    let value: u64 = number.parse().map_err(|_| DurationError::InvalidFormat)?;
    let minutes = value.checked_mul(multiplier).ok_or(DurationError::TooLong)?;

    if minutes == 0 {
        return Err(DurationError::Zero);
    }
    if minutes > u64::from(MAX_TIMEOUT_MINUTES) {
        return Err(DurationError::TooLong);
    }

    Ok(minutes as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_duration("10m"), Ok(10));
        assert_eq!(parse_duration("2h"), Ok(120));
        assert_eq!(parse_duration("1d"), Ok(1440));
        assert_eq!(parse_duration(" 3 H "), Ok(180));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_duration("10"), Err(DurationError::InvalidFormat));
        assert_eq!(parse_duration("xm"), Err(DurationError::InvalidFormat));
        assert_eq!(parse_duration(""), Err(DurationError::InvalidFormat));
        assert_eq!(parse_duration("-5m"), Err(DurationError::InvalidFormat));
    }

    #[test]
    fn test_parse_bounds() {
        assert_eq!(parse_duration("0m"), Err(DurationError::Zero));
        assert_eq!(parse_duration("28d"), Ok(MAX_TIMEOUT_MINUTES));
        assert_eq!(parse_duration("29d"), Err(DurationError::TooLong));
        assert_eq!(
            parse_duration("99999999999999999d"),
            Err(DurationError::TooLong)
        );
    }
}
