//! Duration strings in the orchestrator's `<int><unit>` form.

use crate::{Error, Result};
use std::time::Duration;

/// Parse a `<int><unit>` duration string, unit one of `s`, `m`, `h`, `d`.
pub fn parse_duration(text: &str) -> Result<Duration> {
    if !text.is_ascii() {
        return Err(Error::validation(
            "duration",
            format!("invalid duration '{text}': expected <int><unit>"),
        ));
    }

    let (digits, unit) = text.split_at(text.len().saturating_sub(1));
    let multiplier = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => {
            return Err(Error::validation(
                "duration",
                format!("invalid duration '{text}': unit must be one of s, m, h, d"),
            ));
        }
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::validation(
            "duration",
            format!("invalid duration '{text}': expected <int><unit>"),
        ));
    }

    let value: u64 = digits.parse().map_err(|_| {
        Error::validation("duration", format!("invalid duration '{text}': overflow"))
    })?;
    let secs = value.checked_mul(multiplier).ok_or_else(|| {
        Error::validation("duration", format!("invalid duration '{text}': overflow"))
    })?;

    Ok(Duration::from_secs(secs))
}

/// A step duration: either whole seconds or `<int><unit>` text.
///
/// Numeric input canonicalizes to `<n>s`; text passes through once it parses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SleepDuration {
    Seconds(u64),
    Text(String),
}

impl SleepDuration {
    /// The canonical wire string for this duration
    pub fn canonical(&self) -> Result<String> {
        match self {
            Self::Seconds(secs) => Ok(format!("{secs}s")),
            Self::Text(text) => {
                parse_duration(text)?;
                Ok(text.clone())
            }
        }
    }
}

impl From<u64> for SleepDuration {
    fn from(secs: u64) -> Self {
        Self::Seconds(secs)
    }
}

impl From<u32> for SleepDuration {
    fn from(secs: u32) -> Self {
        Self::Seconds(secs.into())
    }
}

impl From<Duration> for SleepDuration {
    fn from(duration: Duration) -> Self {
        Self::Seconds(duration.as_secs())
    }
}

impl From<&str> for SleepDuration {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for SleepDuration {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}
