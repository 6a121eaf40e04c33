//! Provider configuration
//!
//! Timeouts and polling behaviour for the lifecycle operations, plus the
//! duration syntax used on the command line.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::waiter::PollSchedule;

/// Default create and delete timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Per-operation deadlines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceTimeouts {
    /// Deadline for Create-Wait
    pub create: Duration,
    /// Deadline for Delete-Wait
    pub delete: Duration,
}

impl Default for ResourceTimeouts {
    fn default() -> Self {
        Self {
            create: DEFAULT_TIMEOUT,
            delete: DEFAULT_TIMEOUT,
        }
    }
}

/// Configuration for the DataVolume lifecycle controller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    pub timeouts: ResourceTimeouts,

    /// Interval between refreshes while waiting
    pub poll: PollSchedule,

    /// Consecutive refresh errors tolerated by a wait (0 = abort on first)
    pub max_consecutive_errors: u32,
}

impl ProviderConfig {
    pub fn with_create_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.create = timeout;
        self
    }

    pub fn with_delete_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.delete = timeout;
        self
    }

    pub fn with_poll(mut self, poll: PollSchedule) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_max_consecutive_errors(mut self, max: u32) -> Self {
        self.max_consecutive_errors = max;
        self
    }
}

// =============================================================================
// Duration Parsing
// =============================================================================

/// Parse a Go-style duration string (e.g. "5m", "1h30m", "500ms").
///
/// A trailing bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::DurationParse("empty duration string".to_string()));
    }

    let invalid_number = || Error::DurationParse(format!("invalid number in duration: {}", s));
    let out_of_range = || Error::DurationParse(format!("duration out of range: {}", s));

    let mut total = Duration::ZERO;
    let mut num_buf = String::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            num_buf.push(c);
            continue;
        }

        let num: u64 = num_buf.parse().map_err(|_| invalid_number())?;
        num_buf.clear();

        let unit = match c.to_ascii_lowercase() {
            'm' if chars.peek().map(|n| n.eq_ignore_ascii_case(&'s')) == Some(true) => {
                chars.next();
                Duration::from_millis(1)
            }
            'h' => Duration::from_secs(3600),
            'm' => Duration::from_secs(60),
            's' => Duration::from_secs(1),
            'd' => Duration::from_secs(86400),
            _ => {
                return Err(Error::DurationParse(format!(
                    "unknown duration unit: {}",
                    c
                )))
            }
        };

        let part = u32::try_from(num)
            .ok()
            .and_then(|n| unit.checked_mul(n))
            .ok_or_else(out_of_range)?;
        total = total.checked_add(part).ok_or_else(out_of_range)?;
    }

    if !num_buf.is_empty() {
        let num: u64 = num_buf.parse().map_err(|_| invalid_number())?;
        total = total
            .checked_add(Duration::from_secs(num))
            .ok_or_else(out_of_range)?;
    }

    if total.is_zero() {
        return Err(Error::DurationParse(
            "duration must be greater than 0".to_string(),
        ));
    }

    Ok(total)
}
