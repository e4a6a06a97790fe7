use crate::domain::error::{DomainError, DomainResult};
use std::str::FromStr;
use std::time::Duration;

/// When the accumulator hands its window to the sinks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// Flush every K records
    Count(usize),
    /// Flush every T, whether or not records arrived
    Interval(Duration),
}

impl FromStr for FlushTrigger {
    type Err = DomainError;

    /// Parses `count:K` or `interval:T` (T in seconds)
    fn from_str(s: &str) -> DomainResult<Self> {
        let (kind, value) = s.trim().split_once(':').ok_or_else(|| {
            DomainError::ConfigurationError(format!(
                "flush trigger '{}' must look like 'count:K' or 'interval:T'",
                s
            ))
        })?;

        let amount: u64 = value.trim().parse().map_err(|_| {
            DomainError::ConfigurationError(format!(
                "flush trigger amount '{}' is not a positive integer",
                value
            ))
        })?;

        if amount == 0 {
            return Err(DomainError::ConfigurationError(
                "flush trigger amount must be greater than zero".to_string(),
            ));
        }

        match kind.trim().to_ascii_lowercase().as_str() {
            "count" => Ok(FlushTrigger::Count(amount as usize)),
            "interval" => Ok(FlushTrigger::Interval(Duration::from_secs(amount))),
            other => Err(DomainError::ConfigurationError(format!(
                "unknown flush trigger kind '{}'",
                other
            ))),
        }
    }
}

/// Granularity of archive files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchivePeriod {
    /// `<base>/<YYYYMM>.csv`
    Monthly,
    /// `<base>/<YYYY>/<YYYY-MM-DD>.csv`
    Daily,
}

impl FromStr for ArchivePeriod {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" => Ok(ArchivePeriod::Monthly),
            "daily" => Ok(ArchivePeriod::Daily),
            other => Err(DomainError::ConfigurationError(format!(
                "unknown archive period '{}', expected 'monthly' or 'daily'",
                other
            ))),
        }
    }
}
