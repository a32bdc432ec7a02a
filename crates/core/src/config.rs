//! Session bounds and configuration validation.
//!
//! Every component carries its own config struct with named defaults; this
//! module holds the pieces they share and the error type their `validate`
//! methods return. Invalid configuration is fatal at construction time;
//! a run must not start with it.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration rejected at simulation-construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be positive")]
    NonPositive { field: &'static str },
    #[error("{field} bounds are inverted")]
    InvertedBounds { field: &'static str },
    #[error("session close must be after session open")]
    InvertedSession,
    #[error("{field} must be within [0, 1]")]
    OutOfUnitRange { field: &'static str },
}

/// Trading session bounds, exchange-local clock.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionConfig {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            close: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
        }
    }
}

impl SessionConfig {
    /// Whether a timestamp falls inside the session.
    #[must_use]
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        let t = ts.time();
        t >= self.open && t < self.close
    }

    /// Whole minutes from `ts` to the close. Negative after the close.
    #[must_use]
    pub fn minutes_to_close(&self, ts: DateTime<Utc>) -> i64 {
        (self.close - ts.time()).num_minutes()
    }

    /// Whole minutes from the open to `ts`. Negative before the open.
    #[must_use]
    pub fn minutes_since_open(&self, ts: DateTime<Utc>) -> i64 {
        (ts.time() - self.open).num_minutes()
    }

    /// Session length in minutes.
    #[must_use]
    pub fn session_minutes(&self) -> i64 {
        (self.close - self.open).num_minutes()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.close <= self.open {
            return Err(ConfigError::InvertedSession);
        }
        Ok(())
    }
}
