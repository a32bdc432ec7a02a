//! Data-source seams the simulator consumes.
//!
//! All blocking I/O lives behind these traits and must be resolved before a
//! tick begins; the core itself is synchronous. "No data" is `None` or an
//! empty vector, never an error.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::types::{EconEvent, PriceBar};

/// Historical bar feed plus the derived statistics the classifier needs.
pub trait MarketData {
    /// Bars over `[start, end]`, ascending by timestamp.
    fn bars(&self, start: NaiveDate, end: NaiveDate) -> Vec<PriceBar>;

    /// Last traded price at or before `ts`, same session day. `None` when
    /// the spot cannot be resolved.
    fn spot(&self, ts: DateTime<Utc>) -> Option<Decimal>;

    /// Average true range ending at `ts`.
    fn atr(&self, ts: DateTime<Utc>) -> Option<f64>;

    /// Volume-weighted average price over the trailing `window` bars.
    fn vwap(&self, ts: DateTime<Utc>, window: usize) -> Option<Decimal>;
}

/// Scheduled macro-event feed.
pub trait EventCalendar {
    fn next_event_after(&self, ts: DateTime<Utc>) -> Option<EconEvent>;
}

/// Daily implied-volatility proxies, annualized, forward-filled by the
/// implementation.
pub trait VolSource {
    fn short_iv(&self, date: NaiveDate) -> Option<f64>;
    fn medium_iv(&self, date: NaiveDate) -> Option<f64>;
}
