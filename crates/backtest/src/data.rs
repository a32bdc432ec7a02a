//! In-memory implementations of the data-source traits.
//!
//! These back tests and any consumer that already holds its data in memory.
//! File and database ingestion belong to external collaborators that build
//! these structures.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use zdte_core::{EconEvent, EventCalendar, MarketData, PriceBar, VolSource};

/// Bar playback over a vector, with ATR and VWAP derived on demand.
pub struct VecMarketData {
    bars: Vec<PriceBar>,
    atr_period: usize,
}

impl VecMarketData {
    /// Bars are sorted by timestamp on construction.
    #[must_use]
    pub fn new(mut bars: Vec<PriceBar>, atr_period: usize) -> Self {
        bars.sort_by_key(|b| b.ts);
        Self { bars, atr_period }
    }

    fn up_to(&self, ts: DateTime<Utc>) -> &[PriceBar] {
        let end = self.bars.partition_point(|b| b.ts <= ts);
        &self.bars[..end]
    }
}

impl MarketData for VecMarketData {
    fn bars(&self, start: NaiveDate, end: NaiveDate) -> Vec<PriceBar> {
        self.bars
            .iter()
            .filter(|b| {
                let d = b.ts.date_naive();
                d >= start && d <= end
            })
            .cloned()
            .collect()
    }

    fn spot(&self, ts: DateTime<Utc>) -> Option<Decimal> {
        self.up_to(ts)
            .iter()
            .rev()
            .find(|b| b.ts.date_naive() == ts.date_naive())
            .map(|b| b.close)
    }

    fn atr(&self, ts: DateTime<Utc>) -> Option<f64> {
        let bars = self.up_to(ts);
        if bars.len() < self.atr_period + 1 {
            return None;
        }
        let window = &bars[bars.len() - self.atr_period - 1..];
        let mut sum = Decimal::ZERO;
        for pair in window.windows(2) {
            let prev_close = pair[0].close;
            let bar = &pair[1];
            let tr = (bar.high - bar.low)
                .max((bar.high - prev_close).abs())
                .max((bar.low - prev_close).abs());
            sum += tr;
        }
        (sum / Decimal::from(self.atr_period)).to_f64()
    }

    fn vwap(&self, ts: DateTime<Utc>, window: usize) -> Option<Decimal> {
        let bars = self.up_to(ts);
        if bars.is_empty() || window == 0 {
            return None;
        }
        let tail = &bars[bars.len().saturating_sub(window)..];
        let mut notional = Decimal::ZERO;
        let mut volume = Decimal::ZERO;
        for bar in tail {
            let typical = (bar.high + bar.low + bar.close) / Decimal::from(3);
            notional += typical * bar.volume;
            volume += bar.volume;
        }
        if volume.is_zero() {
            return None;
        }
        Some(notional / volume)
    }
}

/// A fixed event schedule.
pub struct StaticCalendar {
    events: Vec<EconEvent>,
}

impl StaticCalendar {
    #[must_use]
    pub fn new(mut events: Vec<EconEvent>) -> Self {
        events.sort_by_key(|e| e.ts);
        Self { events }
    }

    /// A calendar with nothing scheduled.
    #[must_use]
    pub fn empty() -> Self {
        Self { events: Vec::new() }
    }
}

impl EventCalendar for StaticCalendar {
    fn next_event_after(&self, ts: DateTime<Utc>) -> Option<EconEvent> {
        self.events.iter().find(|e| e.ts > ts).cloned()
    }
}

/// Daily IV proxies with forward-fill: a query returns the nearest value on
/// or before the date.
pub struct DailyVolSeries {
    points: Vec<(NaiveDate, f64, f64)>,
}

impl DailyVolSeries {
    /// `points` are `(date, short_iv, medium_iv)`, sorted on construction.
    #[must_use]
    pub fn new(mut points: Vec<(NaiveDate, f64, f64)>) -> Self {
        points.sort_by_key(|p| p.0);
        Self { points }
    }

    /// The same pair of values for every date.
    #[must_use]
    pub fn flat(short_iv: f64, medium_iv: f64) -> Self {
        Self {
            points: vec![(NaiveDate::MIN, short_iv, medium_iv)],
        }
    }

    fn lookup(&self, date: NaiveDate) -> Option<&(NaiveDate, f64, f64)> {
        self.points.iter().rev().find(|p| p.0 <= date)
    }
}

impl VolSource for DailyVolSeries {
    fn short_iv(&self, date: NaiveDate) -> Option<f64> {
        self.lookup(date).map(|p| p.1)
    }

    fn medium_iv(&self, date: NaiveDate) -> Option<f64> {
        self.lookup(date).map(|p| p.2)
    }
}
