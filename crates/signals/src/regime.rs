//! Intraday regime classification.
//!
//! Converts a window of bars, a volatility statistic, and calendar proximity
//! into a numeric score plus calm/trend flags, and maps the result to the
//! spread structure the day supports. Pure function of its snapshot; no
//! state is kept across calls.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use zdte_core::{ConfigError, EconEvent, PriceBar, Regime, StructureType};

/// Score contributions. The defaults reproduce the conventional weighting
/// but carry no special derivation; tune freely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeWeights {
    pub breakout: f64,
    pub vwap_strong: f64,
    pub vwap_weak: f64,
    pub direction_agree: f64,
    pub calm: f64,
    pub expansion: f64,
    pub event_penalty: f64,
    pub late_penalty: f64,
}

impl Default for RegimeWeights {
    fn default() -> Self {
        Self {
            breakout: 2.0,
            vwap_strong: 2.0,
            vwap_weak: 1.0,
            direction_agree: 1.0,
            calm: 2.0,
            expansion: 2.0,
            event_penalty: 2.0,
            late_penalty: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeConfig {
    /// Opening-range length from the first session bar, minutes.
    pub opening_range_minutes: i64,
    /// Trailing bars used for VWAP persistence.
    pub vwap_window: usize,
    /// Session range / ATR at or below this is a calm/range day.
    pub calm_range_ratio: f64,
    /// Session range / ATR at or above this is expansion/trend.
    pub expansion_range_ratio: f64,
    /// Range ratio at or above this flags the convex regime.
    pub convex_range_ratio: f64,
    /// Short/medium IV ratio at or above this flags the convex regime.
    pub convex_iv_ratio: f64,
    /// Penalize decisions this close to a scheduled macro event, minutes.
    pub event_block_minutes: i64,
    /// Penalize decisions this close to the session close, minutes.
    pub late_session_minutes: i64,
    /// Minimum score for any structure at all.
    pub min_go_score: f64,
    pub weights: RegimeWeights,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            opening_range_minutes: 15,
            vwap_window: 20,
            calm_range_ratio: 0.8,
            expansion_range_ratio: 1.0,
            convex_range_ratio: 1.4,
            convex_iv_ratio: 1.05,
            event_block_minutes: 60,
            late_session_minutes: 40,
            min_go_score: 2.0,
            weights: RegimeWeights::default(),
        }
    }
}

impl RegimeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.opening_range_minutes <= 0 {
            return Err(ConfigError::NonPositive { field: "regime.opening_range_minutes" });
        }
        if self.vwap_window == 0 {
            return Err(ConfigError::NonPositive { field: "regime.vwap_window" });
        }
        if self.calm_range_ratio > self.expansion_range_ratio
            || self.expansion_range_ratio > self.convex_range_ratio
        {
            return Err(ConfigError::InvertedBounds { field: "regime.range_ratios" });
        }
        Ok(())
    }
}

/// Everything the classifier reads for one decision, resolved by the caller.
#[derive(Debug, Clone)]
pub struct MarketSnapshot<'a> {
    pub ts: DateTime<Utc>,
    /// Today's bars up to and including the current one, ascending.
    pub session_bars: &'a [PriceBar],
    /// Trailing window for VWAP persistence, ascending.
    pub trailing: &'a [PriceBar],
    pub atr: f64,
    pub vwap: Decimal,
    /// Short-dated over medium-dated IV proxy.
    pub iv_ratio: f64,
    pub next_event: Option<&'a EconEvent>,
    pub minutes_to_close: i64,
}

/// Classifier output for one decision point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegimeSignal {
    pub score: f64,
    pub is_calm_range: bool,
    pub bias_up: bool,
    pub bias_down: bool,
    pub regime: Regime,
}

impl RegimeSignal {
    fn no_trade() -> Self {
        Self {
            score: 0.0,
            is_calm_range: false,
            bias_up: false,
            bias_down: false,
            regime: Regime::Calm,
        }
    }
}

pub struct RegimeClassifier {
    config: RegimeConfig,
}

impl RegimeClassifier {
    #[must_use]
    pub fn new(config: RegimeConfig) -> Self {
        Self { config }
    }

    /// Score the current snapshot.
    #[must_use]
    pub fn classify(&self, snap: &MarketSnapshot<'_>) -> RegimeSignal {
        let cfg = &self.config;
        let w = &cfg.weights;
        let Some(last) = snap.session_bars.last() else {
            return RegimeSignal::no_trade();
        };

        let mut score = 0.0;

        // 1. Opening-range breakout.
        let or_end = snap.session_bars[0].ts + Duration::minutes(cfg.opening_range_minutes);
        let mut or_high: Option<Decimal> = None;
        let mut or_low: Option<Decimal> = None;
        for bar in snap.session_bars.iter().take_while(|b| b.ts < or_end) {
            or_high = Some(or_high.map_or(bar.high, |h| h.max(bar.high)));
            or_low = Some(or_low.map_or(bar.low, |l| l.min(bar.low)));
        }
        let past_opening_range = last.ts >= or_end;
        let breakout_up =
            past_opening_range && or_high.is_some_and(|h| last.close > h);
        let breakout_down =
            past_opening_range && or_low.is_some_and(|l| last.close < l);
        if breakout_up || breakout_down {
            score += w.breakout;
        }

        // 2. Fraction of the trailing window closing above VWAP. Only
        // persistence above VWAP scores; the bias flags below handle the
        // downside reading.
        let frac_above = if snap.trailing.is_empty() {
            0.5
        } else {
            let above = snap
                .trailing
                .iter()
                .filter(|b| b.close > snap.vwap)
                .count();
            above as f64 / snap.trailing.len() as f64
        };
        if frac_above >= 0.7 {
            score += w.vwap_strong;
        } else if frac_above >= 0.5 {
            score += w.vwap_weak;
        }
        if (breakout_up && frac_above >= 0.6) || (breakout_down && frac_above <= 0.4) {
            score += w.direction_agree;
        }

        // 3. Session range versus ATR.
        let range_ratio = session_range_ratio(snap.session_bars, snap.atr);
        if let Some(ratio) = range_ratio {
            if ratio <= cfg.calm_range_ratio {
                score += w.calm;
            } else if ratio >= cfg.expansion_range_ratio {
                score += w.expansion;
            }
        }

        // 4. Scheduled macro event inside the block window.
        if let Some(event) = snap.next_event {
            let lead = (event.ts - snap.ts).num_minutes();
            if (0..=cfg.event_block_minutes).contains(&lead) {
                tracing::debug!(kind = %event.kind, lead, "event proximity penalty");
                score -= w.event_penalty;
            }
        }

        // 5. No new risk near the close.
        if snap.minutes_to_close < cfg.late_session_minutes {
            score -= w.late_penalty;
        }

        let is_calm_range = range_ratio.is_some_and(|r| r <= cfg.calm_range_ratio)
            && !breakout_up
            && !breakout_down;
        let bias_up = breakout_up && frac_above >= 0.6;
        let bias_down = breakout_down && (1.0 - frac_above) >= 0.6;

        let regime = if range_ratio.is_some_and(|r| r >= cfg.convex_range_ratio)
            || snap.iv_ratio >= cfg.convex_iv_ratio
        {
            Regime::Convex
        } else if range_ratio.is_some_and(|r| r >= cfg.expansion_range_ratio)
            || breakout_up
            || breakout_down
        {
            Regime::Trend
        } else {
            Regime::Calm
        };

        RegimeSignal {
            score,
            is_calm_range,
            bias_up,
            bias_down,
            regime,
        }
    }

    /// Map a signal to the structure it supports.
    #[must_use]
    pub fn decide_structure(&self, signal: &RegimeSignal) -> StructureType {
        if signal.score < self.config.min_go_score {
            return StructureType::NoGo;
        }
        if signal.is_calm_range {
            StructureType::Condor
        } else if signal.bias_up {
            StructureType::SinglePut
        } else if signal.bias_down {
            StructureType::SingleCall
        } else {
            StructureType::NoGo
        }
    }
}

/// Realized session high-low range over the day's ATR. `None` when ATR is
/// unusable.
fn session_range_ratio(bars: &[PriceBar], atr: f64) -> Option<f64> {
    use rust_decimal::prelude::ToPrimitive;
    if bars.is_empty() || atr <= 0.0 {
        return None;
    }
    let high = bars.iter().map(|b| b.high).max()?;
    let low = bars.iter().map(|b| b.low).min()?;
    let range = (high - low).to_f64()?;
    Some(range / atr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn bar(minute: i64, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> PriceBar {
        let base = Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap();
        PriceBar {
            ts: base + Duration::minutes(minute),
            open,
            high,
            low,
            close,
            volume: dec!(1000),
        }
    }

    /// 20 one-minute bars oscillating inside a one-point band around 100.
    fn calm_bars() -> Vec<PriceBar> {
        (0..20)
            .map(|i| {
                let up = i % 2 == 0;
                let close = if up { dec!(100.3) } else { dec!(99.7) };
                bar(i, dec!(100), dec!(100.5), dec!(99.5), close)
            })
            .collect()
    }

    fn classify(bars: &[PriceBar], atr: f64, event: Option<&EconEvent>, mtc: i64) -> RegimeSignal {
        let classifier = RegimeClassifier::new(RegimeConfig::default());
        let snap = MarketSnapshot {
            ts: bars.last().unwrap().ts,
            session_bars: bars,
            trailing: bars,
            atr,
            vwap: dec!(100),
            iv_ratio: 1.0,
            next_event: event,
            minutes_to_close: mtc,
        };
        classifier.classify(&snap)
    }

    #[test]
    fn calm_range_day_is_flagged() {
        let bars = calm_bars();
        let signal = classify(&bars, 2.0, None, 300);
        assert!(signal.is_calm_range);
        assert!(!signal.bias_up && !signal.bias_down);
        assert_eq!(signal.regime, Regime::Calm);
    }

    #[test]
    fn calm_day_maps_to_condor() {
        let bars = calm_bars();
        let classifier = RegimeClassifier::new(RegimeConfig::default());
        let signal = classify(&bars, 2.0, None, 300);
        assert_eq!(classifier.decide_structure(&signal), StructureType::Condor);
    }

    #[test]
    fn closes_below_vwap_earn_no_persistence_credit() {
        // Every bar finishes under VWAP: only the calm-range term scores.
        let bars: Vec<PriceBar> = (0..20)
            .map(|i| bar(i, dec!(100), dec!(100.5), dec!(99.5), dec!(99.7)))
            .collect();
        let signal = classify(&bars, 2.0, None, 300);
        approx::assert_relative_eq!(signal.score, RegimeWeights::default().calm);
    }

    #[test]
    fn vwap_persistence_thresholds_are_inclusive() {
        // First `above` of 20 bars close over the fixed VWAP of 100.
        let mk = |above: i64| -> Vec<PriceBar> {
            (0..20)
                .map(|i| {
                    let close = if i < above { dec!(100.3) } else { dec!(99.7) };
                    bar(i, dec!(100), dec!(100.5), dec!(99.5), close)
                })
                .collect()
        };
        let strong = classify(&mk(14), 2.0, None, 300); // 0.70
        let weak = classify(&mk(10), 2.0, None, 300); // 0.50
        let none = classify(&mk(9), 2.0, None, 300); // 0.45
        let w = RegimeWeights::default();
        approx::assert_relative_eq!(strong.score - none.score, w.vwap_strong);
        approx::assert_relative_eq!(weak.score - none.score, w.vwap_weak);
    }

    #[test]
    fn opening_range_breakout_sets_up_bias() {
        // 15 minutes of range, then a break above it that holds.
        let mut bars: Vec<PriceBar> = (0..15)
            .map(|i| bar(i, dec!(100), dec!(100.5), dec!(99.5), dec!(100.2)))
            .collect();
        for i in 15..25 {
            bars.push(bar(i, dec!(101), dec!(101.8), dec!(100.9), dec!(101.5)));
        }
        let signal = classify(&bars, 2.0, None, 300);
        assert!(signal.bias_up);
        assert!(!signal.bias_down);
        assert!(!signal.is_calm_range);
        assert!(signal.score > 0.0);
    }

    #[test]
    fn event_proximity_subtracts_exactly_the_penalty() {
        let bars = calm_bars();
        let quiet = classify(&bars, 2.0, None, 300);
        let event = EconEvent {
            ts: bars.last().unwrap().ts + Duration::minutes(30),
            kind: "fomc".to_string(),
        };
        let blocked = classify(&bars, 2.0, Some(&event), 300);
        let penalty = RegimeWeights::default().event_penalty;
        approx::assert_relative_eq!(quiet.score - blocked.score, penalty);
    }

    #[test]
    fn event_outside_block_window_is_ignored() {
        let bars = calm_bars();
        let quiet = classify(&bars, 2.0, None, 300);
        let event = EconEvent {
            ts: bars.last().unwrap().ts + Duration::minutes(90),
            kind: "cpi".to_string(),
        };
        let far = classify(&bars, 2.0, Some(&event), 300);
        approx::assert_relative_eq!(quiet.score, far.score);
    }

    #[test]
    fn late_session_penalty_applies() {
        let bars = calm_bars();
        let early = classify(&bars, 2.0, None, 300);
        let late = classify(&bars, 2.0, None, 20);
        let penalty = RegimeWeights::default().late_penalty;
        approx::assert_relative_eq!(early.score - late.score, penalty);
    }

    #[test]
    fn expansion_day_reads_as_trend() {
        // Wide session range relative to ATR.
        let bars: Vec<PriceBar> = (0..20)
            .map(|i| bar(i, dec!(100), dec!(103), dec!(97), dec!(102)))
            .collect();
        let signal = classify(&bars, 2.0, None, 300);
        assert!(!signal.is_calm_range);
        assert_eq!(signal.regime, Regime::Convex); // 6 / 2 >= 1.4
    }

    #[test]
    fn elevated_iv_ratio_flags_convex() {
        let bars = calm_bars();
        let classifier = RegimeClassifier::new(RegimeConfig::default());
        let snap = MarketSnapshot {
            ts: bars.last().unwrap().ts,
            session_bars: &bars,
            trailing: &bars,
            atr: 2.0,
            vwap: dec!(100),
            iv_ratio: 1.2,
            next_event: None,
            minutes_to_close: 300,
        };
        assert_eq!(classifier.classify(&snap).regime, Regime::Convex);
    }

    #[test]
    fn empty_session_produces_no_trade() {
        let classifier = RegimeClassifier::new(RegimeConfig::default());
        let snap = MarketSnapshot {
            ts: Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap(),
            session_bars: &[],
            trailing: &[],
            atr: 2.0,
            vwap: dec!(100),
            iv_ratio: 1.0,
            next_event: None,
            minutes_to_close: 300,
        };
        let signal = classifier.classify(&snap);
        assert_eq!(classifier.decide_structure(&signal), StructureType::NoGo);
    }
}
