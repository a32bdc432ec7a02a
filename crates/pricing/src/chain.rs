//! Synthetic same-day option chain.
//!
//! Builds a coarse strike grid around spot, prices each strike with the
//! kernel under a fixed equity skew, and synthesizes bid/ask around fair
//! value. Quotes are ephemeral: regenerated every tick, never stored.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use zdte_core::{ConfigError, MarketData, OptionQuote, OptionRight, SessionConfig, VolSource};

use crate::black_scholes;

const MINUTES_PER_YEAR: f64 = 365.0 * 24.0 * 60.0;

/// Chain-generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Strike grid increment in points.
    pub strike_step: Decimal,
    /// Half-width of the moneyness grid (0.10 = strikes out to +/-10%).
    pub span_pct: f64,
    /// Moneyness distance between grid points (0.01 = 1% steps).
    pub step_pct: f64,
    /// Minimum price increment.
    pub tick: Decimal,
    pub risk_free_rate: f64,
    pub carry_yield: f64,
    /// Weight of the short-dated IV proxy in the base vol blend.
    pub short_iv_weight: f64,
    /// IV used when the vol source has no value for the date.
    pub fallback_iv: f64,
    /// Skew slope for puts (IV rises as strike falls below spot).
    pub put_skew: f64,
    /// Skew slope for calls (IV falls as strike rises above spot).
    pub call_skew: f64,
    /// Quoted spread as a fraction of fair value at zero vol, far from close.
    pub base_spread_frac: f64,
    /// Additional spread fraction per unit of implied vol.
    pub vol_spread_coeff: f64,
    /// Additional spread fraction as the session approaches the close.
    pub time_spread_coeff: f64,
    /// Hard cap on the spread as a fraction of fair value.
    pub max_spread_frac: f64,
    /// Floor on minutes to expiry fed to the kernel.
    pub min_minutes_to_expiry: i64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            strike_step: Decimal::ONE,
            span_pct: 0.03,
            step_pct: 0.001,
            tick: dec!(0.01),
            risk_free_rate: 0.04,
            carry_yield: 0.01,
            short_iv_weight: 0.7,
            fallback_iv: 0.18,
            put_skew: 0.9,
            call_skew: 0.5,
            base_spread_frac: 0.04,
            vol_spread_coeff: 0.20,
            time_spread_coeff: 0.12,
            max_spread_frac: 0.30,
            min_minutes_to_expiry: 5,
        }
    }
}

impl ChainConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.strike_step <= Decimal::ZERO {
            return Err(ConfigError::NonPositive { field: "chain.strike_step" });
        }
        if self.tick <= Decimal::ZERO {
            return Err(ConfigError::NonPositive { field: "chain.tick" });
        }
        if self.span_pct <= 0.0 || self.step_pct <= 0.0 {
            return Err(ConfigError::NonPositive { field: "chain.span_pct/step_pct" });
        }
        if self.step_pct > self.span_pct {
            return Err(ConfigError::InvertedBounds { field: "chain.step_pct" });
        }
        if self.fallback_iv <= 0.0 {
            return Err(ConfigError::NonPositive { field: "chain.fallback_iv" });
        }
        if self.max_spread_frac <= 0.0 || self.max_spread_frac > 1.0 {
            return Err(ConfigError::OutOfUnitRange { field: "chain.max_spread_frac" });
        }
        if !(0.0..=1.0).contains(&self.short_iv_weight) {
            return Err(ConfigError::OutOfUnitRange { field: "chain.short_iv_weight" });
        }
        if self.min_minutes_to_expiry <= 0 {
            return Err(ConfigError::NonPositive { field: "chain.min_minutes_to_expiry" });
        }
        Ok(())
    }
}

/// Generates the current-day expiry chain for one timestamp.
pub struct ChainGenerator {
    config: ChainConfig,
}

impl ChainGenerator {
    #[must_use]
    pub fn new(config: ChainConfig) -> Self {
        Self { config }
    }

    /// Build the chain snapshot at `ts`. Empty when no spot is resolvable.
    pub fn snapshot<M: MarketData, V: VolSource>(
        &self,
        ts: DateTime<Utc>,
        market: &M,
        vol: &V,
        session: &SessionConfig,
    ) -> Vec<OptionQuote> {
        let cfg = &self.config;
        let Some(spot) = market.spot(ts) else {
            tracing::debug!(%ts, "no spot price, empty chain");
            return Vec::new();
        };
        let Some(spot_f) = spot.to_f64().filter(|s| *s > 0.0) else {
            return Vec::new();
        };

        let date = ts.date_naive();
        let iv_short = vol.short_iv(date).unwrap_or(cfg.fallback_iv);
        let iv_medium = vol.medium_iv(date).unwrap_or(iv_short);
        let base_iv = cfg.short_iv_weight * iv_short + (1.0 - cfg.short_iv_weight) * iv_medium;

        let minutes_left = session
            .minutes_to_close(ts)
            .max(cfg.min_minutes_to_expiry);
        let t_years = minutes_left as f64 / MINUTES_PER_YEAR;
        let closeness =
            1.0 - (minutes_left as f64 / session.session_minutes() as f64).clamp(0.0, 1.0);

        let mut quotes = Vec::new();
        let steps = (cfg.span_pct / cfg.step_pct).round() as i32;
        let mut last_strike = None;
        for i in -steps..=steps {
            let offset = f64::from(i) * cfg.step_pct;
            let raw = spot_f * (1.0 + offset);
            let strike = snap(raw, cfg.strike_step);
            if strike <= Decimal::ZERO || last_strike == Some(strike) {
                continue;
            }
            last_strike = Some(strike);
            let strike_f = match strike.to_f64() {
                Some(k) if k > 0.0 => k,
                _ => continue,
            };
            let moneyness = strike_f / spot_f - 1.0;

            for right in [OptionRight::Put, OptionRight::Call] {
                let skew = match right {
                    OptionRight::Put => cfg.put_skew,
                    OptionRight::Call => cfg.call_skew,
                };
                // Equity skew: IV falls as strike rises, steeper on the put wing.
                let iv = (base_iv * (1.0 - skew * moneyness)).max(0.01);

                let fair = black_scholes::price(
                    right,
                    spot_f,
                    strike_f,
                    cfg.risk_free_rate,
                    cfg.carry_yield,
                    iv,
                    t_years,
                );
                let delta = black_scholes::delta(
                    right,
                    spot_f,
                    strike_f,
                    cfg.risk_free_rate,
                    cfg.carry_yield,
                    iv,
                    t_years,
                );

                let spread_frac = (cfg.base_spread_frac
                    + cfg.vol_spread_coeff * iv
                    + cfg.time_spread_coeff * closeness)
                    .min(cfg.max_spread_frac);
                let half_spread = fair * spread_frac / 2.0;

                let bid = snap(fair - half_spread, cfg.tick).max(cfg.tick);
                let ask = snap(fair + half_spread, cfg.tick).max(bid + cfg.tick);
                let mid = (bid + ask) / dec!(2);

                quotes.push(OptionQuote {
                    ts,
                    expiry: date,
                    strike,
                    right,
                    bid,
                    ask,
                    mid,
                    delta,
                    iv,
                });
            }
        }
        quotes
    }
}

/// Round to the nearest multiple of `step`.
fn snap(value: f64, step: Decimal) -> Decimal {
    let d = Decimal::from_f64_retain(value).unwrap_or_default();
    (d / step).round() * step
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use zdte_core::PriceBar;

    struct FixedSpot(Option<Decimal>);

    impl MarketData for FixedSpot {
        fn bars(&self, _: chrono::NaiveDate, _: chrono::NaiveDate) -> Vec<PriceBar> {
            Vec::new()
        }
        fn spot(&self, _: DateTime<Utc>) -> Option<Decimal> {
            self.0
        }
        fn atr(&self, _: DateTime<Utc>) -> Option<f64> {
            None
        }
        fn vwap(&self, _: DateTime<Utc>, _: usize) -> Option<Decimal> {
            None
        }
    }

    struct FlatVol;

    impl VolSource for FlatVol {
        fn short_iv(&self, _: chrono::NaiveDate) -> Option<f64> {
            Some(0.20)
        }
        fn medium_iv(&self, _: chrono::NaiveDate) -> Option<f64> {
            Some(0.16)
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, h, m, 0).unwrap()
    }

    fn generate(spot: Option<Decimal>, h: u32, m: u32) -> Vec<OptionQuote> {
        let generator = ChainGenerator::new(ChainConfig::default());
        generator.snapshot(at(h, m), &FixedSpot(spot), &FlatVol, &SessionConfig::default())
    }

    #[test]
    fn quotes_are_ordered_and_floored() {
        let chain = generate(Some(dec!(500)), 10, 30);
        assert!(!chain.is_empty());
        for q in &chain {
            assert!(q.bid >= dec!(0.01), "bid below tick: {q:?}");
            assert!(q.bid <= q.mid && q.mid <= q.ask, "disordered: {q:?}");
        }
    }

    #[test]
    fn empty_chain_without_spot() {
        assert!(generate(None, 10, 30).is_empty());
    }

    #[test]
    fn deltas_have_conventional_signs() {
        let chain = generate(Some(dec!(500)), 10, 30);
        for q in &chain {
            match q.right {
                OptionRight::Call => assert!(q.delta > 0.0 && q.delta < 1.0),
                OptionRight::Put => assert!(q.delta < 0.0 && q.delta > -1.0),
            }
        }
    }

    #[test]
    fn put_wing_carries_higher_iv() {
        let chain = generate(Some(dec!(500)), 10, 30);
        let low_put = chain
            .iter()
            .find(|q| q.right == OptionRight::Put && q.strike == dec!(490))
            .unwrap();
        let atm_put = chain
            .iter()
            .find(|q| q.right == OptionRight::Put && q.strike == dec!(500))
            .unwrap();
        assert!(low_put.iv > atm_put.iv);
    }

    #[test]
    fn spread_widens_toward_the_close() {
        let early = generate(Some(dec!(500)), 10, 0);
        let late = generate(Some(dec!(500)), 15, 30);
        let pick = |chain: &[OptionQuote]| {
            chain
                .iter()
                .find(|q| q.right == OptionRight::Put && q.strike == dec!(500))
                .map(|q| (q.quoted_spread(), q.mid))
                .unwrap()
        };
        let (early_spread, early_mid) = pick(&early);
        let (late_spread, late_mid) = pick(&late);
        // Compare relative spreads; late-session quotes are cheaper but wider.
        assert!(late_spread / late_mid > early_spread / early_mid);
    }
}
