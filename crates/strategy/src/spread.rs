//! Spread construction: regime decision + chain snapshot -> validated order.
//!
//! Refusal is the common case and is not an error: any guard failing simply
//! yields `None` and the orchestrator moves on to the next tick.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use zdte_core::{
    ConfigError, OptionQuote, OptionRight, SpreadLeg, SpreadOrder, StructureType,
    CONTRACT_MULTIPLIER,
};

/// Inclusive band on the short leg's absolute delta.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeltaBand {
    pub lo: f64,
    pub hi: f64,
}

impl DeltaBand {
    fn contains(&self, delta_abs: f64) -> bool {
        (self.lo..=self.hi).contains(&delta_abs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadConfig {
    /// Distance between short and protective strikes, points.
    pub width_points: Decimal,
    pub delta_band_single: DeltaBand,
    pub delta_band_condor: DeltaBand,
    /// Minimum credit per point of width for a one-sided vertical.
    pub min_credit_per_width_single: Decimal,
    /// Minimum combined credit per point of width for a condor.
    pub min_credit_per_width_condor: Decimal,
    /// Maximum short-leg quoted spread as a fraction of collected credit.
    pub max_short_spread_frac: f64,
}

impl Default for SpreadConfig {
    fn default() -> Self {
        Self {
            width_points: Decimal::ONE,
            delta_band_single: DeltaBand { lo: 0.15, hi: 0.30 },
            delta_band_condor: DeltaBand { lo: 0.15, hi: 0.35 },
            min_credit_per_width_single: dec!(0.10),
            min_credit_per_width_condor: dec!(0.20),
            max_short_spread_frac: 0.35,
        }
    }
}

impl SpreadConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width_points <= Decimal::ZERO {
            return Err(ConfigError::NonPositive { field: "spread.width_points" });
        }
        for (field, band) in [
            ("spread.delta_band_single", self.delta_band_single),
            ("spread.delta_band_condor", self.delta_band_condor),
        ] {
            if band.lo <= 0.0 || band.hi >= 1.0 || band.lo >= band.hi {
                return Err(ConfigError::InvertedBounds { field });
            }
        }
        if self.min_credit_per_width_single <= Decimal::ZERO
            || self.min_credit_per_width_condor <= Decimal::ZERO
        {
            return Err(ConfigError::NonPositive { field: "spread.min_credit_per_width" });
        }
        if self.max_short_spread_frac <= 0.0 || self.max_short_spread_frac > 1.0 {
            return Err(ConfigError::OutOfUnitRange { field: "spread.max_short_spread_frac" });
        }
        Ok(())
    }
}

/// A validated candidate ready for the GoScore gate.
///
/// Singles carry one order; a condor carries one per side, both tagged
/// [`StructureType::Condor`]. The combined statistics here are what the
/// guards were applied to and what GoScore consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub structure: StructureType,
    pub orders: Vec<SpreadOrder>,
    pub net_credit: Decimal,
    pub width: Decimal,
    pub credit_per_width: Decimal,
    /// Credit implied by quote mids, for edge measurement.
    pub mid_credit: Decimal,
    /// Largest short-leg |delta| across sides.
    pub short_delta: f64,
    /// Combined short-leg quoted spread over net credit.
    pub spread_over_credit: f64,
}

impl Candidate {
    /// Worst-case loss for one contract, dollars. A condor can only lose on
    /// one side, so the combined credit offsets a single width.
    #[must_use]
    pub fn max_loss_per_contract(&self) -> Decimal {
        (self.width - self.net_credit) * CONTRACT_MULTIPLIER
    }
}

struct Vertical {
    short: OptionQuote,
    long: OptionQuote,
    credit: Decimal,
}

pub struct SpreadConstructor {
    config: SpreadConfig,
}

impl SpreadConstructor {
    #[must_use]
    pub fn new(config: SpreadConfig) -> Self {
        Self { config }
    }

    /// Build the structure the regime decision calls for, or refuse.
    #[must_use]
    pub fn build(
        &self,
        decision: StructureType,
        chain: &[OptionQuote],
        underlying: &str,
        ts: DateTime<Utc>,
    ) -> Option<Candidate> {
        match decision {
            StructureType::NoGo => None,
            StructureType::SinglePut => {
                self.build_single(OptionRight::Put, chain, underlying, ts)
            }
            StructureType::SingleCall => {
                self.build_single(OptionRight::Call, chain, underlying, ts)
            }
            StructureType::Condor => self.build_condor(chain, underlying, ts),
        }
    }

    fn build_single(
        &self,
        right: OptionRight,
        chain: &[OptionQuote],
        underlying: &str,
        ts: DateTime<Utc>,
    ) -> Option<Candidate> {
        let cfg = &self.config;
        let v = self.select_vertical(chain, right, cfg.delta_band_single)?;
        let width = cfg.width_points;
        let credit_per_width = v.credit / width;
        if credit_per_width < cfg.min_credit_per_width_single {
            tracing::debug!(%credit_per_width, "single refused: credit per width below floor");
            return None;
        }
        if !self.liquid_enough(v.short.quoted_spread(), v.credit) {
            return None;
        }

        let structure = match right {
            OptionRight::Put => StructureType::SinglePut,
            OptionRight::Call => StructureType::SingleCall,
        };
        let mid_credit = v.short.mid - v.long.mid;
        let short_delta = v.short.delta.abs();
        let spread_over_credit = frac(v.short.quoted_spread(), v.credit);
        let order = make_order(&v, structure, underlying, ts, width, credit_per_width);
        Some(Candidate {
            structure,
            orders: vec![order],
            net_credit: v.credit,
            width,
            credit_per_width,
            mid_credit,
            short_delta,
            spread_over_credit,
        })
    }

    fn build_condor(
        &self,
        chain: &[OptionQuote],
        underlying: &str,
        ts: DateTime<Utc>,
    ) -> Option<Candidate> {
        let cfg = &self.config;
        let put = self.select_vertical(chain, OptionRight::Put, cfg.delta_band_condor)?;
        let call = self.select_vertical(chain, OptionRight::Call, cfg.delta_band_condor)?;

        let width = cfg.width_points;
        let net_credit = put.credit + call.credit;
        let credit_per_width = net_credit / width;
        if credit_per_width < cfg.min_credit_per_width_condor {
            tracing::debug!(%credit_per_width, "condor refused: credit per width below floor");
            return None;
        }
        let combined_spread = put.short.quoted_spread() + call.short.quoted_spread();
        if !self.liquid_enough(combined_spread, net_credit) {
            return None;
        }

        let mid_credit = (put.short.mid - put.long.mid) + (call.short.mid - call.long.mid);
        let short_delta = put.short.delta.abs().max(call.short.delta.abs());
        let spread_over_credit = frac(combined_spread, net_credit);
        let orders = vec![
            make_order(&put, StructureType::Condor, underlying, ts, width, credit_per_width),
            make_order(&call, StructureType::Condor, underlying, ts, width, credit_per_width),
        ];
        Some(Candidate {
            structure: StructureType::Condor,
            orders,
            net_credit,
            width,
            credit_per_width,
            mid_credit,
            short_delta,
            spread_over_credit,
        })
    }

    /// Pick the short strike inside the delta band, then attach the wing one
    /// width further out. Among qualifying quotes the one with |delta|
    /// closest to the band's lower edge wins (furthest out of the money);
    /// strike breaks ties deterministically.
    fn select_vertical(
        &self,
        chain: &[OptionQuote],
        right: OptionRight,
        band: DeltaBand,
    ) -> Option<Vertical> {
        let short = chain
            .iter()
            .filter(|q| q.right == right && band.contains(q.delta.abs()))
            .min_by(|a, b| {
                a.delta
                    .abs()
                    .total_cmp(&b.delta.abs())
                    .then_with(|| further_otm(right, a.strike, b.strike))
            })?
            .clone();

        let wing_strike = match right {
            OptionRight::Put => short.strike - self.config.width_points,
            OptionRight::Call => short.strike + self.config.width_points,
        };
        let long = chain
            .iter()
            .find(|q| q.right == right && q.strike == wing_strike)?
            .clone();

        // Conservative fill basis: sell the bid, buy the ask.
        let credit = short.bid - long.ask;
        if credit <= Decimal::ZERO {
            return None;
        }
        Some(Vertical { short, long, credit })
    }

    fn liquid_enough(&self, quoted_spread: Decimal, credit: Decimal) -> bool {
        let ratio = frac(quoted_spread, credit);
        if ratio > self.config.max_short_spread_frac {
            tracing::debug!(ratio, "refused: short leg too illiquid for the credit");
            return false;
        }
        true
    }
}

fn further_otm(right: OptionRight, a: Decimal, b: Decimal) -> std::cmp::Ordering {
    match right {
        OptionRight::Put => a.cmp(&b),
        OptionRight::Call => b.cmp(&a),
    }
}

fn frac(numerator: Decimal, denominator: Decimal) -> f64 {
    if denominator <= Decimal::ZERO {
        return f64::INFINITY;
    }
    (numerator / denominator).to_f64().unwrap_or(f64::INFINITY)
}

fn make_order(
    v: &Vertical,
    structure: StructureType,
    underlying: &str,
    ts: DateTime<Utc>,
    width: Decimal,
    credit_per_width: Decimal,
) -> SpreadOrder {
    SpreadOrder {
        ts,
        underlying: underlying.to_string(),
        credit: v.credit,
        width,
        credit_per_width,
        structure,
        short_leg: SpreadLeg {
            expiry: v.short.expiry,
            strike: v.short.strike,
            right: v.short.right,
            qty: -1,
        },
        long_leg: SpreadLeg {
            expiry: v.long.expiry,
            strike: v.long.strike,
            right: v.long.right,
            qty: 1,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap()
    }

    fn quote(strike: Decimal, right: OptionRight, bid: Decimal, ask: Decimal, delta: f64) -> OptionQuote {
        OptionQuote {
            ts: ts(),
            expiry: ts().date_naive(),
            strike,
            right,
            bid,
            ask,
            mid: (bid + ask) / dec!(2),
            delta,
            iv: 0.2,
        }
    }

    /// Penny-priced chain with qualifying short strikes on both wings.
    fn healthy_chain() -> Vec<OptionQuote> {
        vec![
            quote(dec!(495), OptionRight::Put, dec!(0.04), dec!(0.06), -0.05),
            quote(dec!(496), OptionRight::Put, dec!(0.08), dec!(0.10), -0.07),
            quote(dec!(497), OptionRight::Put, dec!(0.13), dec!(0.15), -0.11),
            quote(dec!(498), OptionRight::Put, dec!(0.27), dec!(0.29), -0.21),
            quote(dec!(499), OptionRight::Put, dec!(0.55), dec!(0.58), -0.28),
            quote(dec!(501), OptionRight::Call, dec!(0.55), dec!(0.58), 0.28),
            quote(dec!(502), OptionRight::Call, dec!(0.27), dec!(0.29), 0.21),
            quote(dec!(503), OptionRight::Call, dec!(0.13), dec!(0.15), 0.11),
            quote(dec!(504), OptionRight::Call, dec!(0.08), dec!(0.10), 0.07),
            quote(dec!(505), OptionRight::Call, dec!(0.04), dec!(0.06), 0.05),
        ]
    }

    fn constructor() -> SpreadConstructor {
        SpreadConstructor::new(SpreadConfig::default())
    }

    #[test]
    fn builds_single_put_vertical() {
        let candidate = constructor()
            .build(StructureType::SinglePut, &healthy_chain(), "XSP", ts())
            .expect("should build");
        assert_eq!(candidate.structure, StructureType::SinglePut);
        assert_eq!(candidate.orders.len(), 1);
        let order = &candidate.orders[0];
        // 21-delta strike is closest to the 0.15 band edge.
        assert_eq!(order.short_leg.strike, dec!(498));
        assert_eq!(order.long_leg.strike, dec!(497));
        assert_eq!(order.short_leg.qty, -1);
        assert_eq!(order.long_leg.qty, 1);
        // credit = short bid - long ask = 0.27 - 0.15
        assert_eq!(candidate.net_credit, dec!(0.12));
        assert_eq!(candidate.credit_per_width, dec!(0.12));
    }

    #[test]
    fn short_strike_prefers_band_lower_edge() {
        // Both 0.21 and 0.28 qualify; the lower |delta| must win.
        let candidate = constructor()
            .build(StructureType::SinglePut, &healthy_chain(), "XSP", ts())
            .unwrap();
        approx::assert_relative_eq!(candidate.short_delta, 0.21);
    }

    #[test]
    fn condor_combines_both_sides() {
        let candidate = constructor()
            .build(StructureType::Condor, &healthy_chain(), "XSP", ts())
            .expect("should build");
        assert_eq!(candidate.orders.len(), 2);
        assert!(candidate
            .orders
            .iter()
            .all(|o| o.structure == StructureType::Condor));
        // 0.12 credit on each side.
        assert_eq!(candidate.net_credit, dec!(0.24));
        assert_eq!(candidate.credit_per_width, dec!(0.24));
    }

    #[test]
    fn refuses_on_thin_liquidity() {
        let mut chain = healthy_chain();
        // Blow out the short put's quote: spread 0.18 against 0.12 credit.
        chain[3].ask = dec!(0.45);
        let candidate = constructor().build(StructureType::SinglePut, &chain, "XSP", ts());
        assert!(candidate.is_none());
    }

    #[test]
    fn condor_refused_when_short_strikes_trade_wide() {
        let mut chain = healthy_chain();
        chain[3].ask = dec!(0.45); // put short leg spread 0.18
        chain[6].ask = dec!(0.45); // call short leg spread 0.18
        let candidate = constructor().build(StructureType::Condor, &chain, "XSP", ts());
        assert!(candidate.is_none());
    }

    #[test]
    fn refuses_when_credit_per_width_below_floor() {
        let mut config = SpreadConfig::default();
        config.min_credit_per_width_single = dec!(0.50);
        let candidate = SpreadConstructor::new(config).build(
            StructureType::SinglePut,
            &healthy_chain(),
            "XSP",
            ts(),
        );
        assert!(candidate.is_none());
    }

    #[test]
    fn refuses_without_protective_wing() {
        let chain: Vec<OptionQuote> = healthy_chain()
            .into_iter()
            .filter(|q| q.strike != dec!(497))
            .collect();
        let candidate = constructor().build(StructureType::SinglePut, &chain, "XSP", ts());
        assert!(candidate.is_none());
    }

    #[test]
    fn no_go_builds_nothing() {
        assert!(constructor()
            .build(StructureType::NoGo, &healthy_chain(), "XSP", ts())
            .is_none());
    }

    #[test]
    fn max_loss_reflects_width_minus_credit() {
        let candidate = constructor()
            .build(StructureType::SinglePut, &healthy_chain(), "XSP", ts())
            .unwrap();
        assert_eq!(candidate.max_loss_per_contract(), dec!(88.00));
    }

    #[test]
    fn inverted_delta_band_rejected() {
        let mut config = SpreadConfig::default();
        config.delta_band_single = DeltaBand { lo: 0.2, hi: 0.1 };
        assert!(config.validate().is_err());
    }
}
