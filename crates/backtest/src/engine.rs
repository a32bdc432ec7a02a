//! The simulation loop.
//!
//! One pass per session day: every bar regenerates the synthetic chain,
//! marks and possibly exits open positions, and on the decision cadence
//! runs the full pipeline (classify, construct, risk check, score) to
//! decide whether new risk goes on. Anything still open at the last bar
//! settles at intrinsic value. The loop is a pure function of its inputs,
//! so two runs over the same data produce identical reports.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use zdte_core::{
    ConfigError, EventCalendar, ExitReason, GoInputs, MarketData, OpenPosition, OptionQuote,
    OptionRight, PriceBar, SessionConfig, SpreadOrder, StructureType, TradeResult, VolSource,
    CONTRACT_MULTIPLIER,
};
use zdte_pricing::{ChainConfig, ChainGenerator};
use zdte_signals::{MarketSnapshot, RegimeClassifier, RegimeConfig, RegimeSignal};
use zdte_strategy::{
    Candidate, GoBreakdown, GoDecision, GoPolicy, GoScorer, RiskConfig, RiskManager,
    SpreadConfig, SpreadConstructor,
};

use crate::execution::{ExecConfig, ExecutionSimulator, FeeConfig};
use crate::metrics::PerformanceSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub underlying: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub session: SessionConfig,
    /// Minutes between entry decisions.
    pub decision_cadence_minutes: i64,
    /// Contracts at full size. Half size is half of this, floored at one.
    pub contracts: u32,
    pub chain: ChainConfig,
    pub regime: RegimeConfig,
    pub spread: SpreadConfig,
    pub go: GoPolicy,
    pub risk: RiskConfig,
    pub execution: ExecConfig,
    pub fees: FeeConfig,
}

impl SimConfig {
    #[must_use]
    pub fn new(underlying: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            underlying: underlying.into(),
            start,
            end,
            session: SessionConfig::default(),
            decision_cadence_minutes: 15,
            contracts: 1,
            chain: ChainConfig::default(),
            regime: RegimeConfig::default(),
            spread: SpreadConfig::default(),
            go: GoPolicy::default(),
            risk: RiskConfig::default(),
            execution: ExecConfig::default(),
            fees: FeeConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.end < self.start {
            return Err(ConfigError::InvertedBounds { field: "sim.date_range" });
        }
        if self.decision_cadence_minutes <= 0 {
            return Err(ConfigError::NonPositive { field: "sim.decision_cadence_minutes" });
        }
        if self.contracts == 0 {
            return Err(ConfigError::NonPositive { field: "sim.contracts" });
        }
        self.session.validate()?;
        self.chain.validate()?;
        self.regime.validate()?;
        self.spread.validate()?;
        self.go.validate()?;
        self.risk.validate()?;
        self.execution.validate()?;
        self.fees.validate()?;
        Ok(())
    }
}

/// Audit record of one scored entry decision.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
    pub ts: DateTime<Utc>,
    pub structure: StructureType,
    pub breakdown: GoBreakdown,
    pub opened: bool,
}

/// Everything a run produces.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub trades: Vec<TradeResult>,
    pub decisions: Vec<DecisionRecord>,
    pub summary: PerformanceSummary,
}

impl RunReport {
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct Simulator<M, C, V> {
    config: SimConfig,
    market: M,
    calendar: C,
    vol: V,
}

impl<M: MarketData, C: EventCalendar, V: VolSource> Simulator<M, C, V> {
    /// Invalid configuration is fatal here, before any data is touched.
    pub fn new(config: SimConfig, market: M, calendar: C, vol: V) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, market, calendar, vol })
    }

    pub fn run(&self) -> RunReport {
        let cfg = &self.config;
        let chain_gen = ChainGenerator::new(cfg.chain.clone());
        let classifier = RegimeClassifier::new(cfg.regime.clone());
        let constructor = SpreadConstructor::new(cfg.spread.clone());
        let scorer = GoScorer::new(cfg.go.clone());
        let exec = ExecutionSimulator::new(cfg.execution.clone());

        let mut days: BTreeMap<NaiveDate, Vec<PriceBar>> = BTreeMap::new();
        for bar in self.market.bars(cfg.start, cfg.end) {
            if cfg.session.contains(bar.ts) {
                days.entry(bar.ts.date_naive()).or_default().push(bar);
            }
        }

        let mut trades = Vec::new();
        let mut decisions = Vec::new();

        for (date, bars) in &days {
            tracing::debug!(%date, bars = bars.len(), "session start");
            let mut risk = RiskManager::new(cfg.risk.clone());
            let mut open: Vec<OpenPosition> = Vec::new();

            for (i, bar) in bars.iter().enumerate() {
                let ts = bar.ts;
                let chain = chain_gen.snapshot(ts, &self.market, &self.vol, &cfg.session);

                self.mark_and_exit(&mut open, &chain, ts, &exec, &mut risk, &mut trades);

                let since_open = cfg.session.minutes_since_open(ts);
                if since_open < 0 || since_open % cfg.decision_cadence_minutes != 0 {
                    continue;
                }
                self.decide(
                    &bars[..=i],
                    bar,
                    &chain,
                    &classifier,
                    &constructor,
                    &scorer,
                    &exec,
                    &mut risk,
                    &mut open,
                    &mut decisions,
                );
            }

            if let Some(last) = bars.last() {
                self.settle(&mut open, last, &mut risk, &mut trades);
            }
        }

        let summary = PerformanceSummary::from_trades(&trades);
        tracing::info!(
            trades = summary.num_trades,
            net_pnl = %summary.net_pnl,
            "run complete"
        );
        RunReport { trades, decisions, summary }
    }

    /// Update excursions and close anything whose stop conditions hold.
    fn mark_and_exit(
        &self,
        open: &mut Vec<OpenPosition>,
        chain: &[OptionQuote],
        ts: DateTime<Utc>,
        exec: &ExecutionSimulator,
        risk: &mut RiskManager,
        trades: &mut Vec<TradeResult>,
    ) {
        let fees = &self.config.fees;
        let mut i = 0;
        while i < open.len() {
            // Quotes can be missing when spot drifted the grid; skip the mark.
            let Some((value, short_delta)) = spread_mark(chain, &open[i].order) else {
                i += 1;
                continue;
            };
            open[i].record_mark(value);
            if let Some(exit) = exec.check_exit(&open[i], value, short_delta) {
                let mut position = open.swap_remove(i);
                let contracts = Decimal::from(position.contracts);
                let round_trip = fees.per_leg() * Decimal::from(2) * contracts * Decimal::from(2);
                position.close(exit.price, ts, exit.reason);
                let trade = finish(&position, round_trip);
                tracing::info!(
                    reason = %exit.reason,
                    pnl = %trade.pnl,
                    "position closed"
                );
                risk.register_close(position.order.side(), trade.pnl);
                trades.push(trade);
            } else {
                i += 1;
            }
        }
    }

    /// Expire everything still open at the last bar. Cash settlement pays
    /// intrinsic value; no exit slippage and no closing fees apply.
    fn settle(
        &self,
        open: &mut Vec<OpenPosition>,
        last: &PriceBar,
        risk: &mut RiskManager,
        trades: &mut Vec<TradeResult>,
    ) {
        let fees = &self.config.fees;
        for mut position in open.drain(..) {
            let value = intrinsic(&position.order, last.close);
            position.record_mark(value);
            position.close(value, last.ts, ExitReason::Settlement);
            let contracts = Decimal::from(position.contracts);
            let entry_only = fees.per_leg() * Decimal::from(2) * contracts;
            let trade = finish(&position, entry_only);
            tracing::info!(pnl = %trade.pnl, "settled at expiry");
            risk.register_close(position.order.side(), trade.pnl);
            trades.push(trade);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn decide(
        &self,
        session_bars: &[PriceBar],
        bar: &PriceBar,
        chain: &[OptionQuote],
        classifier: &RegimeClassifier,
        constructor: &SpreadConstructor,
        scorer: &GoScorer,
        exec: &ExecutionSimulator,
        risk: &mut RiskManager,
        open: &mut Vec<OpenPosition>,
        decisions: &mut Vec<DecisionRecord>,
    ) {
        let cfg = &self.config;
        let ts = bar.ts;
        let (Some(atr), Some(vwap)) = (
            self.market.atr(ts),
            self.market.vwap(ts, cfg.regime.vwap_window),
        ) else {
            tracing::debug!(%ts, "statistics unavailable, skipping decision");
            return;
        };
        let trailing_start = session_bars.len().saturating_sub(cfg.regime.vwap_window);
        let next_event = self.calendar.next_event_after(ts);
        let snap = MarketSnapshot {
            ts,
            session_bars,
            trailing: &session_bars[trailing_start..],
            atr,
            vwap,
            iv_ratio: self.iv_ratio(ts.date_naive()),
            next_event: next_event.as_ref(),
            minutes_to_close: cfg.session.minutes_to_close(ts),
        };
        let signal = classifier.classify(&snap);
        let structure = classifier.decide_structure(&signal);
        if structure == StructureType::NoGo {
            return;
        }
        let Some(candidate) = constructor.build(structure, chain, &cfg.underlying, ts) else {
            return;
        };
        if !risk.can_add(structure, candidate.max_loss_per_contract(), snap.minutes_to_close) {
            return;
        }

        let inputs = self.go_inputs(&candidate, &signal, bar.close, risk.utilization());
        let breakdown = scorer.evaluate(&inputs, signal.regime, structure);
        let contracts = match breakdown.decision {
            GoDecision::Full => cfg.contracts,
            GoDecision::Half => (cfg.contracts / 2).max(1),
            GoDecision::Skip => 0,
        };
        let opened = contracts > 0;
        if opened {
            for order in &candidate.orders {
                let fill = exec.entry_fill(order.credit);
                tracing::info!(
                    structure = %order.structure,
                    short = %order.short_leg.strike,
                    long = %order.long_leg.strike,
                    credit = %fill,
                    contracts,
                    "position opened"
                );
                risk.register_open(order.side());
                open.push(OpenPosition::new(order.clone(), fill, ts, contracts));
            }
        }
        decisions.push(DecisionRecord { ts, structure, breakdown, opened });
    }

    /// Derive the bounded scoring inputs from the candidate and signal.
    fn go_inputs(
        &self,
        candidate: &Candidate,
        signal: &RegimeSignal,
        spot: Decimal,
        rfib_util: f64,
    ) -> GoInputs {
        let width = candidate.width.to_f64().unwrap_or(1.0);
        let edge = (candidate.net_credit - candidate.mid_credit)
            .to_f64()
            .unwrap_or(0.0)
            / width;
        let liquidity = 1.0
            - (candidate.spread_over_credit / self.config.spread.max_short_spread_frac)
                .clamp(0.0, 1.0);
        // Score -5 maps to 0, +8 to 1; the usable band of the regime score.
        let regime_fit = ((signal.score + 5.0) / 13.0).clamp(0.0, 1.0);
        let pin_risk = candidate
            .orders
            .iter()
            .map(|o| (o.short_leg.strike - spot).abs())
            .min()
            .and_then(|d| (d / candidate.width).to_f64())
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);
        GoInputs {
            poe: 1.0 - candidate.short_delta,
            pot: (2.0 * candidate.short_delta).min(1.0),
            edge,
            liquidity,
            regime_fit,
            pin_risk,
            rfib_util,
        }
        .clamped()
    }

    fn iv_ratio(&self, date: NaiveDate) -> f64 {
        match (self.vol.short_iv(date), self.vol.medium_iv(date)) {
            (Some(short), Some(medium)) if medium > 0.0 => short / medium,
            _ => 1.0,
        }
    }
}

/// Cost to buy the spread back right now, from the current chain. `None`
/// when either leg has no quote.
fn spread_mark(chain: &[OptionQuote], order: &SpreadOrder) -> Option<(Decimal, f64)> {
    let find = |strike: Decimal, right: OptionRight| {
        chain.iter().find(|q| q.strike == strike && q.right == right)
    };
    let short = find(order.short_leg.strike, order.short_leg.right)?;
    let long = find(order.long_leg.strike, order.long_leg.right)?;
    // Buy the short back at the ask, sell the wing at the bid.
    let value = (short.ask - long.bid).max(Decimal::ZERO);
    Some((value, short.delta.abs()))
}

/// Intrinsic value of the vertical at the settlement price.
fn intrinsic(order: &SpreadOrder, spot: Decimal) -> Decimal {
    let leg = |strike: Decimal| match order.short_leg.right {
        OptionRight::Put => (strike - spot).max(Decimal::ZERO),
        OptionRight::Call => (spot - strike).max(Decimal::ZERO),
    };
    (leg(order.short_leg.strike) - leg(order.long_leg.strike)).max(Decimal::ZERO)
}

/// Turn a closed position into its immutable record. P&L is net of `fees`.
fn finish(position: &OpenPosition, fees: Decimal) -> TradeResult {
    let exit_price = position.exit_price.unwrap_or_default();
    let contracts = Decimal::from(position.contracts);
    let pnl = (position.entry_price - exit_price) * CONTRACT_MULTIPLIER * contracts - fees;
    TradeResult {
        structure: position.order.structure,
        entry_ts: position.entry_ts,
        exit_ts: position.exit_ts.unwrap_or(position.entry_ts),
        entry_price: position.entry_price,
        exit_price,
        contracts: position.contracts,
        pnl,
        fees,
        exit_reason: position.exit_reason.unwrap_or(ExitReason::Settlement),
        max_adverse_excursion: position.max_adverse_excursion,
        max_favorable_excursion: position.max_favorable_excursion,
    }
}
