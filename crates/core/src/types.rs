//! Value types shared across the simulator.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Contract multiplier for cash-settled index options (dollars per point).
pub const CONTRACT_MULTIPLIER: Decimal = Decimal::ONE_HUNDRED;

/// One OHLCV bar from the market-data feed. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBar {
    pub ts: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Option right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionRight {
    Call,
    Put,
}

impl std::fmt::Display for OptionRight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Put => write!(f, "put"),
        }
    }
}

/// Directional side a spread occupies for concurrency accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpreadSide {
    Put,
    Call,
}

/// Structure chosen by the regime decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructureType {
    NoGo,
    Condor,
    SinglePut,
    SingleCall,
}

impl StructureType {
    /// Sides this structure occupies. A condor ties up both.
    #[must_use]
    pub fn sides(&self) -> &'static [SpreadSide] {
        match self {
            Self::NoGo => &[],
            Self::Condor => &[SpreadSide::Put, SpreadSide::Call],
            Self::SinglePut => &[SpreadSide::Put],
            Self::SingleCall => &[SpreadSide::Call],
        }
    }
}

impl std::fmt::Display for StructureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoGo => write!(f, "no_go"),
            Self::Condor => write!(f, "condor"),
            Self::SinglePut => write!(f, "single_put"),
            Self::SingleCall => write!(f, "single_call"),
        }
    }
}

/// One synthesized quote. Regenerated every tick, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionQuote {
    pub ts: DateTime<Utc>,
    pub expiry: NaiveDate,
    pub strike: Decimal,
    pub right: OptionRight,
    pub bid: Decimal,
    pub ask: Decimal,
    pub mid: Decimal,
    pub delta: f64,
    pub iv: f64,
}

impl OptionQuote {
    /// Quoted bid-ask spread in points.
    #[must_use]
    pub fn quoted_spread(&self) -> Decimal {
        self.ask - self.bid
    }
}

/// One leg of a spread. Quantity is signed: +1 long, -1 short.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadLeg {
    pub expiry: NaiveDate,
    pub strike: Decimal,
    pub right: OptionRight,
    pub qty: i32,
}

/// A validated risk-defined vertical produced by the spread constructor.
///
/// A condor is represented as two of these (one per side), both tagged
/// [`StructureType::Condor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadOrder {
    pub ts: DateTime<Utc>,
    pub underlying: String,
    pub credit: Decimal,
    pub width: Decimal,
    pub credit_per_width: Decimal,
    pub structure: StructureType,
    pub short_leg: SpreadLeg,
    pub long_leg: SpreadLeg,
}

impl SpreadOrder {
    /// Maximum loss for one contract in dollars: width minus credit, times
    /// the contract multiplier.
    #[must_use]
    pub fn max_loss_per_contract(&self) -> Decimal {
        (self.width - self.credit) * CONTRACT_MULTIPLIER
    }

    /// Side this vertical occupies.
    #[must_use]
    pub fn side(&self) -> SpreadSide {
        match self.short_leg.right {
            OptionRight::Put => SpreadSide::Put,
            OptionRight::Call => SpreadSide::Call,
        }
    }
}

/// Reason a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    DeltaBreach,
    Settlement,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StopLoss => write!(f, "stop_loss"),
            Self::DeltaBreach => write!(f, "delta_breach"),
            Self::Settlement => write!(f, "settlement"),
        }
    }
}

/// An open spread position. Owned and mutated by the orchestrator until
/// closed; never shared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPosition {
    pub order: SpreadOrder,
    pub entry_price: Decimal,
    pub entry_ts: DateTime<Utc>,
    pub contracts: u32,
    pub closed: bool,
    pub exit_price: Option<Decimal>,
    pub exit_ts: Option<DateTime<Utc>>,
    pub exit_reason: Option<ExitReason>,
    /// Worst unrealized P&L seen, dollars per contract (<= 0).
    pub max_adverse_excursion: Decimal,
    /// Best unrealized P&L seen, dollars per contract (>= 0).
    pub max_favorable_excursion: Decimal,
}

impl OpenPosition {
    #[must_use]
    pub fn new(order: SpreadOrder, entry_price: Decimal, entry_ts: DateTime<Utc>, contracts: u32) -> Self {
        Self {
            order,
            entry_price,
            entry_ts,
            contracts,
            closed: false,
            exit_price: None,
            exit_ts: None,
            exit_reason: None,
            max_adverse_excursion: Decimal::ZERO,
            max_favorable_excursion: Decimal::ZERO,
        }
    }

    /// Update excursion tracking from the current cost to close the spread.
    pub fn record_mark(&mut self, current_value: Decimal) {
        let unrealized = (self.entry_price - current_value) * CONTRACT_MULTIPLIER;
        if unrealized < self.max_adverse_excursion {
            self.max_adverse_excursion = unrealized;
        }
        if unrealized > self.max_favorable_excursion {
            self.max_favorable_excursion = unrealized;
        }
    }

    /// Mark the position closed. Idempotence is the caller's concern.
    pub fn close(&mut self, price: Decimal, ts: DateTime<Utc>, reason: ExitReason) {
        self.closed = true;
        self.exit_price = Some(price);
        self.exit_ts = Some(ts);
        self.exit_reason = Some(reason);
    }
}

/// Immutable record of a closed position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    pub structure: StructureType,
    pub entry_ts: DateTime<Utc>,
    pub exit_ts: DateTime<Utc>,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub contracts: u32,
    /// Realized P&L in dollars, net of fees.
    pub pnl: Decimal,
    pub fees: Decimal,
    pub exit_reason: ExitReason,
    pub max_adverse_excursion: Decimal,
    pub max_favorable_excursion: Decimal,
}

/// The seven bounded inputs to GoScore. Stateless, recomputed per candidate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GoInputs {
    /// Probability the short strike expires out of the money, [0, 1].
    pub poe: f64,
    /// Probability of touching the short strike before expiry, [0, 1].
    pub pot: f64,
    /// Pricing edge of the fill versus fair value, per point of width, [-1, 1].
    pub edge: f64,
    /// Liquidity quality of the short leg, [0, 1].
    pub liquidity: f64,
    /// How well the regime supports the structure, [0, 1].
    pub regime_fit: f64,
    /// Distance from pin risk at the short strike, [0, 1] (1 = far).
    pub pin_risk: f64,
    /// Fraction of the daily risk budget already consumed, [0, 1].
    pub rfib_util: f64,
}

impl GoInputs {
    /// Clamp every component to its documented bounds.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            poe: self.poe.clamp(0.0, 1.0),
            pot: self.pot.clamp(0.0, 1.0),
            edge: self.edge.clamp(-1.0, 1.0),
            liquidity: self.liquidity.clamp(0.0, 1.0),
            regime_fit: self.regime_fit.clamp(0.0, 1.0),
            pin_risk: self.pin_risk.clamp(0.0, 1.0),
            rfib_util: self.rfib_util.clamp(0.0, 1.0),
        }
    }
}

/// Per-run risk counters. Owned by the risk manager; mutated only through
/// its register operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskState {
    pub realized_pnl: Decimal,
    pub open_put_spreads: u32,
    pub open_call_spreads: u32,
}

/// A scheduled macro event from the calendar source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconEvent {
    pub ts: DateTime<Utc>,
    pub kind: String,
}

/// Coarse market regime used to gate structure choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    Calm,
    Trend,
    Convex,
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Calm => write!(f, "calm"),
            Self::Trend => write!(f, "trend"),
            Self::Convex => write!(f, "convex"),
        }
    }
}
