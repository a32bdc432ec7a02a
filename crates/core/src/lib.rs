pub mod config;
pub mod traits;
pub mod types;

pub use config::{ConfigError, SessionConfig};
pub use traits::{EventCalendar, MarketData, VolSource};
pub use types::{
    EconEvent, ExitReason, GoInputs, OpenPosition, OptionQuote, OptionRight, PriceBar, Regime,
    RiskState, SpreadLeg, SpreadOrder, SpreadSide, StructureType, TradeResult,
    CONTRACT_MULTIPLIER,
};
