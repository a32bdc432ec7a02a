//! Deterministic day-by-day simulation of short-dated credit-spread
//! strategies over historical bars, with synthetic option quotes.

pub mod data;
pub mod engine;
pub mod execution;
pub mod metrics;

pub use data::{DailyVolSeries, StaticCalendar, VecMarketData};
pub use engine::{DecisionRecord, RunReport, SimConfig, Simulator};
pub use execution::{ExecConfig, ExecutionSimulator, ExitFill, FeeConfig};
pub use metrics::PerformanceSummary;
