pub mod goscore;
pub mod risk_manager;
pub mod spread;

pub use goscore::{GoBreakdown, GoComponent, GoDecision, GoPolicy, GoScorer, GoWeights, HardGate};
pub use risk_manager::{RiskConfig, RiskManager};
pub use spread::{Candidate, DeltaBand, SpreadConfig, SpreadConstructor};
