pub mod regime;

pub use regime::{MarketSnapshot, RegimeClassifier, RegimeConfig, RegimeSignal, RegimeWeights};
