pub mod black_scholes;
pub mod chain;

pub use chain::{ChainConfig, ChainGenerator};
