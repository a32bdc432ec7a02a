//! Portfolio-level risk limits.
//!
//! Owns the per-run [`RiskState`] and exposes the only mutation path:
//! `can_add`, `register_open`, `register_close`. A refusal from `can_add`
//! is a normal outcome, not a fault. Each simulation run constructs its own
//! manager, so parallel runs are independent by construction.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use zdte_core::{ConfigError, RiskState, SpreadSide, StructureType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Stop adding risk once realized P&L reaches minus this many dollars.
    pub daily_loss_stop: Decimal,
    /// Largest acceptable worst-case loss for one new position, dollars.
    pub per_trade_max_loss: Decimal,
    /// Concurrent verticals allowed per directional side.
    pub max_spreads_per_side: u32,
    /// No new risk when fewer minutes than this remain to the close.
    pub no_new_risk_minutes: i64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            daily_loss_stop: dec!(500),
            per_trade_max_loss: dec!(600),
            max_spreads_per_side: 1,
            no_new_risk_minutes: 40,
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.daily_loss_stop <= Decimal::ZERO {
            return Err(ConfigError::NonPositive { field: "risk.daily_loss_stop" });
        }
        if self.per_trade_max_loss <= Decimal::ZERO {
            return Err(ConfigError::NonPositive { field: "risk.per_trade_max_loss" });
        }
        if self.max_spreads_per_side == 0 {
            return Err(ConfigError::NonPositive { field: "risk.max_spreads_per_side" });
        }
        if self.no_new_risk_minutes <= 0 {
            return Err(ConfigError::NonPositive { field: "risk.no_new_risk_minutes" });
        }
        Ok(())
    }
}

pub struct RiskManager {
    config: RiskConfig,
    state: RiskState,
}

impl RiskManager {
    #[must_use]
    pub fn new(config: RiskConfig) -> Self {
        Self {
            config,
            state: RiskState::default(),
        }
    }

    /// Whether a new position of this structure may be opened now.
    #[must_use]
    pub fn can_add(
        &self,
        structure: StructureType,
        max_loss_per_contract: Decimal,
        minutes_to_close: i64,
    ) -> bool {
        let sides = structure.sides();
        if sides.is_empty() {
            return false;
        }
        if self.state.realized_pnl <= -self.config.daily_loss_stop {
            tracing::warn!(
                realized = %self.state.realized_pnl,
                stop = %self.config.daily_loss_stop,
                "daily loss stop reached, no new risk"
            );
            return false;
        }
        if minutes_to_close < self.config.no_new_risk_minutes {
            return false;
        }
        if max_loss_per_contract > self.config.per_trade_max_loss {
            tracing::debug!(
                max_loss = %max_loss_per_contract,
                "candidate exceeds per-trade loss cap"
            );
            return false;
        }
        sides.iter().all(|side| self.open_count(*side) < self.config.max_spreads_per_side)
    }

    /// Record one opened vertical on `side`.
    pub fn register_open(&mut self, side: SpreadSide) {
        match side {
            SpreadSide::Put => self.state.open_put_spreads += 1,
            SpreadSide::Call => self.state.open_call_spreads += 1,
        }
    }

    /// Record one closed vertical on `side` and accumulate its realized P&L.
    pub fn register_close(&mut self, side: SpreadSide, pnl: Decimal) {
        match side {
            SpreadSide::Put => {
                self.state.open_put_spreads = self.state.open_put_spreads.saturating_sub(1);
            }
            SpreadSide::Call => {
                self.state.open_call_spreads = self.state.open_call_spreads.saturating_sub(1);
            }
        }
        self.state.realized_pnl += pnl;
    }

    /// Fraction of the daily risk budget consumed by realized losses, [0, 1].
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.state.realized_pnl >= Decimal::ZERO {
            return 0.0;
        }
        (-self.state.realized_pnl / self.config.daily_loss_stop)
            .to_f64()
            .unwrap_or(1.0)
            .clamp(0.0, 1.0)
    }

    #[must_use]
    pub fn state(&self) -> &RiskState {
        &self.state
    }

    fn open_count(&self, side: SpreadSide) -> u32 {
        match side {
            SpreadSide::Put => self.state.open_put_spreads,
            SpreadSide::Call => self.state.open_call_spreads,
        }
    }
}
