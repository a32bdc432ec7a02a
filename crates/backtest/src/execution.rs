//! Fill and exit simulation for credit spreads.
//!
//! Entry fills collect the quoted credit minus a fixed slippage in ticks.
//! Exit checks run in a fixed order: the stop on the spread's
//! multiple-of-credit value first, then the short-leg delta breach. The
//! first condition that holds names the exit reason.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use zdte_core::{ConfigError, ExitReason, OpenPosition};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecConfig {
    pub entry_slippage_ticks: u32,
    pub exit_slippage_ticks: u32,
    /// Price value of one tick, points.
    pub tick_value: Decimal,
    /// Exit when the spread is worth this multiple of the entry credit.
    pub stop_credit_multiple: Decimal,
    /// Exit when the short leg's |delta| reaches this level.
    pub delta_breach_threshold: f64,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            entry_slippage_ticks: 1,
            exit_slippage_ticks: 1,
            tick_value: dec!(0.01),
            stop_credit_multiple: dec!(2.2),
            delta_breach_threshold: 0.33,
        }
    }
}

impl ExecConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_value <= Decimal::ZERO {
            return Err(ConfigError::NonPositive { field: "execution.tick_value" });
        }
        if self.stop_credit_multiple <= Decimal::ONE {
            return Err(ConfigError::NonPositive { field: "execution.stop_credit_multiple" });
        }
        if !(0.0..=1.0).contains(&self.delta_breach_threshold) {
            return Err(ConfigError::OutOfUnitRange { field: "execution.delta_breach_threshold" });
        }
        Ok(())
    }
}

/// Per-contract fee schedule, applied per leg.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    pub commission_per_contract: Decimal,
    pub exchange_fee_per_contract: Decimal,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            commission_per_contract: dec!(0.65),
            exchange_fee_per_contract: dec!(0.25),
        }
    }
}

impl FeeConfig {
    /// Cost of trading one leg of one contract.
    #[must_use]
    pub fn per_leg(&self) -> Decimal {
        self.commission_per_contract + self.exchange_fee_per_contract
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.commission_per_contract < Decimal::ZERO
            || self.exchange_fee_per_contract < Decimal::ZERO
        {
            return Err(ConfigError::NonPositive { field: "fees" });
        }
        Ok(())
    }
}

/// A triggered exit: the price to buy the spread back at, and why.
#[derive(Debug, Clone, Copy)]
pub struct ExitFill {
    pub price: Decimal,
    pub reason: ExitReason,
}

pub struct ExecutionSimulator {
    config: ExecConfig,
}

impl ExecutionSimulator {
    #[must_use]
    pub fn new(config: ExecConfig) -> Self {
        Self { config }
    }

    /// Credit actually collected at entry, floored at one tick.
    #[must_use]
    pub fn entry_fill(&self, credit: Decimal) -> Decimal {
        let slip = Decimal::from(self.config.entry_slippage_ticks) * self.config.tick_value;
        (credit - slip).max(self.config.tick_value)
    }

    /// Evaluate the stop conditions against the current mark. The
    /// multiple-of-credit stop is checked before the delta breach; only the
    /// first true condition is reported.
    #[must_use]
    pub fn check_exit(
        &self,
        position: &OpenPosition,
        current_value: Decimal,
        short_delta_abs: f64,
    ) -> Option<ExitFill> {
        let reason = if current_value
            >= position.entry_price * self.config.stop_credit_multiple
        {
            ExitReason::StopLoss
        } else if short_delta_abs >= self.config.delta_breach_threshold {
            ExitReason::DeltaBreach
        } else {
            return None;
        };

        let slip = Decimal::from(self.config.exit_slippage_ticks) * self.config.tick_value;
        Some(ExitFill {
            price: current_value + slip,
            reason,
        })
    }
}
