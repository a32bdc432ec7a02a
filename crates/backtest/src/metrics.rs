//! Aggregates over a run's closed trades.

use rust_decimal::Decimal;
use serde::Serialize;

use zdte_core::TradeResult;

/// Derived aggregates exposed on the run report.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSummary {
    /// P&L before fees, dollars.
    pub gross_pnl: Decimal,
    pub total_fees: Decimal,
    /// P&L net of fees, dollars.
    pub net_pnl: Decimal,
    pub num_trades: usize,
    pub win_rate: f64,
    /// Largest peak-to-trough drop of the cumulative net P&L, dollars.
    pub max_drawdown: Decimal,
}

impl PerformanceSummary {
    #[must_use]
    pub fn from_trades(trades: &[TradeResult]) -> Self {
        let mut gross = Decimal::ZERO;
        let mut fees = Decimal::ZERO;
        let mut wins = 0usize;

        let mut equity = Decimal::ZERO;
        let mut peak = Decimal::ZERO;
        let mut max_drawdown = Decimal::ZERO;

        for trade in trades {
            gross += trade.pnl + trade.fees;
            fees += trade.fees;
            if trade.pnl > Decimal::ZERO {
                wins += 1;
            }

            equity += trade.pnl;
            if equity > peak {
                peak = equity;
            }
            let drawdown = peak - equity;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let win_rate = if trades.is_empty() {
            0.0
        } else {
            wins as f64 / trades.len() as f64
        };

        Self {
            gross_pnl: gross,
            total_fees: fees,
            net_pnl: gross - fees,
            num_trades: trades.len(),
            win_rate,
            max_drawdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use zdte_core::{ExitReason, StructureType};

    fn trade(pnl: Decimal, fees: Decimal) -> TradeResult {
        let ts = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        TradeResult {
            structure: StructureType::SinglePut,
            entry_ts: ts,
            exit_ts: ts,
            entry_price: dec!(0.12),
            exit_price: dec!(0),
            contracts: 1,
            pnl,
            fees,
            exit_reason: ExitReason::Settlement,
            max_adverse_excursion: dec!(0),
            max_favorable_excursion: dec!(0),
        }
    }

    #[test]
    fn aggregates_reconcile() {
        let trades = vec![trade(dec!(10), dec!(2)), trade(dec!(-25), dec!(2)), trade(dec!(8), dec!(2))];
        let summary = PerformanceSummary::from_trades(&trades);
        assert_eq!(summary.net_pnl, dec!(-7));
        assert_eq!(summary.total_fees, dec!(6));
        assert_eq!(summary.gross_pnl, dec!(-1));
        assert_eq!(summary.net_pnl, summary.gross_pnl - summary.total_fees);
        assert_eq!(summary.num_trades, 3);
        approx::assert_relative_eq!(summary.win_rate, 2.0 / 3.0);
        // Peak 10, trough 10 - 25 = -15.
        assert_eq!(summary.max_drawdown, dec!(25));
    }

    #[test]
    fn empty_run_is_all_zero() {
        let summary = PerformanceSummary::from_trades(&[]);
        assert_eq!(summary.net_pnl, dec!(0));
        assert_eq!(summary.num_trades, 0);
        approx::assert_relative_eq!(summary.win_rate, 0.0);
    }
}
