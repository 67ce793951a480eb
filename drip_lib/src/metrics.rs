//! Summary return metrics for a finished simulation.

use serde::Serialize;

use crate::error::DivisionError;

/// Final value and total return of a position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryMetrics {
    pub initial_investment: f64,
    pub final_value: f64,
    pub total_return_amount: f64,
    pub total_return_percent: f64,
}

impl SummaryMetrics {
    /// Compute metrics from the starting position and the final share balance.
    ///
    /// Returns `ZeroInitialInvestment` instead of an infinite or NaN percent
    /// when `initial_shares * initial_price` is zero.
    pub fn compute(
        initial_shares: f64,
        initial_price: f64,
        final_shares: f64,
        final_price: f64,
    ) -> Result<Self, DivisionError> {
        let initial_investment = initial_shares * initial_price;
        let final_value = final_shares * final_price;
        let total_return_amount = final_value - initial_investment;
        let total_return_percent = total_return_percent(total_return_amount, initial_investment)?;

        Ok(Self {
            initial_investment,
            final_value,
            total_return_amount,
            total_return_percent,
        })
    }
}

/// `amount / investment * 100`, refusing a zero or non-finite denominator.
pub fn total_return_percent(amount: f64, investment: f64) -> Result<f64, DivisionError> {
    if investment == 0.0 || !investment.is_finite() {
        return Err(DivisionError::ZeroInitialInvestment);
    }
    Ok(amount / investment * 100.0)
}
