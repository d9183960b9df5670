//! Pricing heuristics.

use keeper_core::{LiquidationPosition, QuoteSide};
use rust_decimal::Decimal;

const BPS_DENOMINATOR: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// Quote for an RFQ: reference price shaded by a fixed spread.
///
/// The requester buying means we sell, so the quote sits above the
/// reference; the requester selling puts it below.
#[must_use]
pub fn rfq_quote(reference_price: Decimal, side: QuoteSide, spread_bps: Decimal) -> Decimal {
    let spread = reference_price * spread_bps / BPS_DENOMINATOR;
    match side {
        QuoteSide::Buy => reference_price + spread,
        QuoteSide::Sell => reference_price - spread,
    }
}

/// Profit estimate for a liquidation, as the source publishes it: repayable
/// debt value minus seizable collateral value, each in its asset's own units
/// with no common price normalization. A heuristic ranking signal only, not
/// a guaranteed profit figure.
#[must_use]
pub fn liquidation_profit_estimate(position: &LiquidationPosition) -> Decimal {
    position.debt_value - position.collateral_value
}
