//! Decimal arithmetic primitives shared by every form calculator.
//!
//! All amounts are `rust_decimal::Decimal` (fixed-point scaled integers).
//! Rounding happens only at the designated finalize boundary of a line item,
//! never mid-computation, so chained operations carry full precision.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::EngineError;

/// Currency amounts are finalized to the cent.
pub const MONEY_DP: u32 = 2;
/// Rates (e.g. the gross-profit percentage) are finalized to 4 decimals.
pub const RATE_DP: u32 = 4;

/// Round half-up to the cent. Idempotent.
pub fn to_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Truncate toward zero to the cent. Certain credit computations round down
/// by statute.
pub fn to_money_down(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::ToZero)
}

/// Round away from zero to the cent.
pub fn to_money_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::AwayFromZero)
}

/// Round half-up to 4 decimal places.
pub fn to_rate(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(RATE_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Exact division with a caller-supplied default for a zero denominator.
/// Total function: never errors. Rounding is the caller's responsibility.
pub fn safe_divide(numerator: Decimal, denominator: Decimal, default: Decimal) -> Decimal {
    if denominator.is_zero() {
        default
    } else {
        numerator / denominator
    }
}

/// Division that errors on a zero denominator, for the places where no
/// business default exists.
pub fn divide(
    numerator: Decimal,
    denominator: Decimal,
    context: &'static str,
) -> Result<Decimal, EngineError> {
    if denominator.is_zero() {
        Err(EngineError::DivisionByZero(context))
    } else {
        Ok(numerator / denominator)
    }
}

/// One marginal-rate band of a progressive schedule. Brackets are ascending;
/// the last bracket is unbounded (`upper: None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bracket {
    /// Inclusive upper bound of the band. Income exactly at the bound is
    /// taxed in this (lower) band.
    pub upper: Option<Decimal>,
    pub rate: Decimal,
}

impl Bracket {
    pub const fn to(upper: Decimal, rate: Decimal) -> Self {
        Bracket {
            upper: Some(upper),
            rate,
        }
    }

    pub const fn above(rate: Decimal) -> Self {
        Bracket { upper: None, rate }
    }
}

/// Progressive bracket tax: sums `(min(income, upper) - lower) * rate` across
/// ascending bands, short-circuiting once income falls within a band.
/// Rounded once, at the end, to the cent. Non-positive income taxes to zero.
pub fn progressive_tax(income: Decimal, brackets: &[Bracket]) -> Decimal {
    if income <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let mut tax = Decimal::ZERO;
    let mut lower = Decimal::ZERO;
    for bracket in brackets {
        match bracket.upper {
            Some(upper) if income > upper => {
                tax += (upper - lower) * bracket.rate;
                lower = upper;
            }
            // Income at or below the band's upper bound: tax the remainder
            // in this band and stop.
            _ => {
                tax += (income - lower) * bracket.rate;
                break;
            }
        }
    }
    to_money(tax)
}
