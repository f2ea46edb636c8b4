//! Generic threshold phase-out: a benefit that shrinks as income rises past
//! a statutory start. Shared by the rental real estate special allowance
//! (flat fifty-cent reduction per excess dollar), the Section 199A phase-in
//! ratio, and any cliff-style credit added later. One implementation so the
//! boundary behavior is identical everywhere.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::money::safe_divide;

/// Outcome of a phase-out computation. Pure value, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseOutResult {
    /// The income-like value the phase-out was indexed to.
    pub applicable_amount: Decimal,
    pub phase_out_start: Decimal,
    /// How much of the benefit was phased out.
    pub phase_out_amount: Decimal,
    /// The surviving benefit: exactly `max_benefit` at or below the start,
    /// exactly zero at or beyond full phase-out.
    pub available_amount: Decimal,
}

/// Linear or flat-rate phase-out of `max_benefit` between `start` and
/// `start + range`.
///
/// `rate` is the reduction per excess dollar; when `None` it defaults to
/// `max_benefit / range` (linear to zero across the range). Output is
/// monotone non-increasing in `value`.
pub fn phase_out(
    value: Decimal,
    start: Decimal,
    range: Decimal,
    max_benefit: Decimal,
    rate: Option<Decimal>,
) -> PhaseOutResult {
    let reduction = if value <= start {
        Decimal::ZERO
    } else if range <= Decimal::ZERO {
        // Degenerate window: anything past the start is fully phased out.
        max_benefit
    } else {
        let per_dollar = rate.unwrap_or_else(|| safe_divide(max_benefit, range, Decimal::ZERO));
        ((value - start) * per_dollar).clamp(Decimal::ZERO, max_benefit)
    };
    PhaseOutResult {
        applicable_amount: value,
        phase_out_start: start,
        phase_out_amount: reduction,
        available_amount: max_benefit - reduction,
    }
}
