//! Section 481(a) adjustment spread. A positive adjustment over the
//! statutory threshold spreads evenly over four years; smaller or negative
//! adjustments (or an explicit election) land entirely in the year of
//! change. The unrecognized remainder rides the carryover ledger.

use rust_decimal::Decimal;

use crate::config::TaxYearConfig;
use crate::ledger::{CarryoverCategory, CarryoverLedger, LedgerDelta};
use crate::money::to_money;
use crate::result::FormSection;
use crate::snapshot::MethodChange;

#[derive(Debug, Clone, Default)]
pub struct MethodChangeResult {
    /// Ordinary income adjustment recognized this year (may be negative).
    pub recognized: Decimal,
    pub deltas: Vec<LedgerDelta>,
    pub notes: Vec<String>,
}

pub fn calculate_method_changes(
    changes: &[MethodChange],
    ledger: &CarryoverLedger,
    config: &TaxYearConfig,
) -> MethodChangeResult {
    let mut result = MethodChangeResult::default();
    let mut originated = Decimal::ZERO;

    for change in changes {
        if change.change_year == config.year {
            let spreads = change.adjustment > config.sec481_spread_threshold
                && !change.one_year_election;
            if spreads {
                let annual = to_money(change.adjustment / Decimal::from(config.sec481_spread_years));
                result.recognized += annual;
                originated += change.adjustment - annual;
                result.notes.push(format!(
                    "{}: positive adjustment {} exceeds {}, spread over {} years ({} this year)",
                    change.description,
                    change.adjustment,
                    config.sec481_spread_threshold,
                    config.sec481_spread_years,
                    annual
                ));
            } else {
                result.recognized += change.adjustment;
                result.notes.push(format!(
                    "{}: adjustment {} recognized entirely in the year of change{}",
                    change.description,
                    change.adjustment,
                    if change.one_year_election {
                        " (one-year election)"
                    } else {
                        ""
                    }
                ));
            }
        }
    }

    // Consume one year's slice of every spread still on the ledger. Each
    // origin year runs its own schedule, so concurrent spreads never blend.
    for (origin, balance) in ledger.balances_by_origin(&CarryoverCategory::Section481Adjustment) {
        let age = config.year - origin;
        let remaining_years = (config.sec481_spread_years - age).max(1);
        // Final year takes the exact remainder so each spread sums back to
        // its original adjustment.
        let portion = if remaining_years == 1 {
            balance
        } else {
            to_money(balance / Decimal::from(remaining_years))
        };
        result.recognized += portion;
        result.deltas.push(LedgerDelta::from_origin(
            CarryoverCategory::Section481Adjustment,
            origin,
            portion,
        ));
        log::debug!(
            "section 481(a): recognizing {portion} of the {balance} spread from {origin} \
             ({remaining_years} years remaining)"
        );
        result.notes.push(format!(
            "{origin} spread: {portion} of {balance} recognized, {} years remain after this one",
            remaining_years - 1
        ));
    }

    if originated > Decimal::ZERO {
        result.deltas.push(LedgerDelta::new(
            CarryoverCategory::Section481Adjustment,
            Decimal::ZERO,
            originated,
        ));
    }
    result
}

impl MethodChangeResult {
    pub fn section(&self) -> FormSection {
        let mut section = FormSection::new("section_481a");
        section.line(
            "recognized_adjustment",
            to_money(self.recognized),
            self.notes.join("; "),
        );
        section.deltas = self.deltas.clone();
        section
    }
}
