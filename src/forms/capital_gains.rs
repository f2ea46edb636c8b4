//! Schedule D pattern: nets short- and long-term gains and losses against
//! each other and against carried-forward losses, caps the annual deduction,
//! and splits any unused loss back into ST/LT carryforward buckets.

use rust_decimal::Decimal;

use crate::ledger::{CarryoverCategory, LedgerDelta};
use crate::money::{safe_divide, to_money};
use crate::result::FormSection;

/// Inputs to the netting computation. Carry balances come from a read
/// snapshot of the ledger; `long_term` already includes installment-sale
/// gain recognized this year.
#[derive(Debug, Clone)]
pub struct CapitalGainsInput {
    pub short_term: Decimal,
    pub long_term: Decimal,
    pub short_term_carryover: Decimal,
    pub long_term_carryover: Decimal,
    /// Annual deduction cap: 3,000, or 1,500 for married filing separately.
    pub loss_cap: Decimal,
}

#[derive(Debug, Clone)]
pub struct CapitalGainsResult {
    /// Current-year ST net of the ST carryforward.
    pub net_short_term: Decimal,
    pub net_long_term: Decimal,
    pub combined: Decimal,
    /// Negative AGI contribution is capped at the annual limit; gains pass
    /// through whole.
    pub gain_or_loss_for_agi: Decimal,
    /// Net capital gain eligible for preferential rates (never negative).
    pub net_capital_gain: Decimal,
    pub short_term_carryforward: Decimal,
    pub long_term_carryforward: Decimal,
    pub deltas: Vec<LedgerDelta>,
}

pub fn calculate_capital_gains(input: &CapitalGainsInput) -> CapitalGainsResult {
    let net_short_term = input.short_term - input.short_term_carryover;
    let net_long_term = input.long_term - input.long_term_carryover;
    let combined = net_short_term + net_long_term;
    log::debug!(
        "schedule d: net st {net_short_term}, net lt {net_long_term}, combined {combined}"
    );

    let (gain_or_loss_for_agi, net_capital_gain, st_forward, lt_forward) =
        if combined >= Decimal::ZERO {
            let ncg = net_long_term.min(combined).max(Decimal::ZERO);
            (combined, ncg, Decimal::ZERO, Decimal::ZERO)
        } else {
            let total_loss = -combined;
            let allowed = total_loss.min(input.loss_cap);
            let unused = total_loss - allowed;
            let st_loss = (-net_short_term).max(Decimal::ZERO);
            let lt_loss = (-net_long_term).max(Decimal::ZERO);
            // Pro-rate the unused balance by each bucket's share of the
            // total loss; a single loss bucket carries it all.
            let (st_forward, lt_forward) = if st_loss > Decimal::ZERO && lt_loss > Decimal::ZERO {
                let st_share =
                    to_money(unused * safe_divide(st_loss, st_loss + lt_loss, Decimal::ZERO));
                (st_share, unused - st_share)
            } else if st_loss > Decimal::ZERO {
                (unused, Decimal::ZERO)
            } else {
                (Decimal::ZERO, unused)
            };
            (-allowed, Decimal::ZERO, st_forward, lt_forward)
        };

    let deltas = vec![
        LedgerDelta::new(
            CarryoverCategory::ShortTermCapitalLoss,
            input.short_term_carryover,
            st_forward,
        ),
        LedgerDelta::new(
            CarryoverCategory::LongTermCapitalLoss,
            input.long_term_carryover,
            lt_forward,
        ),
    ];

    CapitalGainsResult {
        net_short_term,
        net_long_term,
        combined,
        gain_or_loss_for_agi,
        net_capital_gain,
        short_term_carryforward: st_forward,
        long_term_carryforward: lt_forward,
        deltas,
    }
}

impl CapitalGainsResult {
    pub fn section(&self) -> FormSection {
        let mut section = FormSection::new("schedule_d");
        section.line(
            "line_7_net_short_term_gain_loss",
            to_money(self.net_short_term),
            "short-term gain or loss net of short-term loss carryover",
        );
        section.line(
            "line_15_net_long_term_gain_loss",
            to_money(self.net_long_term),
            "long-term gain or loss net of long-term loss carryover",
        );
        section.line(
            "line_16_total_gain_loss",
            to_money(self.combined),
            "combined short- and long-term result",
        );
        section.line(
            "line_21_allowed_loss",
            to_money(self.gain_or_loss_for_agi.min(Decimal::ZERO)),
            if self.combined < Decimal::ZERO {
                "net loss deductible this year, limited by the annual cap"
            } else {
                "no loss limitation applies: combined result is a gain"
            },
        );
        section.line(
            "net_capital_gain",
            to_money(self.net_capital_gain),
            "net capital gain eligible for preferential rates",
        );
        section.line(
            "short_term_loss_carryforward",
            to_money(self.short_term_carryforward),
            "unused short-term loss carried to next year",
        );
        section.line(
            "long_term_loss_carryforward",
            to_money(self.long_term_carryforward),
            "unused long-term loss carried to next year",
        );
        section.deltas = self.deltas.clone();
        section
    }
}
