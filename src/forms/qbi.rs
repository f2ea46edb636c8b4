//! Section 199A qualified business income deduction. Negative businesses
//! and the prior-year QBI loss carryforward reduce positive businesses
//! pro-rata before any per-business component is computed; the wage and
//! UBIA limits phase in over the taxable-income range, and a specified
//! service trade or business (SSTB) phases out entirely across it.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::{FilingStatus, TaxYearConfig};
use crate::ledger::{CarryoverCategory, CarryoverLedger, LedgerDelta};
use crate::money::{safe_divide, to_money};
use crate::phaseout::phase_out;
use crate::result::FormSection;
use crate::snapshot::QbiBusiness;

#[derive(Debug, Clone)]
pub struct QbiInput<'a> {
    pub businesses: &'a [QbiBusiness],
    pub taxable_income_before_qbi: Decimal,
    /// Net capital gain plus qualified dividends, excluded from the overall
    /// 20% income limitation.
    pub net_capital_gain: Decimal,
    pub filing_status: FilingStatus,
}

#[derive(Debug, Clone)]
pub struct BusinessComponent {
    pub id: String,
    /// QBI after pro-rata absorption of losses and carryforward.
    pub adjusted_qbi: Decimal,
    pub component: Decimal,
    pub wage_limited: bool,
}

#[derive(Debug, Clone)]
pub struct QbiResult {
    /// All business QBI netted against the loss carryforward.
    pub combined_qbi: Decimal,
    pub components: Vec<BusinessComponent>,
    pub income_limitation: Decimal,
    pub deduction: Decimal,
    pub loss_carryforward: Decimal,
    pub deltas: Vec<LedgerDelta>,
}

pub fn calculate_qbi_deduction(
    input: &QbiInput,
    ledger: &CarryoverLedger,
    config: &TaxYearConfig,
) -> QbiResult {
    let carryforward = ledger.balance(&CarryoverCategory::QbiLoss);
    let positive_total: Decimal = input
        .businesses
        .iter()
        .map(|b| b.qualified_business_income.max(Decimal::ZERO))
        .sum();
    let negative_total: Decimal = input
        .businesses
        .iter()
        .map(|b| (-b.qualified_business_income).max(Decimal::ZERO))
        .sum();
    let combined_qbi = positive_total - negative_total - carryforward;

    if combined_qbi <= Decimal::ZERO {
        // Nothing deductible this year; the net loss carries forward as a
        // reduction of next year's QBI.
        let mut deltas = Vec::new();
        if carryforward > Decimal::ZERO || combined_qbi < Decimal::ZERO {
            deltas.push(LedgerDelta::new(
                CarryoverCategory::QbiLoss,
                carryforward,
                -combined_qbi,
            ));
        }
        return QbiResult {
            combined_qbi,
            components: Vec::new(),
            income_limitation: Decimal::ZERO,
            deduction: Decimal::ZERO,
            loss_carryforward: -combined_qbi,
            deltas,
        };
    }

    // Losses and the carryforward absorb positive QBI pro-rata; the last
    // positive business takes the exact remainder.
    let reduction_total = negative_total + carryforward;
    let positives: Vec<&QbiBusiness> = input
        .businesses
        .iter()
        .filter(|b| b.qualified_business_income > Decimal::ZERO)
        .collect();
    let mut adjusted: Vec<Decimal> = Vec::with_capacity(positives.len());
    let mut absorbed = Decimal::ZERO;
    for (idx, business) in positives.iter().enumerate() {
        let share = if idx + 1 == positives.len() {
            reduction_total - absorbed
        } else {
            to_money(
                reduction_total
                    * safe_divide(
                        business.qualified_business_income,
                        positive_total,
                        Decimal::ZERO,
                    ),
            )
        };
        absorbed += share;
        adjusted.push(business.qualified_business_income - share);
    }

    let (threshold, range) = config.qbi_threshold(input.filing_status);
    // Fraction of the wage limit phased in, and the SSTB applicable
    // percentage, both driven by taxable income through the range.
    let phase_in = phase_out(
        input.taxable_income_before_qbi,
        threshold,
        range,
        Decimal::ONE,
        None,
    );
    let applicable_pct = phase_in.available_amount;
    let limit_fraction = Decimal::ONE - applicable_pct;

    let mut components = Vec::with_capacity(positives.len());
    for (business, qbi) in positives.iter().zip(adjusted) {
        let component = business_component(business, qbi, applicable_pct, limit_fraction);
        components.push(component);
    }

    let income_limitation = to_money(
        dec!(0.20)
            * (input.taxable_income_before_qbi - input.net_capital_gain).max(Decimal::ZERO),
    );
    let component_total: Decimal = components.iter().map(|c| c.component).sum();
    let deduction = component_total.min(income_limitation);

    let mut deltas = Vec::new();
    if carryforward > Decimal::ZERO {
        deltas.push(LedgerDelta::new(
            CarryoverCategory::QbiLoss,
            carryforward,
            Decimal::ZERO,
        ));
    }

    QbiResult {
        combined_qbi,
        components,
        income_limitation,
        deduction,
        loss_carryforward: Decimal::ZERO,
        deltas,
    }
}

fn business_component(
    business: &QbiBusiness,
    adjusted_qbi: Decimal,
    applicable_pct: Decimal,
    limit_fraction: Decimal,
) -> BusinessComponent {
    // An SSTB scales all of its amounts by the applicable percentage and
    // disappears entirely above the range.
    let scale = if business.sstb {
        applicable_pct
    } else {
        Decimal::ONE
    };
    if scale <= Decimal::ZERO {
        return BusinessComponent {
            id: business.id.clone(),
            adjusted_qbi,
            component: Decimal::ZERO,
            wage_limited: true,
        };
    }

    let qbi = adjusted_qbi * scale;
    let w2 = business.w2_wages * scale;
    let ubia = business.ubia * scale;

    let tentative = dec!(0.20) * qbi;
    let wage_limit = (dec!(0.50) * w2).max(dec!(0.25) * w2 + dec!(0.025) * ubia);

    let component = if limit_fraction <= Decimal::ZERO {
        // Below the threshold the wage limit does not apply at all.
        tentative
    } else if limit_fraction >= Decimal::ONE {
        tentative.min(wage_limit)
    } else if tentative > wage_limit {
        // Inside the range only a fraction of the excess is disallowed.
        tentative - (tentative - wage_limit) * limit_fraction
    } else {
        tentative
    };

    BusinessComponent {
        id: business.id.clone(),
        adjusted_qbi,
        component: to_money(component),
        wage_limited: component < tentative,
    }
}

impl QbiResult {
    pub fn section(&self) -> FormSection {
        let mut section = FormSection::new("form_8995");
        section.line(
            "line_2_total_qbi",
            to_money(self.combined_qbi),
            "qualified business income net of losses and carryforward",
        );
        for component in &self.components {
            section.line(
                format!("component_{}", component.id),
                component.component,
                if component.wage_limited {
                    format!("business '{}' after wage and UBIA limitation", component.id)
                } else {
                    format!("20% of business '{}' qualified income", component.id)
                },
            );
        }
        section.line(
            "line_13_income_limitation",
            self.income_limitation,
            "20% of taxable income less net capital gain",
        );
        section.line(
            "line_15_qbi_deduction",
            to_money(self.deduction),
            "lesser of the component total and the income limitation",
        );
        if self.loss_carryforward > Decimal::ZERO {
            section.line(
                "line_16_loss_carryforward",
                to_money(self.loss_carryforward),
                "net qualified business loss carried to next year",
            );
        }
        section.deltas = self.deltas.clone();
        section
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::CarryoverRecord;

    fn config() -> TaxYearConfig {
        TaxYearConfig::for_year(2024).unwrap()
    }

    fn business(id: &str, qbi: Decimal, w2: Decimal, sstb: bool) -> QbiBusiness {
        QbiBusiness {
            id: id.into(),
            description: format!("business {id}"),
            qualified_business_income: qbi,
            w2_wages: w2,
            ubia: Decimal::ZERO,
            sstb,
        }
    }

    fn input<'a>(
        businesses: &'a [QbiBusiness],
        taxable_income: Decimal,
        net_capital_gain: Decimal,
    ) -> QbiInput<'a> {
        QbiInput {
            businesses,
            taxable_income_before_qbi: taxable_income,
            net_capital_gain,
            filing_status: FilingStatus::Single,
        }
    }

    #[test]
    fn below_threshold_is_a_straight_twenty_percent() {
        let businesses = vec![business("b1", dec!(100000), dec!(0), true)];
        let ledger = CarryoverLedger::empty(2024);
        let result =
            calculate_qbi_deduction(&input(&businesses, dec!(150000), dec!(0)), &ledger, &config());
        // Below the threshold even an SSTB with no wages gets the full 20%.
        assert_eq!(result.deduction, dec!(20000.00));
    }

    #[test]
    fn overall_income_limitation_caps_the_deduction() {
        let businesses = vec![business("b1", dec!(100000), dec!(0), false)];
        let ledger = CarryoverLedger::empty(2024);
        let result =
            calculate_qbi_deduction(&input(&businesses, dec!(50000), dec!(10000)), &ledger, &config());
        assert_eq!(result.income_limitation, dec!(8000.00));
        assert_eq!(result.deduction, dec!(8000.00));
    }

    #[test]
    fn losses_absorb_positive_qbi_pro_rata() {
        let businesses = vec![
            business("win", dec!(80000), dec!(0), false),
            business("lose", dec!(-20000), dec!(0), false),
        ];
        let ledger = CarryoverLedger::empty(2024);
        let result =
            calculate_qbi_deduction(&input(&businesses, dec!(120000), dec!(0)), &ledger, &config());
        assert_eq!(result.combined_qbi, dec!(60000));
        assert_eq!(result.components[0].adjusted_qbi, dec!(60000));
        assert_eq!(result.deduction, dec!(12000.00));
    }

    #[test]
    fn net_loss_carries_forward() {
        let businesses = vec![
            business("small", dec!(10000), dec!(0), false),
            business("big_loss", dec!(-30000), dec!(0), false),
        ];
        let ledger = CarryoverLedger::empty(2024);
        let result =
            calculate_qbi_deduction(&input(&businesses, dec!(100000), dec!(0)), &ledger, &config());
        assert_eq!(result.deduction, dec!(0));
        assert_eq!(result.loss_carryforward, dec!(20000));
        assert_eq!(result.deltas[0].originated, dec!(20000));
    }

    #[test]
    fn prior_loss_carryforward_reduces_current_qbi() {
        let businesses = vec![business("b1", dec!(50000), dec!(0), false)];
        let ledger = CarryoverLedger::new(
            2024,
            vec![CarryoverRecord {
                category: CarryoverCategory::QbiLoss,
                amount: dec!(20000),
                origin_year: 2023,
            }],
        );
        let result =
            calculate_qbi_deduction(&input(&businesses, dec!(120000), dec!(0)), &ledger, &config());
        assert_eq!(result.combined_qbi, dec!(30000));
        assert_eq!(result.deduction, dec!(6000.00));
        assert_eq!(result.deltas[0].used, dec!(20000));
        assert_eq!(result.deltas[0].originated, dec!(0));
    }

    #[test]
    fn sstb_phases_out_entirely_above_the_range() {
        let businesses = vec![business("law_firm", dec!(200000), dec!(100000), true)];
        let ledger = CarryoverLedger::empty(2024);
        let result =
            calculate_qbi_deduction(&input(&businesses, dec!(300000), dec!(0)), &ledger, &config());
        assert_eq!(result.deduction, dec!(0));
    }

    #[test]
    fn wage_limit_binds_above_the_range() {
        // 20% of 200,000 is 40,000 but 50% of 50,000 in wages is only
        // 25,000; above the range the limit applies in full.
        let businesses = vec![business("b1", dec!(200000), dec!(50000), false)];
        let ledger = CarryoverLedger::empty(2024);
        let result =
            calculate_qbi_deduction(&input(&businesses, dec!(300000), dec!(0)), &ledger, &config());
        assert_eq!(result.deduction, dec!(25000.00));
        assert!(result.components[0].wage_limited);
    }

    #[test]
    fn wage_limit_phases_in_across_the_range() {
        // 2024 single threshold 191,950, range 50,000. Taxable income
        // 216,950 is halfway: half of the 25,000 excess is disallowed.
        let businesses = vec![business("b1", dec!(200000), dec!(30000), false)];
        let ledger = CarryoverLedger::empty(2024);
        let result =
            calculate_qbi_deduction(&input(&businesses, dec!(216950), dec!(0)), &ledger, &config());
        // tentative 40,000, wage limit 15,000, half the 25,000 gap kept.
        assert_eq!(result.deduction, dec!(27500.00));
    }

    #[test]
    fn sstb_scales_by_the_applicable_percentage_inside_the_range() {
        // Halfway through the range an SSTB counts half its QBI and wages.
        let businesses = vec![business("clinic", dec!(100000), dec!(100000), true)];
        let ledger = CarryoverLedger::empty(2024);
        let result =
            calculate_qbi_deduction(&input(&businesses, dec!(216950), dec!(0)), &ledger, &config());
        // tentative 20% of 50,000 = 10,000; wage limit 50% of 50,000 =
        // 25,000 does not bind.
        assert_eq!(result.deduction, dec!(10000.00));
    }
}
