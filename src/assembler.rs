//! Return assembly: runs every applicable schedule in dependency order,
//! applies each schedule's carryover deltas to the ledger as it goes, and
//! publishes the assembled result with the next-year carryover package.
//!
//! Schedules with no inputs and no relevant carryover balance are skipped
//! entirely rather than emitted as all-zero sections.

use rust_decimal::Decimal;

use crate::config::{PenaltyMethod, TaxYearConfig};
use crate::error::EngineError;
use crate::forms::{
    calculate_capital_gains, calculate_installment_sales, calculate_method_changes,
    calculate_passive_losses, calculate_qbi_deduction, calculate_underpayment, CapitalGainsInput,
    QbiInput, UnderpaymentInput,
};
use crate::ledger::{CarryoverCategory, CarryoverLedger, CarryoverRecord};
use crate::money::to_money;
use crate::result::{CalculationResult, FormSection};
use crate::schedule::compute_tax_with_capital_gains;
use crate::snapshot::FinancialSnapshot;

/// Assemble one tax year. `carryovers` is the prior year's carryforward
/// package; the result carries the package for the next year.
pub fn assemble_return(
    snapshot: &FinancialSnapshot,
    carryovers: Vec<CarryoverRecord>,
    penalty_method: PenaltyMethod,
) -> Result<CalculationResult, EngineError> {
    snapshot.validate()?;
    let config = TaxYearConfig::for_year(snapshot.tax_year)?;
    let mut ledger = CarryoverLedger::new(snapshot.tax_year, carryovers);
    let mut forms: Vec<FormSection> = Vec::new();

    log::info!(
        "assembling {} return for tax year {}",
        snapshot.filing_status,
        snapshot.tax_year
    );

    // Installment sales first: recognized gain joins the long-term bucket
    // and recapture is ordinary income.
    let mut installment_gain = Decimal::ZERO;
    let mut recapture_income = Decimal::ZERO;
    if !snapshot.installment_sales.is_empty() {
        let installment =
            calculate_installment_sales(&snapshot.installment_sales, snapshot.tax_year)?;
        installment_gain = installment.total_recognized_gain;
        recapture_income = installment.total_recapture_income;
        forms.push(installment.section());
    }

    let st_carry = ledger.balance(&CarryoverCategory::ShortTermCapitalLoss);
    let lt_carry = ledger.balance(&CarryoverCategory::LongTermCapitalLoss);
    let mut capital_gain_for_agi = Decimal::ZERO;
    let mut net_capital_gain = Decimal::ZERO;
    if snapshot.short_term_gain_loss != Decimal::ZERO
        || snapshot.long_term_gain_loss != Decimal::ZERO
        || installment_gain != Decimal::ZERO
        || st_carry > Decimal::ZERO
        || lt_carry > Decimal::ZERO
    {
        let capital = calculate_capital_gains(&CapitalGainsInput {
            short_term: snapshot.short_term_gain_loss,
            long_term: snapshot.long_term_gain_loss + installment_gain,
            short_term_carryover: st_carry,
            long_term_carryover: lt_carry,
            loss_cap: config.capital_loss_cap(snapshot.filing_status),
        });
        capital_gain_for_agi = capital.gain_or_loss_for_agi;
        net_capital_gain = capital.net_capital_gain;
        let section = capital.section();
        for delta in &section.deltas {
            ledger.apply(delta)?;
        }
        forms.push(section);
    }

    let mut method_change_income = Decimal::ZERO;
    if !snapshot.method_changes.is_empty()
        || ledger.balance(&CarryoverCategory::Section481Adjustment) != Decimal::ZERO
    {
        let method = calculate_method_changes(&snapshot.method_changes, &ledger, &config);
        method_change_income = method.recognized;
        let section = method.section();
        for delta in &section.deltas {
            ledger.apply(delta)?;
        }
        forms.push(section);
    }

    // Everything except passive activities, for the special allowance
    // phase-out and as the base the passive result lands on.
    let magi_before_passive = snapshot.wages
        + snapshot.interest_income
        + snapshot.ordinary_dividends
        + snapshot.business_income
        + snapshot.other_income
        + capital_gain_for_agi
        + recapture_income
        + method_change_income
        - snapshot.above_the_line_deductions;

    let mut passive_effect = Decimal::ZERO;
    if !snapshot.passive_activities.is_empty() {
        let passive = calculate_passive_losses(
            &snapshot.passive_activities,
            &ledger,
            magi_before_passive,
            &config,
        );
        passive_effect = passive.agi_effect;
        let section = passive.section();
        for delta in &section.deltas {
            ledger.apply(delta)?;
        }
        forms.push(section);
    }

    let agi = to_money(magi_before_passive + passive_effect);
    let deduction = config
        .standard_deduction(snapshot.filing_status)
        .max(snapshot.itemized_deductions.unwrap_or(Decimal::ZERO));
    let taxable_before_qbi = (agi - deduction).max(Decimal::ZERO);

    // Preferential-rate income for both the QBI limitation and the rate
    // schedule: net capital gain plus qualified dividends.
    let preferential = net_capital_gain + snapshot.qualified_dividends;

    let mut qbi_deduction = Decimal::ZERO;
    if !snapshot.qbi_businesses.is_empty()
        || ledger.balance(&CarryoverCategory::QbiLoss) > Decimal::ZERO
    {
        let qbi = calculate_qbi_deduction(
            &QbiInput {
                businesses: &snapshot.qbi_businesses,
                taxable_income_before_qbi: taxable_before_qbi,
                net_capital_gain: preferential,
                filing_status: snapshot.filing_status,
            },
            &ledger,
            &config,
        );
        qbi_deduction = qbi.deduction;
        let section = qbi.section();
        for delta in &section.deltas {
            ledger.apply(delta)?;
        }
        forms.push(section);
    }

    let taxable_income = (taxable_before_qbi - qbi_deduction).max(Decimal::ZERO);
    let income_tax = compute_tax_with_capital_gains(
        taxable_income,
        preferential,
        snapshot.filing_status,
        &config,
    );

    let underpayment = calculate_underpayment(
        &UnderpaymentInput {
            current_year_tax: income_tax,
            withholding: snapshot.withholding,
            estimated_payments: &snapshot.estimated_payments,
            prior_year_tax: snapshot.prior_year_tax,
            prior_year_agi: snapshot.prior_year_agi,
            method: penalty_method,
        },
        &config,
    );
    let penalty = underpayment.penalty;
    forms.push(underpayment.section());

    let mut summary = FormSection::new("form_1040");
    summary.line("line_11_agi", agi, "adjusted gross income");
    summary.line(
        "line_12_deduction",
        deduction,
        if snapshot.itemized_deductions.unwrap_or(Decimal::ZERO) > config.standard_deduction(snapshot.filing_status) {
            "itemized deductions"
        } else {
            "standard deduction"
        },
    );
    if qbi_deduction > Decimal::ZERO {
        summary.line(
            "line_13_qbi_deduction",
            qbi_deduction,
            "qualified business income deduction",
        );
    }
    summary.line("line_15_taxable_income", taxable_income, "taxable income");
    summary.line(
        "line_16_tax",
        income_tax,
        "tax with preferential capital gain rates",
    );
    summary.line(
        "line_38_penalty",
        penalty,
        "estimated tax underpayment penalty",
    );
    forms.insert(0, summary);

    Ok(CalculationResult {
        tax_year: snapshot.tax_year,
        filing_status: snapshot.filing_status,
        snapshot_digest: snapshot.digest(),
        forms,
        agi,
        taxable_income,
        income_tax,
        underpayment_penalty: penalty,
        total_liability: to_money(income_tax + penalty),
        carryover_package: ledger.carryforward_package(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilingStatus;
    use rust_decimal_macros::dec;

    fn snapshot(year: i32) -> FinancialSnapshot {
        serde_json::from_value(serde_json::json!({
            "tax_year": year,
            "filing_status": "single",
        }))
        .unwrap()
    }

    #[test]
    fn wage_only_return_uses_the_standard_deduction() {
        let mut snap = snapshot(2024);
        snap.wages = dec!(89600);
        snap.withholding = dec!(15000);
        let result = assemble_return(&snap, vec![], PenaltyMethod::Short).unwrap();
        assert_eq!(result.agi, dec!(89600.00));
        assert_eq!(result.taxable_income, dec!(75000.00));
        assert_eq!(result.income_tax, dec!(11553.00));
        assert_eq!(result.underpayment_penalty, dec!(0));
        assert!(result.carryover_package.is_empty());
        // Skipped schedules are absent, not zero-filled.
        assert!(result.form("schedule_d").is_none());
        assert!(result.form("form_8582").is_none());
    }

    #[test]
    fn unknown_tax_year_is_fatal() {
        let snap = snapshot(2030);
        let err = assemble_return(&snap, vec![], PenaltyMethod::Short).unwrap_err();
        assert_eq!(err, EngineError::UnknownTaxYear(2030));
    }

    #[test]
    fn capital_loss_caps_agi_and_packages_the_rest() {
        let mut snap = snapshot(2024);
        snap.wages = dec!(100000);
        snap.withholding = dec!(20000);
        snap.short_term_gain_loss = dec!(-4000);
        snap.long_term_gain_loss = dec!(-6000);
        let result = assemble_return(&snap, vec![], PenaltyMethod::Short).unwrap();
        assert_eq!(result.agi, dec!(97000.00));
        let package_total: Decimal = result.carryover_package.iter().map(|r| r.amount).sum();
        assert_eq!(package_total, dec!(7000.00));
        for record in &result.carryover_package {
            assert_eq!(record.origin_year, 2024);
        }
    }

    #[test]
    fn installment_gain_reaches_the_preferential_rate() {
        let mut snap = snapshot(2024);
        snap.wages = dec!(60000);
        snap.withholding = dec!(12000);
        snap.installment_sales.push(crate::snapshot::InstallmentSale {
            description: "acreage".into(),
            sale_year: 2024,
            selling_price: dec!(100000),
            adjusted_basis: dec!(63000),
            selling_expenses: dec!(2000),
            depreciation_recapture: dec!(0),
            mortgage_assumed: dec!(0),
            principal_received: dec!(10000),
        });
        let result = assemble_return(&snap, vec![], PenaltyMethod::Short).unwrap();
        // GPP 0.35, 10,000 received: 3,500 recognized as long-term gain.
        assert_eq!(result.form("form_6252").is_some(), true);
        assert_eq!(
            result.form("schedule_d").unwrap().amount("net_capital_gain"),
            Some(dec!(3500.00))
        );
        assert_eq!(result.agi, dec!(63500.00));
    }

    #[test]
    fn qbi_runs_on_carryforward_alone() {
        let mut snap = snapshot(2024);
        snap.wages = dec!(50000);
        snap.withholding = dec!(10000);
        let carryovers = vec![CarryoverRecord {
            category: CarryoverCategory::QbiLoss,
            amount: dec!(5000),
            origin_year: 2023,
        }];
        let result = assemble_return(&snap, carryovers, PenaltyMethod::Short).unwrap();
        // No businesses this year: the loss carries forward intact.
        assert!(result.form("form_8995").is_some());
        assert_eq!(result.carryover_package.len(), 1);
        assert_eq!(result.carryover_package[0].amount, dec!(5000));
    }

    #[test]
    fn married_separate_uses_the_reduced_loss_cap() {
        let mut snap = snapshot(2024);
        snap.filing_status = FilingStatus::MarriedSeparate;
        snap.wages = dec!(50000);
        snap.withholding = dec!(9000);
        snap.short_term_gain_loss = dec!(-5000);
        let result = assemble_return(&snap, vec![], PenaltyMethod::Short).unwrap();
        assert_eq!(result.agi, dec!(48500.00));
    }
}
