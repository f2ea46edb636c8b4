//! Form 2210 pattern: penalty for underpayment of estimated tax. The
//! required annual payment is the lesser of 90% of the current year's tax
//! and the prior-year safe harbor (110% above the high-AGI threshold).
//! The short method charges a flat half-year of interest on the annual
//! shortfall; the regular method runs actual day counts per quarterly
//! installment.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::{PenaltyMethod, TaxYearConfig};
use crate::money::to_money;
use crate::result::FormSection;
use crate::snapshot::EstimatedPayment;

#[derive(Debug, Clone)]
pub struct UnderpaymentInput<'a> {
    /// Total tax for the year before any estimated-tax penalty.
    pub current_year_tax: Decimal,
    pub withholding: Decimal,
    pub estimated_payments: &'a [EstimatedPayment],
    pub prior_year_tax: Option<Decimal>,
    pub prior_year_agi: Option<Decimal>,
    pub method: PenaltyMethod,
}

/// One quarterly installment under the regular method.
#[derive(Debug, Clone)]
pub struct InstallmentPeriod {
    pub due_date: NaiveDate,
    pub required: Decimal,
    pub timely_paid: Decimal,
    pub underpaid: Decimal,
    /// Days from the due date to the filing deadline.
    pub days: i64,
}

#[derive(Debug, Clone)]
pub struct UnderpaymentResult {
    pub required_annual_payment: Decimal,
    /// 90% of the current year's tax.
    pub current_year_leg: Decimal,
    /// Prior-year tax scaled by the high-AGI factor, when available.
    pub prior_year_leg: Option<Decimal>,
    pub total_payments: Decimal,
    pub penalty: Decimal,
    /// Populated by the regular method only.
    pub periods: Vec<InstallmentPeriod>,
    /// Present when no penalty applies, naming the rule that waived it.
    pub waiver: Option<String>,
}

/// Never fails: every business outcome, including "no penalty", is a
/// result, not an error.
pub fn calculate_underpayment(
    input: &UnderpaymentInput,
    config: &TaxYearConfig,
) -> UnderpaymentResult {
    let estimated_total: Decimal = input.estimated_payments.iter().map(|p| p.amount).sum();
    let total_payments = input.withholding + estimated_total;

    let current_year_leg = to_money(input.current_year_tax * config.safe_harbor_current_year_factor);
    let prior_year_leg = match input.prior_year_tax {
        Some(prior) if prior > Decimal::ZERO => {
            let high_agi = input
                .prior_year_agi
                .map(|agi| agi > config.safe_harbor_agi_threshold)
                .unwrap_or(false);
            let factor = if high_agi {
                config.safe_harbor_high_agi_factor
            } else {
                Decimal::ONE
            };
            Some(to_money(prior * factor))
        }
        // A prior year with no tax liability means no prior-year leg at
        // all, not a leg of zero.
        _ => None,
    };
    let required = match prior_year_leg {
        Some(leg) => current_year_leg.min(leg),
        None => current_year_leg,
    };

    let mut result = UnderpaymentResult {
        required_annual_payment: required,
        current_year_leg,
        prior_year_leg,
        total_payments,
        penalty: Decimal::ZERO,
        periods: Vec::new(),
        waiver: None,
    };

    if input.current_year_tax - total_payments < config.underpayment_de_minimis {
        result.waiver = Some(format!(
            "balance due after payments is under the {} de minimis",
            config.underpayment_de_minimis
        ));
        return result;
    }
    // Withholding counts as timely no matter when it landed, so covering
    // the requirement through withholding alone ends the analysis. Dated
    // estimated payments still face the timing test below.
    if input.withholding >= required {
        result.waiver = Some("required annual payment covered by withholding".into());
        return result;
    }

    match input.method {
        PenaltyMethod::Short => {
            let shortfall = (required - total_payments).max(Decimal::ZERO);
            if shortfall == Decimal::ZERO {
                result.waiver = Some("required annual payment met through payments".into());
            } else {
                result.penalty =
                    to_money(shortfall * config.underpayment_annual_rate * dec!(0.5));
            }
        }
        PenaltyMethod::Regular => {
            result.periods = installment_periods(input, config, required);
            let rate = config.underpayment_annual_rate;
            let raw: Decimal = result
                .periods
                .iter()
                .map(|p| p.underpaid * rate * Decimal::from(p.days) / dec!(365))
                .sum();
            result.penalty = to_money(raw);
        }
    }
    result
}

/// Regular-method installment schedule. Withholding counts as paid evenly
/// across the four due dates; estimated payments count toward an
/// installment only when dated on or before its due date, consumed oldest
/// payment first.
fn installment_periods(
    input: &UnderpaymentInput,
    config: &TaxYearConfig,
    required: Decimal,
) -> Vec<InstallmentPeriod> {
    let due_dates = config.installment_due_dates();
    let filing_due = config.filing_due_date();

    let quarter = to_money(required / dec!(4));
    let mut installments = [quarter; 4];
    // The last installment absorbs rounding so the four sum exactly.
    installments[3] = required - quarter * dec!(3);

    let mut payments: Vec<(NaiveDate, Decimal)> = input
        .estimated_payments
        .iter()
        .map(|p| (p.date, p.amount))
        .collect();
    payments.sort_by_key(|(date, _)| *date);
    let withholding_quarter = input.withholding / dec!(4);

    let mut periods = Vec::with_capacity(4);
    let mut payment_idx = 0usize;
    let mut carry = Decimal::ZERO;
    for (i, due_date) in due_dates.into_iter().enumerate() {
        let mut available = carry + withholding_quarter;
        while payment_idx < payments.len() && payments[payment_idx].0 <= due_date {
            available += payments[payment_idx].1;
            payment_idx += 1;
        }
        let timely_paid = available.min(installments[i]);
        carry = available - timely_paid;
        periods.push(InstallmentPeriod {
            due_date,
            required: installments[i],
            timely_paid,
            underpaid: installments[i] - timely_paid,
            days: (filing_due - due_date).num_days(),
        });
    }
    periods
}

impl UnderpaymentResult {
    pub fn section(&self) -> FormSection {
        let mut section = FormSection::new("form_2210");
        section.line(
            "line_5_ninety_percent",
            self.current_year_leg,
            "90% of the current year's tax",
        );
        if let Some(leg) = self.prior_year_leg {
            section.line(
                "line_8_prior_year_safe_harbor",
                leg,
                "prior-year tax scaled for the high-AGI factor where it applies",
            );
        }
        section.line(
            "line_9_required_annual_payment",
            self.required_annual_payment,
            "lesser of the 90% and prior-year legs",
        );
        section.line(
            "line_6_total_payments",
            to_money(self.total_payments),
            "withholding plus estimated payments",
        );
        section.line(
            "line_19_penalty",
            self.penalty,
            match &self.waiver {
                Some(reason) => format!("no penalty: {reason}"),
                None => "estimated tax underpayment penalty".to_string(),
            },
        );
        section
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TaxYearConfig {
        TaxYearConfig::for_year(2024).unwrap()
    }

    fn input(tax: Decimal, withholding: Decimal) -> UnderpaymentInput<'static> {
        UnderpaymentInput {
            current_year_tax: tax,
            withholding,
            estimated_payments: &[],
            prior_year_tax: None,
            prior_year_agi: None,
            method: PenaltyMethod::Short,
        }
    }

    #[test]
    fn high_agi_safe_harbor_takes_one_hundred_ten_percent() {
        let mut input = input(dec!(20000), dec!(17600));
        input.prior_year_tax = Some(dec!(16000));
        input.prior_year_agi = Some(dec!(200000));
        let result = calculate_underpayment(&input, &config());
        assert_eq!(result.prior_year_leg, Some(dec!(17600.00)));
        assert_eq!(result.required_annual_payment, dec!(17600.00));
        assert_eq!(result.penalty, dec!(0));
        assert!(result.waiver.is_some());
    }

    #[test]
    fn de_minimis_balance_waives_the_penalty() {
        let result = calculate_underpayment(&input(dec!(5000), dec!(4100)), &config());
        assert_eq!(result.penalty, dec!(0));
        assert!(result.waiver.unwrap().contains("de minimis"));
    }

    #[test]
    fn no_prior_year_uses_the_ninety_percent_leg_alone() {
        let result = calculate_underpayment(&input(dec!(10000), dec!(2000)), &config());
        assert_eq!(result.prior_year_leg, None);
        assert_eq!(result.required_annual_payment, dec!(9000.00));
    }

    #[test]
    fn zero_prior_year_tax_is_no_safe_harbor() {
        let mut input = input(dec!(10000), dec!(2000));
        input.prior_year_tax = Some(dec!(0));
        let result = calculate_underpayment(&input, &config());
        assert_eq!(result.prior_year_leg, None);
    }

    #[test]
    fn short_method_charges_half_a_year_on_the_shortfall() {
        let result = calculate_underpayment(&input(dec!(10000), dec!(5000)), &config());
        // Required 9,000, paid 5,000: 4,000 x 8% x 0.5.
        assert_eq!(result.penalty, dec!(160.00));
    }

    #[test]
    fn regular_method_counts_days_per_installment() {
        let payments = vec![EstimatedPayment {
            date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            amount: dec!(8000),
        }];
        let input = UnderpaymentInput {
            current_year_tax: dec!(12000),
            withholding: Decimal::ZERO,
            estimated_payments: &payments,
            prior_year_tax: Some(dec!(8000)),
            prior_year_agi: Some(dec!(90000)),
            method: PenaltyMethod::Regular,
        };
        let result = calculate_underpayment(&input, &config());
        // Required annual payment 8,000; the single January payment is
        // timely only for the fourth installment. Three quarters of 2,000
        // accrue 8% for 365, 304 and 212 days respectively.
        assert_eq!(result.required_annual_payment, dec!(8000.00));
        let underpaid: Vec<Decimal> = result.periods.iter().map(|p| p.underpaid).collect();
        assert_eq!(underpaid, vec![dec!(2000), dec!(2000), dec!(2000), dec!(0)]);
        let days: Vec<i64> = result.periods.iter().map(|p| p.days).collect();
        assert_eq!(days, vec![365, 304, 212, 90]);
        assert_eq!(result.penalty, dec!(386.19));
    }

    #[test]
    fn withholding_spreads_evenly_across_quarters() {
        let input = UnderpaymentInput {
            current_year_tax: dec!(10000),
            withholding: dec!(6000),
            estimated_payments: &[],
            prior_year_tax: None,
            prior_year_agi: None,
            method: PenaltyMethod::Regular,
        };
        let result = calculate_underpayment(&input, &config());
        // Each installment of 2,250 sees 1,500 of withholding.
        for period in &result.periods {
            assert_eq!(period.underpaid, dec!(750.00));
        }
    }

    #[test]
    fn early_overpayment_carries_into_later_quarters() {
        let payments = vec![EstimatedPayment {
            date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            amount: dec!(5000),
        }];
        let input = UnderpaymentInput {
            current_year_tax: dec!(12000),
            withholding: Decimal::ZERO,
            estimated_payments: &payments,
            prior_year_tax: Some(dec!(8000)),
            prior_year_agi: None,
            method: PenaltyMethod::Regular,
        };
        let result = calculate_underpayment(&input, &config());
        // 5,000 paid in April covers the first two installments and half
        // of the third; only 1,000 plus the fourth quarter is late.
        let underpaid: Vec<Decimal> = result.periods.iter().map(|p| p.underpaid).collect();
        assert_eq!(underpaid, vec![dec!(0), dec!(0), dec!(1000.00), dec!(2000.00)]);
    }
}
