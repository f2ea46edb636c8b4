//! Rate schedule engine: progressive tax keyed by filing status, plus the
//! Schedule D worksheet stacking of preferential capital-gains rates. Every
//! form that recomputes tax (the preferential worksheet, the Form 2210
//! required-payment test) goes through here so bracket-boundary behavior is
//! identical everywhere.

use rust_decimal::Decimal;

use crate::config::{FilingStatus, TaxYearConfig};
use crate::money::{progressive_tax, to_money};

/// Ordinary income tax under the year's bracket schedule.
pub fn compute_tax(taxable_income: Decimal, status: FilingStatus, config: &TaxYearConfig) -> Decimal {
    progressive_tax(taxable_income, &config.ordinary_brackets(status))
}

/// Tax with the preferential 0/15/20 percent treatment of net capital gain.
///
/// The gain stacks on top of ordinary income: the portion of each
/// preferential band above ordinary income absorbs gain at that band's rate.
/// Never more than the all-ordinary computation.
pub fn compute_tax_with_capital_gains(
    taxable_income: Decimal,
    net_capital_gain: Decimal,
    status: FilingStatus,
    config: &TaxYearConfig,
) -> Decimal {
    let gain = net_capital_gain.max(Decimal::ZERO).min(taxable_income.max(Decimal::ZERO));
    if gain.is_zero() {
        return compute_tax(taxable_income, status, config);
    }
    let ordinary = taxable_income - gain;
    let ordinary_tax = compute_tax(ordinary, status, config);

    let mut gain_tax = Decimal::ZERO;
    let mut taxed_from = ordinary.max(Decimal::ZERO);
    let top = taxable_income;
    for bracket in config.capital_gains_brackets(status) {
        let band_top = bracket.upper.unwrap_or(top).min(top);
        if band_top > taxed_from {
            gain_tax += (band_top - taxed_from) * bracket.rate;
            taxed_from = band_top;
        }
        if taxed_from >= top {
            break;
        }
    }

    let stacked = to_money(ordinary_tax + gain_tax);
    stacked.min(compute_tax(taxable_income, status, config))
}
