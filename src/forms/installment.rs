//! Form 6252 pattern: installment-sale income recognition. Each year's
//! principal collections recognize gain at the sale's gross-profit
//! percentage; depreciation recapture is ordinary income entirely in the
//! year of sale, and buyer-assumed debt beyond basis is a deemed payment.

use rust_decimal::Decimal;

use crate::error::EngineError;
use crate::money::{safe_divide, to_money, to_rate};
use crate::result::FormSection;
use crate::snapshot::InstallmentSale;

/// Per-sale recognition outcome.
#[derive(Debug, Clone)]
pub struct InstallmentSaleOutcome {
    pub description: String,
    pub gross_profit: Decimal,
    pub contract_price: Decimal,
    /// Finalized to 4 decimals.
    pub gross_profit_percentage: Decimal,
    /// Payments credited this year (principal plus any deemed payment).
    pub payments_received: Decimal,
    /// Gain recognized this year; feeds the long-term capital gain bucket.
    pub recognized_gain: Decimal,
    /// Ordinary income, year of sale only.
    pub recapture_income: Decimal,
    pub explanation: String,
}

#[derive(Debug, Clone, Default)]
pub struct InstallmentResult {
    pub sales: Vec<InstallmentSaleOutcome>,
    pub total_recognized_gain: Decimal,
    pub total_recapture_income: Decimal,
}

pub fn calculate_installment_sales(
    sales: &[InstallmentSale],
    current_year: i32,
) -> Result<InstallmentResult, EngineError> {
    let mut result = InstallmentResult::default();
    for sale in sales {
        let outcome = recognize_sale(sale, current_year)?;
        result.total_recognized_gain += outcome.recognized_gain;
        result.total_recapture_income += outcome.recapture_income;
        result.sales.push(outcome);
    }
    Ok(result)
}

fn recognize_sale(
    sale: &InstallmentSale,
    current_year: i32,
) -> Result<InstallmentSaleOutcome, EngineError> {
    let basis_and_expenses = sale.adjusted_basis + sale.selling_expenses;
    // Recapture is taken out of gross profit: recognized as ordinary income
    // in the year of sale, it is added to basis for the percentage.
    let gross_profit =
        (sale.selling_price - basis_and_expenses - sale.depreciation_recapture).max(Decimal::ZERO);
    if gross_profit.is_zero() && sale.principal_received > Decimal::ZERO {
        log::debug!(
            "installment sale '{}' has no gross profit; collections are return of basis",
            sale.description
        );
    }

    // Contract price excludes assumed debt up to basis, and is never below
    // the gross profit.
    let contract_price = (sale.selling_price - sale.mortgage_assumed.min(basis_and_expenses))
        .max(gross_profit);
    let gross_profit_percentage = to_rate(safe_divide(gross_profit, contract_price, Decimal::ZERO));
    if gross_profit_percentage > Decimal::ONE {
        return Err(EngineError::validation(
            "form_6252",
            format!(
                "gross profit percentage {} exceeds 100% for '{}'",
                gross_profit_percentage, sale.description
            ),
        ));
    }

    let year_of_sale = sale.sale_year == current_year;
    // Debt assumed beyond basis is treated as a payment in the year of sale.
    let deemed_payment = if year_of_sale {
        (sale.mortgage_assumed - basis_and_expenses).max(Decimal::ZERO)
    } else {
        Decimal::ZERO
    };
    let payments_received = sale.principal_received + deemed_payment;
    let recognized_gain = to_money(payments_received * gross_profit_percentage);
    let recapture_income = if year_of_sale {
        sale.depreciation_recapture
    } else {
        Decimal::ZERO
    };

    let explanation = format!(
        "gross profit {gross_profit} over contract price {contract_price} \
         yields {gross_profit_percentage} applied to {payments_received} of payments"
    );
    Ok(InstallmentSaleOutcome {
        description: sale.description.clone(),
        gross_profit,
        contract_price,
        gross_profit_percentage,
        payments_received,
        recognized_gain,
        recapture_income,
        explanation,
    })
}

impl InstallmentResult {
    pub fn section(&self) -> FormSection {
        let mut section = FormSection::new("form_6252");
        for (idx, sale) in self.sales.iter().enumerate() {
            let n = idx + 1;
            section.line(
                format!("sale_{n}_line_14_gross_profit"),
                to_money(sale.gross_profit),
                format!("{}: selling price less basis, expenses and recapture", sale.description),
            );
            section.line(
                format!("sale_{n}_line_18_contract_price"),
                to_money(sale.contract_price),
                format!("{}: price less assumed debt up to basis", sale.description),
            );
            section.line(
                format!("sale_{n}_line_19_gross_profit_percentage"),
                sale.gross_profit_percentage,
                sale.explanation.clone(),
            );
            section.line(
                format!("sale_{n}_line_24_installment_sale_income"),
                sale.recognized_gain,
                format!("{}: gain recognized on this year's payments", sale.description),
            );
            if sale.recapture_income > Decimal::ZERO {
                section.line(
                    format!("sale_{n}_line_12_recapture_income"),
                    to_money(sale.recapture_income),
                    format!(
                        "{}: depreciation recapture, ordinary income in year of sale",
                        sale.description
                    ),
                );
            }
        }
        section.line(
            "total_installment_sale_income",
            to_money(self.total_recognized_gain),
            "recognized installment gain, carried to schedule d long-term",
        );
        section
    }
}
