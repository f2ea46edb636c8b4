//! Normalized, read-only view of a taxpayer's year. Ingestion (OCR, manual
//! entry) happens upstream; by the time a snapshot reaches the engine it is
//! fully typed, and it is validated once here at the boundary so calculators
//! never re-check their inputs.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::FilingStatus;
use crate::error::EngineError;

/// Input root for a calculation run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FinancialSnapshot {
    pub tax_year: i32,
    pub filing_status: FilingStatus,

    #[serde(default)]
    #[schemars(with = "f64")]
    pub wages: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub interest_income: Decimal,
    /// Total ordinary dividends; the qualified portion is a subset.
    #[serde(default)]
    #[schemars(with = "f64")]
    pub ordinary_dividends: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub qualified_dividends: Decimal,
    /// Non-passive business income (Schedule C), before the QBI deduction.
    #[serde(default)]
    #[schemars(with = "f64")]
    pub business_income: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub other_income: Decimal,

    /// Current-year short/long-term capital gain or loss, before carryovers
    /// and before installment-sale recognition.
    #[serde(default)]
    #[schemars(with = "f64")]
    pub short_term_gain_loss: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub long_term_gain_loss: Decimal,

    #[serde(default)]
    #[schemars(with = "f64")]
    pub above_the_line_deductions: Decimal,
    /// Itemized total; the engine takes the larger of this and the standard
    /// deduction.
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub itemized_deductions: Option<Decimal>,

    #[serde(default)]
    #[schemars(with = "f64")]
    pub withholding: Decimal,
    #[serde(default)]
    pub estimated_payments: Vec<EstimatedPayment>,
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub prior_year_tax: Option<Decimal>,
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub prior_year_agi: Option<Decimal>,

    #[serde(default)]
    pub installment_sales: Vec<InstallmentSale>,
    #[serde(default)]
    pub method_changes: Vec<MethodChange>,
    #[serde(default)]
    pub passive_activities: Vec<PassiveActivity>,
    #[serde(default)]
    pub qbi_businesses: Vec<QbiBusiness>,
}

/// A dated quarterly estimated tax payment.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EstimatedPayment {
    pub date: NaiveDate,
    #[schemars(with = "f64")]
    pub amount: Decimal,
}

/// One installment sale (Form 6252). `sale_year` may predate the current
/// year; only year-of-sale amounts (recapture, deemed payments) are
/// recognized once.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InstallmentSale {
    pub description: String,
    pub sale_year: i32,
    #[schemars(with = "f64")]
    pub selling_price: Decimal,
    #[schemars(with = "f64")]
    pub adjusted_basis: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub selling_expenses: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub depreciation_recapture: Decimal,
    /// Mortgage or other debt assumed by the buyer.
    #[serde(default)]
    #[schemars(with = "f64")]
    pub mortgage_assumed: Decimal,
    /// Principal collected during the current tax year.
    #[serde(default)]
    #[schemars(with = "f64")]
    pub principal_received: Decimal,
}

/// An accounting-method change producing a section 481(a) adjustment.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MethodChange {
    pub description: String,
    pub change_year: i32,
    /// Positive: omitted income to pick up. Negative: omitted deductions.
    #[schemars(with = "f64")]
    pub adjustment: Decimal,
    /// Election to take the whole adjustment in the change year regardless
    /// of size.
    #[serde(default)]
    pub one_year_election: bool,
}

/// One passive activity (Form 8582).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PassiveActivity {
    /// Stable identifier; suspended losses are keyed to it across years.
    pub id: String,
    pub description: String,
    /// Net income (positive) or loss (negative) for the year.
    #[schemars(with = "f64")]
    pub net_income_or_loss: Decimal,
    #[serde(default)]
    pub rental_real_estate: bool,
    #[serde(default)]
    pub active_participation: bool,
    /// Complete taxable disposition this year releases the activity's
    /// suspended losses in full.
    #[serde(default)]
    pub disposed: bool,
}

/// One trade or business for the section 199A deduction.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QbiBusiness {
    pub id: String,
    pub description: String,
    #[schemars(with = "f64")]
    pub qualified_business_income: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub w2_wages: Decimal,
    /// Unadjusted basis immediately after acquisition of qualified property.
    #[serde(default)]
    #[schemars(with = "f64")]
    pub ubia: Decimal,
    /// Specified service trade or business.
    #[serde(default)]
    pub sstb: bool,
}

impl FinancialSnapshot {
    /// Boundary validation: reject out-of-domain values before any
    /// calculator runs. Never partially processed.
    pub fn validate(&self) -> Result<(), EngineError> {
        const FORM: &str = "snapshot";
        let non_negative: [(&str, Decimal); 5] = [
            ("wages", self.wages),
            ("interest_income", self.interest_income),
            ("ordinary_dividends", self.ordinary_dividends),
            ("qualified_dividends", self.qualified_dividends),
            ("withholding", self.withholding),
        ];
        for (name, value) in non_negative {
            if value < Decimal::ZERO {
                return Err(EngineError::validation(
                    FORM,
                    format!("{name} must not be negative, got {value}"),
                ));
            }
        }
        if self.qualified_dividends > self.ordinary_dividends {
            return Err(EngineError::validation(
                FORM,
                format!(
                    "qualified dividends {} exceed ordinary dividends {}",
                    self.qualified_dividends, self.ordinary_dividends
                ),
            ));
        }
        for payment in &self.estimated_payments {
            if payment.amount < Decimal::ZERO {
                return Err(EngineError::validation(
                    FORM,
                    format!("estimated payment on {} is negative", payment.date),
                ));
            }
        }
        for sale in &self.installment_sales {
            if sale.selling_price < Decimal::ZERO
                || sale.adjusted_basis < Decimal::ZERO
                || sale.selling_expenses < Decimal::ZERO
                || sale.depreciation_recapture < Decimal::ZERO
                || sale.mortgage_assumed < Decimal::ZERO
                || sale.principal_received < Decimal::ZERO
            {
                return Err(EngineError::validation(
                    FORM,
                    format!("installment sale '{}' has a negative amount", sale.description),
                ));
            }
            if sale.sale_year > self.tax_year {
                return Err(EngineError::validation(
                    FORM,
                    format!(
                        "installment sale '{}' has sale year {} after tax year {}",
                        sale.description, sale.sale_year, self.tax_year
                    ),
                ));
            }
        }
        for change in &self.method_changes {
            if change.change_year > self.tax_year {
                return Err(EngineError::validation(
                    FORM,
                    format!(
                        "method change '{}' has change year {} after tax year {}",
                        change.description, change.change_year, self.tax_year
                    ),
                ));
            }
        }
        let mut seen = std::collections::HashSet::new();
        for activity in &self.passive_activities {
            if !seen.insert(&activity.id) {
                return Err(EngineError::validation(
                    FORM,
                    format!("duplicate passive activity id '{}'", activity.id),
                ));
            }
        }
        for business in &self.qbi_businesses {
            if business.w2_wages < Decimal::ZERO || business.ubia < Decimal::ZERO {
                return Err(EngineError::validation(
                    FORM,
                    format!("qbi business '{}' has a negative amount", business.id),
                ));
            }
        }
        Ok(())
    }

    /// Content hash of the snapshot, for downstream memoization of the
    /// calculation result. Identical snapshots hash identically.
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(self).expect("snapshot serializes");
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn minimal(year: i32) -> FinancialSnapshot {
        serde_json::from_value(serde_json::json!({
            "tax_year": year,
            "filing_status": "single",
        }))
        .unwrap()
    }

    #[test]
    fn defaults_deserialize_to_zero() {
        let snapshot = minimal(2024);
        assert_eq!(snapshot.wages, dec!(0));
        assert!(snapshot.installment_sales.is_empty());
        assert!(snapshot.itemized_deductions.is_none());
        snapshot.validate().unwrap();
    }

    #[test]
    fn negative_wages_rejected_at_entry() {
        let mut snapshot = minimal(2024);
        snapshot.wages = dec!(-1);
        let err = snapshot.validate().unwrap_err();
        assert!(matches!(err, EngineError::Validation { form: "snapshot", .. }));
    }

    #[test]
    fn qualified_dividends_bounded_by_ordinary() {
        let mut snapshot = minimal(2024);
        snapshot.ordinary_dividends = dec!(100);
        snapshot.qualified_dividends = dec!(150);
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn future_sale_year_rejected() {
        let mut snapshot = minimal(2024);
        snapshot.installment_sales.push(InstallmentSale {
            description: "land".into(),
            sale_year: 2025,
            selling_price: dec!(100000),
            adjusted_basis: dec!(60000),
            selling_expenses: dec!(0),
            depreciation_recapture: dec!(0),
            mortgage_assumed: dec!(0),
            principal_received: dec!(0),
        });
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn duplicate_activity_ids_rejected() {
        let mut snapshot = minimal(2024);
        for _ in 0..2 {
            snapshot.passive_activities.push(PassiveActivity {
                id: "a".into(),
                description: "rental".into(),
                net_income_or_loss: dec!(-1000),
                rental_real_estate: true,
                active_participation: true,
                disposed: false,
            });
        }
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn digest_is_stable_and_input_sensitive() {
        let a = minimal(2024);
        let b = minimal(2024);
        assert_eq!(a.digest(), b.digest());

        let mut c = minimal(2024);
        c.wages = dec!(1);
        assert_ne!(a.digest(), c.digest());
    }
}
