//! Structured calculation output: per-form line items keyed to the IRS line
//! numbers they represent, plus the next-year carryover package. Every
//! number carries a plain-language explanation so downstream reporting can
//! reproduce it without recomputing.

use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;
use tabled::Tabled;

use crate::config::FilingStatus;
use crate::ledger::{CarryoverRecord, LedgerDelta};

/// One published form line: IRS-style key, finalized amount, and the
/// explanation of how it was computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
pub struct LineItem {
    #[tabled(rename = "Line")]
    pub key: String,
    #[tabled(rename = "Amount")]
    pub amount: Decimal,
    #[tabled(rename = "Explanation")]
    pub explanation: String,
}

impl LineItem {
    pub fn new(key: impl Into<String>, amount: Decimal, explanation: impl Into<String>) -> Self {
        LineItem {
            key: key.into(),
            amount,
            explanation: explanation.into(),
        }
    }
}

/// One form's contribution to the return: its line items plus the carryover
/// deltas it proposed. Owned by the producing calculator until the
/// assembler consumes it.
#[derive(Debug, Clone, Serialize)]
pub struct FormSection {
    pub form: &'static str,
    pub lines: Vec<LineItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deltas: Vec<LedgerDelta>,
}

impl FormSection {
    pub fn new(form: &'static str) -> Self {
        FormSection {
            form,
            lines: Vec::new(),
            deltas: Vec::new(),
        }
    }

    pub fn line(&mut self, key: impl Into<String>, amount: Decimal, explanation: impl Into<String>) {
        self.lines.push(LineItem::new(key, amount, explanation));
    }

    pub fn amount(&self, key: &str) -> Option<Decimal> {
        self.lines.iter().find(|l| l.key == key).map(|l| l.amount)
    }
}

/// CSV record for line-item export.
#[derive(Debug, Serialize)]
struct LineItemCsvRecord<'a> {
    form: &'a str,
    key: &'a str,
    amount: String,
    explanation: &'a str,
}

/// The assembled return: every form section, the headline aggregates, and
/// the next-year carryover package.
#[derive(Debug, Clone, Serialize)]
pub struct CalculationResult {
    pub tax_year: i32,
    pub filing_status: FilingStatus,
    /// sha256 of the input snapshot; cache key for memoizing this result.
    pub snapshot_digest: String,
    pub forms: Vec<FormSection>,
    pub agi: Decimal,
    pub taxable_income: Decimal,
    pub income_tax: Decimal,
    pub underpayment_penalty: Decimal,
    pub total_liability: Decimal,
    pub carryover_package: Vec<CarryoverRecord>,
}

impl CalculationResult {
    pub fn form(&self, name: &str) -> Option<&FormSection> {
        self.forms.iter().find(|f| f.form == name)
    }

    /// Write every line item as CSV.
    pub fn write_csv<W: Write>(&self, writer: W) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        for section in &self.forms {
            for line in &section.lines {
                wtr.serialize(LineItemCsvRecord {
                    form: section.form,
                    key: &line.key,
                    amount: line.amount.to_string(),
                    explanation: &line.explanation,
                })?;
            }
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn section_lookup_by_key() {
        let mut section = FormSection::new("schedule_d");
        section.line("line_16_total_gain_loss", dec!(-10000), "combined net loss");
        assert_eq!(section.amount("line_16_total_gain_loss"), Some(dec!(-10000)));
        assert_eq!(section.amount("missing"), None);
    }

    #[test]
    fn csv_export_covers_all_sections() {
        let mut a = FormSection::new("schedule_d");
        a.line("line_21_allowed_loss", dec!(-3000), "capped");
        let mut b = FormSection::new("form_2210");
        b.line("line_17_penalty", dec!(0), "safe harbor met");
        let result = CalculationResult {
            tax_year: 2024,
            filing_status: FilingStatus::Single,
            snapshot_digest: "0".repeat(64),
            forms: vec![a, b],
            agi: dec!(50000),
            taxable_income: dec!(35400),
            income_tax: dec!(4016),
            underpayment_penalty: dec!(0),
            total_liability: dec!(4016),
            carryover_package: vec![],
        };

        let mut out = Vec::new();
        result.write_csv(&mut out).unwrap();
        let csv = String::from_utf8(out).unwrap();
        assert!(csv.contains("schedule_d,line_21_allowed_loss,-3000"));
        assert!(csv.contains("form_2210,line_17_penalty,0"));
    }
}
