//! Per-tax-year statutory tables: bracket schedules, phase-out thresholds and
//! fixed constants. Built once for a year, never mutated.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::money::Bracket;

/// Federal filing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FilingStatus {
    Single,
    MarriedJoint,
    MarriedSeparate,
    HeadOfHousehold,
}

impl FilingStatus {
    pub fn display(&self) -> &'static str {
        match self {
            FilingStatus::Single => "Single",
            FilingStatus::MarriedJoint => "Married Filing Jointly",
            FilingStatus::MarriedSeparate => "Married Filing Separately",
            FilingStatus::HeadOfHousehold => "Head of Household",
        }
    }
}

impl std::fmt::Display for FilingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Which Form 2210 computation to run. The short method approximates an
/// average half-year underpayment period; the regular method accrues
/// day-exact interest per quarterly installment. Callers choose; the engine
/// never picks silently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyMethod {
    #[default]
    Short,
    Regular,
}

/// Immutable statutory constants for one tax year.
#[derive(Debug, Clone)]
pub struct TaxYearConfig {
    pub year: i32,
    /// Annual deduction cap on net capital losses (halved for MFS).
    pub capital_loss_cap: Decimal,
    pub capital_loss_cap_mfs: Decimal,
    /// Rental real estate special allowance and its MAGI phase-out window.
    pub pal_allowance: Decimal,
    pub pal_phase_out_start: Decimal,
    pub pal_phase_out_range: Decimal,
    /// Flat reduction rate: fifty cents per dollar of MAGI over the start.
    pub pal_phase_out_rate: Decimal,
    /// Section 481(a): positive adjustments over this spread over 4 years.
    pub sec481_spread_threshold: Decimal,
    pub sec481_spread_years: i32,
    /// Form 2210 constants.
    pub underpayment_annual_rate: Decimal,
    pub underpayment_de_minimis: Decimal,
    pub safe_harbor_agi_threshold: Decimal,
    pub safe_harbor_high_agi_factor: Decimal,
    pub safe_harbor_current_year_factor: Decimal,
}

impl TaxYearConfig {
    /// Look up the statutory table for a year. Unknown years are fatal:
    /// the whole run aborts rather than computing against wrong constants.
    pub fn for_year(year: i32) -> Result<TaxYearConfig, EngineError> {
        match year {
            2024 | 2025 => Ok(TaxYearConfig {
                year,
                capital_loss_cap: dec!(3000),
                capital_loss_cap_mfs: dec!(1500),
                pal_allowance: dec!(25000),
                pal_phase_out_start: dec!(100000),
                pal_phase_out_range: dec!(50000),
                pal_phase_out_rate: dec!(0.50),
                sec481_spread_threshold: dec!(50000),
                sec481_spread_years: 4,
                underpayment_annual_rate: dec!(0.08),
                underpayment_de_minimis: dec!(1000),
                safe_harbor_agi_threshold: dec!(150000),
                safe_harbor_high_agi_factor: dec!(1.10),
                safe_harbor_current_year_factor: dec!(0.90),
            }),
            _ => Err(EngineError::UnknownTaxYear(year)),
        }
    }

    /// Ordinary income rate schedule for a filing status.
    pub fn ordinary_brackets(&self, status: FilingStatus) -> Vec<Bracket> {
        let thresholds: [Decimal; 6] = match (self.year, status) {
            (2024, FilingStatus::Single) => [
                dec!(11600),
                dec!(47150),
                dec!(100525),
                dec!(191950),
                dec!(243725),
                dec!(609350),
            ],
            (2024, FilingStatus::MarriedJoint) => [
                dec!(23200),
                dec!(94300),
                dec!(201050),
                dec!(383900),
                dec!(487450),
                dec!(731200),
            ],
            (2024, FilingStatus::MarriedSeparate) => [
                dec!(11600),
                dec!(47150),
                dec!(100525),
                dec!(191950),
                dec!(243725),
                dec!(365600),
            ],
            (2024, FilingStatus::HeadOfHousehold) => [
                dec!(16550),
                dec!(63100),
                dec!(100500),
                dec!(191950),
                dec!(243700),
                dec!(609350),
            ],
            (2025, FilingStatus::Single) => [
                dec!(11925),
                dec!(48475),
                dec!(103350),
                dec!(197300),
                dec!(250525),
                dec!(626350),
            ],
            (2025, FilingStatus::MarriedJoint) => [
                dec!(23850),
                dec!(96950),
                dec!(206700),
                dec!(394600),
                dec!(501050),
                dec!(751600),
            ],
            (2025, FilingStatus::MarriedSeparate) => [
                dec!(11925),
                dec!(48475),
                dec!(103350),
                dec!(197300),
                dec!(250525),
                dec!(375800),
            ],
            (2025, FilingStatus::HeadOfHousehold) => [
                dec!(17000),
                dec!(64850),
                dec!(103350),
                dec!(197300),
                dec!(250500),
                dec!(626350),
            ],
            // for_year admits only the years matched above
            _ => unreachable!("unsupported tax year {}", self.year),
        };
        let rates = [
            dec!(0.10),
            dec!(0.12),
            dec!(0.22),
            dec!(0.24),
            dec!(0.32),
            dec!(0.35),
        ];
        let mut brackets: Vec<Bracket> = thresholds
            .iter()
            .zip(rates.iter())
            .map(|(t, r)| Bracket::to(*t, *r))
            .collect();
        brackets.push(Bracket::above(dec!(0.37)));
        brackets
    }

    /// Preferential long-term capital gains schedule (0/15/20 percent).
    pub fn capital_gains_brackets(&self, status: FilingStatus) -> Vec<Bracket> {
        let (zero_to, fifteen_to) = match (self.year, status) {
            (2024, FilingStatus::Single) => (dec!(47025), dec!(518900)),
            (2024, FilingStatus::MarriedJoint) => (dec!(94050), dec!(583750)),
            (2024, FilingStatus::MarriedSeparate) => (dec!(47025), dec!(291850)),
            (2024, FilingStatus::HeadOfHousehold) => (dec!(63000), dec!(551350)),
            (2025, FilingStatus::Single) => (dec!(48350), dec!(533400)),
            (2025, FilingStatus::MarriedJoint) => (dec!(96700), dec!(600050)),
            (2025, FilingStatus::MarriedSeparate) => (dec!(48350), dec!(300000)),
            (2025, FilingStatus::HeadOfHousehold) => (dec!(64750), dec!(566700)),
            _ => unreachable!("unsupported tax year {}", self.year),
        };
        vec![
            Bracket::to(zero_to, dec!(0)),
            Bracket::to(fifteen_to, dec!(0.15)),
            Bracket::above(dec!(0.20)),
        ]
    }

    /// Standard deduction for a filing status.
    pub fn standard_deduction(&self, status: FilingStatus) -> Decimal {
        match (self.year, status) {
            (2024, FilingStatus::Single | FilingStatus::MarriedSeparate) => dec!(14600),
            (2024, FilingStatus::MarriedJoint) => dec!(29200),
            (2024, FilingStatus::HeadOfHousehold) => dec!(21900),
            (2025, FilingStatus::Single | FilingStatus::MarriedSeparate) => dec!(15000),
            (2025, FilingStatus::MarriedJoint) => dec!(30000),
            (2025, FilingStatus::HeadOfHousehold) => dec!(22500),
            _ => unreachable!("unsupported tax year {}", self.year),
        }
    }

    /// Section 199A threshold where the SSTB exclusion and wage limitation
    /// begin to phase in, and the width of the phase-in range.
    pub fn qbi_threshold(&self, status: FilingStatus) -> (Decimal, Decimal) {
        let (threshold, range) = match self.year {
            2024 => (dec!(191950), dec!(50000)),
            2025 => (dec!(197300), dec!(50000)),
            _ => unreachable!("unsupported tax year {}", self.year),
        };
        match status {
            FilingStatus::MarriedJoint => (threshold * dec!(2), range * dec!(2)),
            _ => (threshold, range),
        }
    }

    pub fn capital_loss_cap(&self, status: FilingStatus) -> Decimal {
        match status {
            FilingStatus::MarriedSeparate => self.capital_loss_cap_mfs,
            _ => self.capital_loss_cap,
        }
    }

    /// Return filing due date: 15 April of the following year.
    pub fn filing_due_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year + 1, 4, 15).expect("valid date")
    }

    /// Quarterly estimated payment due dates for this tax year.
    pub fn installment_due_dates(&self) -> [NaiveDate; 4] {
        [
            NaiveDate::from_ymd_opt(self.year, 4, 15).expect("valid date"),
            NaiveDate::from_ymd_opt(self.year, 6, 15).expect("valid date"),
            NaiveDate::from_ymd_opt(self.year, 9, 15).expect("valid date"),
            NaiveDate::from_ymd_opt(self.year + 1, 1, 15).expect("valid date"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::progressive_tax;

    #[test]
    fn unknown_year_is_fatal() {
        assert_eq!(
            TaxYearConfig::for_year(1999).unwrap_err(),
            EngineError::UnknownTaxYear(1999)
        );
    }

    #[test]
    fn known_years_resolve() {
        assert_eq!(TaxYearConfig::for_year(2024).unwrap().year, 2024);
        assert_eq!(TaxYearConfig::for_year(2025).unwrap().year, 2025);
    }

    #[test]
    fn single_2024_schedule_matches_published_figures() {
        let config = TaxYearConfig::for_year(2024).unwrap();
        let brackets = config.ordinary_brackets(FilingStatus::Single);
        assert_eq!(progressive_tax(dec!(75000), &brackets), dec!(11553.00));
        assert_eq!(progressive_tax(dec!(11600), &brackets), dec!(1160.00));
    }

    #[test]
    fn mfj_thresholds_double_single_at_the_bottom() {
        let config = TaxYearConfig::for_year(2024).unwrap();
        let single = config.ordinary_brackets(FilingStatus::Single);
        let joint = config.ordinary_brackets(FilingStatus::MarriedJoint);
        assert_eq!(joint[0].upper.unwrap(), single[0].upper.unwrap() * dec!(2));
        assert_eq!(joint[1].upper.unwrap(), single[1].upper.unwrap() * dec!(2));
    }

    #[test]
    fn qbi_threshold_doubles_for_joint() {
        let config = TaxYearConfig::for_year(2025).unwrap();
        assert_eq!(
            config.qbi_threshold(FilingStatus::Single),
            (dec!(197300), dec!(50000))
        );
        assert_eq!(
            config.qbi_threshold(FilingStatus::MarriedJoint),
            (dec!(394600), dec!(100000))
        );
    }

    #[test]
    fn capital_loss_cap_halved_for_mfs() {
        let config = TaxYearConfig::for_year(2024).unwrap();
        assert_eq!(config.capital_loss_cap(FilingStatus::Single), dec!(3000));
        assert_eq!(
            config.capital_loss_cap(FilingStatus::MarriedSeparate),
            dec!(1500)
        );
    }

    #[test]
    fn due_dates() {
        let config = TaxYearConfig::for_year(2024).unwrap();
        assert_eq!(
            config.filing_due_date(),
            NaiveDate::from_ymd_opt(2025, 4, 15).unwrap()
        );
        let dates = config.installment_due_dates();
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2024, 4, 15).unwrap());
        assert_eq!(dates[3], NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
    }
}
