use rust_decimal::Decimal;

use crate::ledger::CarryoverCategory;

/// Engine-level error taxonomy.
///
/// Business outcomes ("no penalty applies", "deduction phased out to zero")
/// are never errors; they are reported as result fields with a reason string.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EngineError {
    /// Malformed or out-of-domain input, rejected at calculator entry.
    #[error("{form}: {reason}")]
    Validation { form: &'static str, reason: String },
    /// A calculator proposed using more carryover than the ledger holds.
    /// Calculators compute their own utilization caps, so this indicates a
    /// programming error rather than a business condition.
    #[error("over-utilization of {category}: requested {requested}, available {available}")]
    OverUtilization {
        category: CarryoverCategory,
        requested: Decimal,
        available: Decimal,
    },
    /// No statutory table exists for the requested tax year. Fatal: the run
    /// aborts with no partial results.
    #[error("no tax year configuration for {0}")]
    UnknownTaxYear(i32),
    /// Division by zero with no default supplied.
    #[error("division by zero: {0}")]
    DivisionByZero(&'static str),
}

impl EngineError {
    pub fn validation(form: &'static str, reason: impl Into<String>) -> Self {
        EngineError::Validation {
            form,
            reason: reason.into(),
        }
    }
}
