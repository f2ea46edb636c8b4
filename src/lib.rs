//! Federal income tax computation and carryover engine.
//!
//! The library takes a validated [`FinancialSnapshot`] plus the prior
//! year's carryover package and assembles the year's return: progressive
//! bracket tax with preferential capital gain rates, the representative
//! form calculators (Schedule D netting, Form 6252 installment sales,
//! section 481(a) spreads, Form 8582 passive losses, the section 199A
//! deduction, and the Form 2210 penalty), and the carryover ledger that
//! threads unused losses into the next year.
//!
//! All arithmetic is exact decimal; amounts are rounded to cents only when
//! a form line is finalized.

pub mod assembler;
pub mod config;
pub mod error;
pub mod forms;
pub mod ledger;
pub mod money;
pub mod phaseout;
pub mod result;
pub mod schedule;
pub mod snapshot;

pub use assembler::assemble_return;
pub use config::{FilingStatus, PenaltyMethod, TaxYearConfig};
pub use error::EngineError;
pub use ledger::{
    CarryoverCategory, CarryoverLedger, CarryoverRecord, CarryoverStatus, LedgerDelta,
};
pub use money::{progressive_tax, to_money, Bracket};
pub use phaseout::{phase_out, PhaseOutResult};
pub use result::{CalculationResult, FormSection, LineItem};
pub use schedule::{compute_tax, compute_tax_with_capital_gains};
pub use snapshot::FinancialSnapshot;
