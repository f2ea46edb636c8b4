//! Per-form calculators. Each is a stateless pure function over a snapshot
//! slice, a read view of carryover balances, and the year's statutory
//! config, returning line items plus proposed ledger deltas. Calculators
//! never mutate the ledger; the assembler applies deltas serially.

pub mod capital_gains;
pub mod installment;
pub mod method_change;
pub mod passive_loss;
pub mod qbi;
pub mod underpayment;

pub use capital_gains::{calculate_capital_gains, CapitalGainsInput, CapitalGainsResult};
pub use installment::{calculate_installment_sales, InstallmentResult, InstallmentSaleOutcome};
pub use method_change::{calculate_method_changes, MethodChangeResult};
pub use passive_loss::{calculate_passive_losses, PassiveLossResult};
pub use qbi::{calculate_qbi_deduction, QbiInput, QbiResult};
pub use underpayment::{calculate_underpayment, UnderpaymentInput, UnderpaymentResult};
