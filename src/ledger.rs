//! Cross-year carryover bookkeeping. The ledger owns every carryover record
//! for a taxpayer; calculators only read balances and propose deltas, and
//! the assembler applies deltas serially so the utilization invariant holds.

use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A carryforward bucket. Passive losses are suspended per activity, so that
/// a qualifying disposition can release exactly one activity's balance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "kind", content = "activity")]
pub enum CarryoverCategory {
    ShortTermCapitalLoss,
    LongTermCapitalLoss,
    Section481Adjustment,
    PassiveActivityLoss(String),
    QbiLoss,
}

impl std::fmt::Display for CarryoverCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CarryoverCategory::ShortTermCapitalLoss => write!(f, "short-term capital loss"),
            CarryoverCategory::LongTermCapitalLoss => write!(f, "long-term capital loss"),
            CarryoverCategory::Section481Adjustment => write!(f, "section 481(a) adjustment"),
            CarryoverCategory::PassiveActivityLoss(id) => {
                write!(f, "suspended passive loss ({id})")
            }
            CarryoverCategory::QbiLoss => write!(f, "qbi loss"),
        }
    }
}

/// One carryforward amount with its origin year. Amounts are always >= 0;
/// the sign is implied by the category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CarryoverRecord {
    pub category: CarryoverCategory,
    #[schemars(with = "f64")]
    pub amount: Decimal,
    pub origin_year: i32,
}

/// Lifecycle of a carryover balance across years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CarryoverStatus {
    Originated,
    PartiallyUtilized,
    CarriedForward,
    Released,
}

/// A calculator's proposed change to one category: how much of the existing
/// balance it used this year, and how much new carryforward it originated.
/// Usage draws FIFO across origin years unless `origin_year` pins it to one
/// origin's record, for schedules whose slices are per-origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerDelta {
    pub category: CarryoverCategory,
    pub used: Decimal,
    pub originated: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_year: Option<i32>,
}

impl LedgerDelta {
    pub fn new(category: CarryoverCategory, used: Decimal, originated: Decimal) -> Self {
        LedgerDelta {
            category,
            used,
            originated,
            origin_year: None,
        }
    }

    /// A draw against one specific origin year's balance.
    pub fn from_origin(category: CarryoverCategory, origin_year: i32, used: Decimal) -> Self {
        LedgerDelta {
            category,
            used,
            originated: Decimal::ZERO,
            origin_year: Some(origin_year),
        }
    }

    /// Lifecycle state this delta leaves the category in, given the balance
    /// it was computed against.
    pub fn status(&self, prior_balance: Decimal) -> CarryoverStatus {
        let remaining = prior_balance - self.used + self.originated;
        if remaining.is_zero() {
            CarryoverStatus::Released
        } else if prior_balance.is_zero() {
            CarryoverStatus::Originated
        } else if self.used.is_zero() {
            CarryoverStatus::CarriedForward
        } else {
            CarryoverStatus::PartiallyUtilized
        }
    }
}

/// Per-category, per-origin-year carryforward balances for one calculation
/// run. Usage consumes the oldest origin years first.
#[derive(Debug, Clone)]
pub struct CarryoverLedger {
    current_year: i32,
    records: Vec<CarryoverRecord>,
}

impl CarryoverLedger {
    pub fn new(current_year: i32, mut records: Vec<CarryoverRecord>) -> Self {
        records.sort_by_key(|r| r.origin_year);
        CarryoverLedger {
            current_year,
            records,
        }
    }

    pub fn empty(current_year: i32) -> Self {
        CarryoverLedger::new(current_year, Vec::new())
    }

    pub fn current_year(&self) -> i32 {
        self.current_year
    }

    /// Total remaining balance for a category.
    pub fn balance(&self, category: &CarryoverCategory) -> Decimal {
        self.records
            .iter()
            .filter(|r| &r.category == category)
            .map(|r| r.amount)
            .sum()
    }

    /// Origin year of the oldest record in the category, if any.
    pub fn oldest_origin_year(&self, category: &CarryoverCategory) -> Option<i32> {
        self.records
            .iter()
            .filter(|r| &r.category == category)
            .map(|r| r.origin_year)
            .min()
    }

    /// Remaining balance per origin year, oldest first.
    pub fn balances_by_origin(&self, category: &CarryoverCategory) -> Vec<(i32, Decimal)> {
        let mut out: Vec<(i32, Decimal)> = Vec::new();
        for record in self.records.iter().filter(|r| &r.category == category) {
            match out.iter_mut().find(|(year, _)| *year == record.origin_year) {
                Some((_, amount)) => *amount += record.amount,
                None => out.push((record.origin_year, record.amount)),
            }
        }
        out
    }

    /// Apply a proposed delta. Usage draws down the oldest origin years
    /// first, or only the pinned origin year if the delta names one; an
    /// over-draw is a fatal programming error, since calculators compute
    /// their own statutory utilization caps.
    pub fn apply(&mut self, delta: &LedgerDelta) -> Result<(), EngineError> {
        let in_scope = |r: &CarryoverRecord| {
            r.category == delta.category
                && delta.origin_year.map_or(true, |year| r.origin_year == year)
        };
        let available: Decimal = self.records.iter().filter(|r| in_scope(r)).map(|r| r.amount).sum();
        if delta.used > available {
            return Err(EngineError::OverUtilization {
                category: delta.category.clone(),
                requested: delta.used,
                available,
            });
        }
        let mut remaining = delta.used;
        for record in self.records.iter_mut().filter(|r| in_scope(r)) {
            if remaining.is_zero() {
                break;
            }
            let drawn = remaining.min(record.amount);
            record.amount -= drawn;
            remaining -= drawn;
            log::debug!(
                "ledger draw {}: {} from origin year {} (remaining {})",
                delta.category,
                drawn,
                record.origin_year,
                record.amount
            );
        }
        if delta.originated > Decimal::ZERO {
            log::debug!(
                "ledger originate {}: {} for year {}",
                delta.category,
                delta.originated,
                self.current_year
            );
            self.records.push(CarryoverRecord {
                category: delta.category.clone(),
                amount: delta.originated,
                origin_year: self.current_year,
            });
        }
        self.records.retain(|r| r.amount > Decimal::ZERO);
        Ok(())
    }

    /// One record per category and origin year with a nonzero remaining
    /// balance. Origin years stay separate so schedules whose slices depend
    /// on the origin (the section 481(a) spread) survive the round trip.
    pub fn carryforward_package(&self) -> Vec<CarryoverRecord> {
        let mut out: Vec<CarryoverRecord> = Vec::new();
        for record in &self.records {
            if record.amount <= Decimal::ZERO {
                continue;
            }
            match out
                .iter_mut()
                .find(|r| r.category == record.category && r.origin_year == record.origin_year)
            {
                Some(existing) => existing.amount += record.amount,
                None => out.push(record.clone()),
            }
        }
        out
    }
}
