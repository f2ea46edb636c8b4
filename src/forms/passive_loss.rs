//! Form 8582 pattern: passive activity loss limitation. Current losses plus
//! suspended carryforwards offset passive income first; the
//! active-participation rental share can use the phased-out special
//! allowance; everything still disallowed is suspended per activity. A
//! complete taxable disposition releases an activity's suspended balance.

use rust_decimal::Decimal;

use crate::config::TaxYearConfig;
use crate::ledger::{CarryoverCategory, CarryoverLedger, LedgerDelta};
use crate::money::{safe_divide, to_money};
use crate::phaseout::{phase_out, PhaseOutResult};
use crate::result::FormSection;
use crate::snapshot::PassiveActivity;

/// Per-activity disposition of this year's loss.
#[derive(Debug, Clone)]
pub struct ActivityOutcome {
    pub id: String,
    /// Loss pool entering the limitation: current loss plus suspended
    /// carryforward (zero for income activities).
    pub loss_pool: Decimal,
    pub allowed: Decimal,
    pub suspended: Decimal,
    pub released_by_disposition: Decimal,
}

#[derive(Debug, Clone)]
pub struct PassiveLossResult {
    pub passive_income: Decimal,
    pub total_loss_pool: Decimal,
    /// Losses absorbed by passive income.
    pub offset_against_income: Decimal,
    pub allowance: PhaseOutResult,
    /// Special allowance actually used (limited by eligible rental losses).
    pub allowance_used: Decimal,
    /// Net effect on AGI from all passive activities this year.
    pub agi_effect: Decimal,
    pub activities: Vec<ActivityOutcome>,
    pub deltas: Vec<LedgerDelta>,
}

pub fn calculate_passive_losses(
    activities: &[PassiveActivity],
    ledger: &CarryoverLedger,
    magi_before_passive: Decimal,
    config: &TaxYearConfig,
) -> PassiveLossResult {
    let mut outcomes: Vec<ActivityOutcome> = Vec::new();
    let mut deltas: Vec<LedgerDelta> = Vec::new();
    let mut agi_effect = Decimal::ZERO;

    // Dispositions first: a complete taxable disposition frees the
    // activity's suspended balance and its current-year result in full.
    for activity in activities.iter().filter(|a| a.disposed) {
        let category = CarryoverCategory::PassiveActivityLoss(activity.id.clone());
        let suspended = ledger.balance(&category);
        agi_effect += activity.net_income_or_loss - suspended;
        if suspended > Decimal::ZERO {
            deltas.push(LedgerDelta::new(category, suspended, Decimal::ZERO));
        }
        log::debug!(
            "passive activity '{}' disposed: releasing {suspended} suspended loss",
            activity.id
        );
        outcomes.push(ActivityOutcome {
            id: activity.id.clone(),
            loss_pool: (-activity.net_income_or_loss).max(Decimal::ZERO) + suspended,
            allowed: (-activity.net_income_or_loss).max(Decimal::ZERO) + suspended,
            suspended: Decimal::ZERO,
            released_by_disposition: suspended,
        });
    }

    let open: Vec<&PassiveActivity> = activities.iter().filter(|a| !a.disposed).collect();
    let passive_income: Decimal = open
        .iter()
        .map(|a| a.net_income_or_loss.max(Decimal::ZERO))
        .sum();

    // Loss pool per activity: current loss plus suspended carryforward.
    struct Pool<'a> {
        activity: &'a PassiveActivity,
        suspended_prior: Decimal,
        loss: Decimal,
    }
    let pools: Vec<Pool> = open
        .iter()
        .map(|a| {
            let suspended_prior =
                ledger.balance(&CarryoverCategory::PassiveActivityLoss(a.id.clone()));
            Pool {
                activity: a,
                suspended_prior,
                loss: (-a.net_income_or_loss).max(Decimal::ZERO) + suspended_prior,
            }
        })
        .filter(|p| p.loss > Decimal::ZERO || p.suspended_prior > Decimal::ZERO)
        .collect();

    let total_loss_pool: Decimal = pools.iter().map(|p| p.loss).sum();
    let offset = total_loss_pool.min(passive_income);
    let remaining_total = total_loss_pool - offset;

    // Pro-rata remaining disallowed loss per activity; the last activity
    // takes the exact remainder so the allocation conserves.
    let mut remaining: Vec<Decimal> = Vec::with_capacity(pools.len());
    let mut allocated = Decimal::ZERO;
    for (idx, pool) in pools.iter().enumerate() {
        let share = if idx + 1 == pools.len() {
            remaining_total - allocated
        } else {
            to_money(remaining_total * safe_divide(pool.loss, total_loss_pool, Decimal::ZERO))
        };
        allocated += share;
        remaining.push(share);
    }

    let allowance = phase_out(
        magi_before_passive,
        config.pal_phase_out_start,
        config.pal_phase_out_range,
        config.pal_allowance,
        Some(config.pal_phase_out_rate),
    );
    let eligible: Decimal = pools
        .iter()
        .zip(&remaining)
        .filter(|(p, _)| p.activity.rental_real_estate && p.activity.active_participation)
        .map(|(_, r)| *r)
        .sum();
    let allowance_used = allowance.available_amount.min(eligible);

    // Spread the allowance across eligible activities, again conserving on
    // the last one.
    let mut allowance_left = allowance_used;
    let eligible_count = pools
        .iter()
        .filter(|p| p.activity.rental_real_estate && p.activity.active_participation)
        .count();
    let mut seen_eligible = 0usize;
    for (idx, pool) in pools.iter().enumerate() {
        let is_eligible = pool.activity.rental_real_estate && pool.activity.active_participation;
        let from_allowance = if is_eligible {
            seen_eligible += 1;
            if seen_eligible == eligible_count {
                allowance_left
            } else {
                let share =
                    to_money(allowance_used * safe_divide(remaining[idx], eligible, Decimal::ZERO));
                share.min(allowance_left)
            }
        } else {
            Decimal::ZERO
        };
        allowance_left -= from_allowance;

        let suspended_new = remaining[idx] - from_allowance;
        let allowed = pool.loss - suspended_new;
        if pool.suspended_prior > Decimal::ZERO || suspended_new > Decimal::ZERO {
            deltas.push(LedgerDelta::new(
                CarryoverCategory::PassiveActivityLoss(pool.activity.id.clone()),
                pool.suspended_prior,
                suspended_new,
            ));
        }
        outcomes.push(ActivityOutcome {
            id: pool.activity.id.clone(),
            loss_pool: pool.loss,
            allowed,
            suspended: suspended_new,
            released_by_disposition: Decimal::ZERO,
        });
    }

    agi_effect += passive_income - offset - allowance_used;

    PassiveLossResult {
        passive_income,
        total_loss_pool,
        offset_against_income: offset,
        allowance,
        allowance_used,
        agi_effect,
        activities: outcomes,
        deltas,
    }
}

impl PassiveLossResult {
    pub fn section(&self) -> FormSection {
        let mut section = FormSection::new("form_8582");
        section.line(
            "line_1_passive_income",
            to_money(self.passive_income),
            "net income from passive activities with income",
        );
        section.line(
            "line_3_total_losses",
            to_money(self.total_loss_pool),
            "current-year losses plus suspended carryforwards",
        );
        section.line(
            "line_9_special_allowance",
            to_money(self.allowance_used),
            format!(
                "rental real estate allowance of {} after phase-out of {} (MAGI {})",
                self.allowance.available_amount,
                self.allowance.phase_out_amount,
                self.allowance.applicable_amount
            ),
        );
        let suspended_total: Decimal = self.activities.iter().map(|a| a.suspended).sum();
        section.line(
            "unallowed_loss_carryforward",
            to_money(suspended_total),
            "disallowed losses suspended per activity",
        );
        let released: Decimal = self
            .activities
            .iter()
            .map(|a| a.released_by_disposition)
            .sum();
        if released > Decimal::ZERO {
            section.line(
                "released_by_disposition",
                to_money(released),
                "suspended losses freed by complete taxable dispositions",
            );
        }
        section.line(
            "net_passive_effect",
            to_money(self.agi_effect),
            "net passive income or allowed loss flowing to the return",
        );
        section.deltas = self.deltas.clone();
        section
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::CarryoverRecord;
    use rust_decimal_macros::dec;

    fn config() -> TaxYearConfig {
        TaxYearConfig::for_year(2024).unwrap()
    }

    fn rental(id: &str, net: Decimal) -> PassiveActivity {
        PassiveActivity {
            id: id.into(),
            description: format!("rental {id}"),
            net_income_or_loss: net,
            rental_real_estate: true,
            active_participation: true,
            disposed: false,
        }
    }

    fn partnership(id: &str, net: Decimal) -> PassiveActivity {
        PassiveActivity {
            id: id.into(),
            description: format!("partnership {id}"),
            net_income_or_loss: net,
            rental_real_estate: false,
            active_participation: false,
            disposed: false,
        }
    }

    #[test]
    fn losses_offset_passive_income_first() {
        let activities = vec![partnership("p1", dec!(8000)), partnership("p2", dec!(-5000))];
        let ledger = CarryoverLedger::empty(2024);
        let result = calculate_passive_losses(&activities, &ledger, dec!(200000), &config());
        // Loss fully absorbed by income; nothing suspended even though MAGI
        // kills the special allowance.
        assert_eq!(result.offset_against_income, dec!(5000));
        assert_eq!(result.agi_effect, dec!(3000));
        assert!(result.deltas.is_empty());
    }

    #[test]
    fn rental_allowance_under_phase_out() {
        // MAGI 120,000: allowance reduced to 15,000. Rental loss 20,000:
        // 15,000 allowed, 5,000 suspended.
        let activities = vec![rental("r1", dec!(-20000))];
        let ledger = CarryoverLedger::empty(2024);
        let result = calculate_passive_losses(&activities, &ledger, dec!(120000), &config());
        assert_eq!(result.allowance.available_amount, dec!(15000));
        assert_eq!(result.allowance_used, dec!(15000));
        assert_eq!(result.agi_effect, dec!(-15000));
        assert_eq!(result.activities[0].suspended, dec!(5000));
        assert_eq!(result.deltas[0].originated, dec!(5000));
    }

    #[test]
    fn non_rental_loss_gets_no_allowance() {
        let activities = vec![partnership("p1", dec!(-10000))];
        let ledger = CarryoverLedger::empty(2024);
        let result = calculate_passive_losses(&activities, &ledger, dec!(80000), &config());
        assert_eq!(result.allowance_used, dec!(0));
        assert_eq!(result.agi_effect, dec!(0));
        assert_eq!(result.activities[0].suspended, dec!(10000));
    }

    #[test]
    fn suspended_losses_rejoin_the_pool() {
        let activities = vec![rental("r1", dec!(-2000)), partnership("p1", dec!(6000))];
        let ledger = CarryoverLedger::new(
            2024,
            vec![CarryoverRecord {
                category: CarryoverCategory::PassiveActivityLoss("r1".into()),
                amount: dec!(3000),
                origin_year: 2023,
            }],
        );
        let result = calculate_passive_losses(&activities, &ledger, dec!(90000), &config());
        // Pool of 5,000 fully absorbed by 6,000 of passive income.
        assert_eq!(result.total_loss_pool, dec!(5000));
        assert_eq!(result.offset_against_income, dec!(5000));
        assert_eq!(result.agi_effect, dec!(1000));
        assert_eq!(result.activities.iter().map(|a| a.suspended).sum::<Decimal>(), dec!(0));
        // The prior suspension was consumed.
        assert_eq!(result.deltas[0].used, dec!(3000));
        assert_eq!(result.deltas[0].originated, dec!(0));
    }

    #[test]
    fn disposition_releases_suspended_loss_in_full() {
        let mut disposed = rental("r1", dec!(-1000));
        disposed.disposed = true;
        let ledger = CarryoverLedger::new(
            2024,
            vec![CarryoverRecord {
                category: CarryoverCategory::PassiveActivityLoss("r1".into()),
                amount: dec!(12000),
                origin_year: 2022,
            }],
        );
        let result = calculate_passive_losses(&[disposed], &ledger, dec!(500000), &config());
        // Current loss and the full suspension flow through despite MAGI.
        assert_eq!(result.agi_effect, dec!(-13000));
        assert_eq!(result.activities[0].released_by_disposition, dec!(12000));
        assert_eq!(result.deltas[0].used, dec!(12000));
    }

    #[test]
    fn suspension_allocated_pro_rata_across_activities() {
        // Two rental losses beyond the allowance: 30,000 total loss, MAGI
        // 100,000 keeps the full 25,000 allowance, 5,000 suspended split
        // 2:1 by loss size.
        let activities = vec![rental("a", dec!(-20000)), rental("b", dec!(-10000))];
        let ledger = CarryoverLedger::empty(2024);
        let result = calculate_passive_losses(&activities, &ledger, dec!(100000), &config());
        assert_eq!(result.allowance_used, dec!(25000));
        let a = result.activities.iter().find(|o| o.id == "a").unwrap();
        let b = result.activities.iter().find(|o| o.id == "b").unwrap();
        assert_eq!(a.suspended + b.suspended, dec!(5000));
        assert_eq!(a.suspended, dec!(3333.33));
        assert_eq!(b.suspended, dec!(1666.67));
    }

    #[test]
    fn conservation_per_activity() {
        let activities = vec![rental("a", dec!(-20000)), rental("b", dec!(-10000))];
        let ledger = CarryoverLedger::empty(2024);
        let result = calculate_passive_losses(&activities, &ledger, dec!(130000), &config());
        for outcome in &result.activities {
            assert_eq!(outcome.allowed + outcome.suspended, outcome.loss_pool);
        }
    }
}
