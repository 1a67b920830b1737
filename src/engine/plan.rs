// Consumption planner - which backing versions a spend draws from
//
// Walks spendable rows in the order given (oldest version first) and takes
// min(available, remaining) from each until the amount is covered.

use crate::ledger::VersionedBalance;
use crate::snapshot::{SetDigest, VersionId};

/// Amount taken from one backing version
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanLeg {
    pub version: VersionId,
    pub digest: SetDigest,
    pub amount: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsumptionPlan {
    legs: Vec<PlanLeg>,
}

impl ConsumptionPlan {
    pub fn legs(&self) -> &[PlanLeg] {
        &self.legs
    }

    pub fn total(&self) -> u64 {
        self.legs.iter().map(|l| l.amount).sum()
    }

    pub fn len(&self) -> usize {
        self.legs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum PlanError<E> {
    /// Rows ran out before the amount was covered
    Insufficient { requested: u64, covered: u64 },
    /// Reading the next row failed
    Source(E),
}

/// Build a plan covering `amount` from `rows`.
///
/// Rows with a non-positive amount are skipped. Iteration stops at the first
/// row that completes the amount, so later pages are never fetched.
pub fn plan_consumption<I, E>(rows: I, amount: u64) -> Result<ConsumptionPlan, PlanError<E>>
where
    I: IntoIterator<Item = Result<VersionedBalance, E>>,
{
    let mut plan = ConsumptionPlan::default();
    let mut remaining = amount;

    if remaining == 0 {
        return Ok(plan);
    }

    for row in rows {
        let row = row.map_err(PlanError::Source)?;
        if row.amount() <= 0 {
            continue;
        }
        let take = (row.amount() as u64).min(remaining);
        plan.legs.push(PlanLeg {
            version: row.version(),
            digest: *row.digest(),
            amount: take,
        });
        remaining -= take;
        if remaining == 0 {
            break;
        }
    }

    if remaining > 0 {
        return Err(PlanError::Insufficient {
            requested: amount,
            covered: amount - remaining,
        });
    }
    Ok(plan)
}
