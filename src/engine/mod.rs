// Engine module - THE TRANSFER PATH
// Validation, locking, version consumption planning and atomic commit

mod error;
mod plan;
mod transfer;

pub use error::TransferError;
pub use plan::{plan_consumption, ConsumptionPlan, PlanError, PlanLeg};
pub use transfer::{TransferEngine, TransferKind, TransferReceipt, TransferRequest};
