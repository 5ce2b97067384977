//! Transaction sync engine: session ledger, count validation, batch apply,
//! recovery, and the orchestrator.

mod batch_apply;
mod count_validator;
mod recovery;
mod session_ledger;
mod session_model;
mod sync_scheduler;
mod sync_service;
mod sync_traits;

pub use batch_apply::*;
pub use count_validator::*;
pub use recovery::*;
pub use session_ledger::*;
pub use session_model::*;
pub use sync_scheduler::*;
pub use sync_service::*;
pub use sync_traits::*;

#[cfg(test)]
mod tests;
