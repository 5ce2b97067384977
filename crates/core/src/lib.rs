//! LedgerLink core: domain models, repository contracts, and the incremental
//! transaction sync engine.

pub mod errors;
pub mod items;
pub mod sync;
pub mod transactions;

pub use errors::{Error, Result};
