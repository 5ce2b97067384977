//! Transaction domain models and repository contract.

mod transaction_model;
mod transaction_traits;

pub use transaction_model::*;
pub use transaction_traits::*;
