//! Item domain models and repository contract.

mod item_model;
mod item_traits;

pub use item_model::*;
pub use item_traits::*;
