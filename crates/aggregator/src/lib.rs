//! HTTP client for the upstream financial-data provider's incremental
//! transactions API, implementing the core `AggregatorGateway` contract.

mod client;
mod error;
mod types;

pub use client::*;
pub use error::*;
pub use types::*;
