//! SQLite persistence for the LedgerLink sync engine: diesel schema,
//! migrations, and repository implementations of the core storage traits.

pub mod convert;
pub mod db;
pub mod errors;
pub mod items;
pub mod schema;
pub mod sessions;
pub mod transactions;

pub use db::{create_pool, get_connection, init, run_migrations, spawn_writer, WriteHandle};
pub use errors::StorageError;
pub use items::ItemRepository;
pub use sessions::SyncSessionRepository;
pub use transactions::TransactionRepository;
