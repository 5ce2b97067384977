pub mod model;
pub mod repository;

pub use model::SyncSessionDB;
pub use repository::SyncSessionRepository;
