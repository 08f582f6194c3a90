pub mod manager;
pub mod memory;
pub mod models;
pub mod repository;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::{MemoryBrainDumpRepository, MemoryUserRepository};
pub use repository::{
    BrainDumpRepository, PgBrainDumpRepository, PgUserRepository, RepositoryError, UserRepository,
};
