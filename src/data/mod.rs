pub mod database;
pub mod migration;
pub mod repositories;

pub use database::{init_database, init_memory_database, Database, DbPool};
pub use repositories::*;
