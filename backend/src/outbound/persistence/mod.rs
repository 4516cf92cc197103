//! PostgreSQL persistence adapters using Diesel with `diesel-async`.
//!
//! Adapters only translate between Diesel rows and domain types. Row
//! structs (`models.rs`) and table definitions (`schema.rs`) stay private
//! to this module.
//!
//! ```ignore
//! use diary_backend::outbound::persistence::{DbPool, DieselOutboxRepository, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/diary")).await?;
//! let outbox = DieselOutboxRepository::new(pool);
//! ```

mod diesel_basic_error_mapping;
mod diesel_diary_analysis_repository;
mod diesel_diary_transaction;
mod diesel_outbox_repository;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_diary_analysis_repository::DieselDiaryAnalysisRepository;
pub use diesel_diary_transaction::{DieselDiaryTransactionManager, DieselDiaryUnitOfWork};
pub use diesel_outbox_repository::DieselOutboxRepository;
pub use migrations::{MIGRATIONS, MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
