//! # storage-adapters
//!
//! Implementations of the `domains` ports.
//!
//! - `memory`: process-local store, always compiled. Used by tests and by
//!   deployments that do not need durability.
//! - `postgres` (feature `db-postgres`): sqlx-backed store with embedded
//!   migrations.

pub mod memory;

#[cfg(feature = "db-postgres")]
pub mod postgres;

pub use memory::MemoryStore;

#[cfg(feature = "db-postgres")]
pub use postgres::PostgresStore;
