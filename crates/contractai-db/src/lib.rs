//! Database layer for the ContractAI platform.
//!
//! Provides the process-wide async connection pool (via `sqlx`), scoped
//! session acquisition, and embedded SQL migrations. Every table in
//! ContractAI is created through versioned migrations managed by this
//! crate.
//!
//! # Design decisions
//!
//! - **One pool per process**: created once from the configured
//!   `DATABASE_URL`; the URL scheme selects the engine (SQLite for
//!   development and tests, PostgreSQL in production) without code
//!   changes.
//! - **Scoped sessions**: [`acquire`] hands out a pooled connection whose
//!   return to the pool is guaranteed by drop, on every exit path. There
//!   is no manual open/close pair for callers to forget.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!`, ensuring migrations ship with the server and cannot
//!   drift from the code that depends on them.

mod migrations;
mod pool;

pub use migrations::{init_db, run_migrations, MigrationError};
pub use pool::{acquire, create_pool, DbPool, DbSession, PoolError, PoolSettings};
