//! Persistence layer for the Switchboard call gateway.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! embedded SQL migrations, and the session store. Sessions are persisted as
//! whole documents: a JSON blob per row, with the columns needed for lookup
//! (phone number, creation time) duplicated for indexing.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: no external database process required; WAL
//!   allows concurrent readers with a single writer, which matches the
//!   gateway's access pattern.
//! - **Whole-document writes**: a session is loaded, mutated in memory, and
//!   written back with `INSERT OR REPLACE`. There is no version column; the
//!   last write wins. Callers must keep their handlers safe under
//!   re-delivery.

mod migrations;
mod pool;
mod store;

pub use migrations::run_migrations;
pub use pool::{create_pool, DbPool, DbRuntimeSettings};
pub use store::{
    session_get, session_search_all, session_search_one, session_upsert, StoreError,
};
