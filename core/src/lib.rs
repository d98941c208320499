//! NSQLited database engine core
//!
//! Turns a single-file SQLite database into a shared resource: one exclusive
//! writer connection, a pool of read-only readers, interactive transactions
//! identified by opaque tokens, and per-minute operational counters.
//!
//! The engine is driven through [`Engine::query`], which classifies each SQL
//! text as read / write / begin / commit / rollback without executing it,
//! routes it to the right connection, and returns a uniform [`QueryOutput`].
//!
//! # Example
//!
//! ```rust,ignore
//! use nsqlited_core::{Engine, EngineOptions, Query};
//!
//! let engine = Engine::open(EngineOptions::new("./data")).await?;
//! let output = engine.query(Query::statement("SELECT 1")).await?;
//! ```

mod classifier;
mod connection;
mod engine;
mod executor;
mod pool;
mod transaction;

pub mod error;
pub mod stats;
pub mod value;

pub use classifier::StatementKind;
pub use connection::{ConnectionManager, ConnectionRole, DbConn};
pub use engine::{Engine, EngineOptions, Outcome, Query, QueryOutput};
pub use error::EngineError;
pub use stats::{StatsRegistry, StatsSnapshot};
pub use value::{Cell, Param, ParamValue};
