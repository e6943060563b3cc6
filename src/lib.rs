//! Job lifecycle management for a part-time job marketplace: status rules,
//! admin commands and a SQLite-backed document store.

pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod status;

pub use db::Database;
pub use error::{LifecycleError, Result};
pub use lifecycle::{LifecycleManager, Outcome};
pub use status::JobStatus;
