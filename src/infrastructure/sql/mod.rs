//! Relational database implementations

mod postgres;

pub use postgres::{PostgresConfig, PostgresDatabase};
