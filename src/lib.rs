//! Named database connections for the hosting control panel.
//!
//! This library keeps a registry of named connections (MySQL/MariaDB,
//! PostgreSQL, SQLite), runs raw and prepared statements with before/after
//! event hooks, and emulates nested transactions with savepoints.

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;

pub use config::Config;
pub use db::{
    Attribute, AttributeValue, Connection, ConnectionRegistry, DbConnection, PrepareOptions,
    PreparedStatement, RawConnection, SharedConnection, Statement, StatementResult,
};
pub use error::{DbError, DbResult, ErrorInfo, QueryFailure};
pub use events::{EventSink, NoopSink, TracingSink};
pub use models::{ConnectParams, DatabaseType, DriverOptions, Parameters, QueryParam};
