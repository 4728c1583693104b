//! Database access layer.
//!
//! This module provides:
//! - Named connection registry
//! - Connections with prepare/execute and nested transactions
//! - Named placeholder rewriting and parameter binding
//! - Row decoding into JSON maps
//! - Identifier and literal quoting
//! - Connection attributes and raw driver access

pub mod attribute;
pub mod connection;
pub(crate) mod macros;
pub mod params;
pub mod quoting;
pub mod registry;
pub mod row;
pub mod statement;
pub mod transaction;

pub use attribute::{Attribute, AttributeValue};
pub use connection::{Connection, DbConnection};
pub use registry::{ConnectionRegistry, RawConnection, SharedConnection};
pub use statement::{PrepareOptions, PreparedStatement, Statement, StatementResult};
pub use transaction::{TransactionCommand, TransactionDepth};
