//! Data models shared by the connection layer and the CLI.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::{
    ConnectParams, ConnectParamsError, DEFAULT_CONNECTION_NAME, DatabaseType, DriverOptions,
};
pub use query::{ColumnMetadata, Parameters, QueryParam};
