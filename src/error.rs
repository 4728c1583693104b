//! Error types for the connection layer.
//!
//! Failures travel on two channels. [`DbError`] is the hard channel: the
//! current call cannot go on (connecting failed, unknown connection name,
//! a statement handed to the wrong connection). [`QueryFailure`] is the soft
//! channel returned by `prepare` and `execute`: the statement failed, the
//! connection stays usable, and the details are also recorded on the
//! connection for later inspection.

use thiserror::Error;

/// SQLSTATE reported when the last operation succeeded.
pub const SQLSTATE_SUCCESS: &str = "00000";

/// SQLSTATE used when the driver error carries no code of its own.
pub const SQLSTATE_GENERAL_ERROR: &str = "HY000";

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("The database connection '{name}' doesn't exist")]
    ConnectionNotFound { name: String },

    #[error("Wrong parameter: {message}")]
    InvalidStatement { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42S02" for unknown table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Transaction error: {message}")]
    Transaction { message: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a connection not found error.
    pub fn connection_not_found(name: impl Into<String>) -> Self {
        Self::ConnectionNotFound { name: name.into() }
    }

    /// Create a wrong-statement error.
    pub fn invalid_statement(message: impl Into<String>) -> Self {
        Self::InvalidStatement {
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create a transaction error.
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// True when the named connection was never registered.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ConnectionNotFound { .. })
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection parameters and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::database(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced objects",
                )
            }
            sqlx::Error::RowNotFound => DbError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::invalid_input(format!("Column not found: {}", col))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::invalid_input(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Error details of the most recent operation on a connection.
///
/// Mirrors the driver's `(SQLSTATE, driver code, message)` triple.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ErrorInfo {
    pub sql_state: String,
    pub driver_code: Option<String>,
    pub message: Option<String>,
}

impl ErrorInfo {
    /// The state after a successful operation.
    pub fn success() -> Self {
        Self {
            sql_state: SQLSTATE_SUCCESS.to_string(),
            driver_code: None,
            message: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.sql_state == SQLSTATE_SUCCESS && self.message.is_none()
    }

    /// Capture error details from a driver error.
    ///
    /// Database errors keep their SQLSTATE and vendor code. Anything else
    /// (I/O, protocol, decode errors) has no code and is recorded as a
    /// general error with its rendered message.
    pub fn from_sqlx(err: &sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let (sql_state, driver_code) = split_database_codes(db_err.as_ref());
                Self {
                    sql_state,
                    driver_code,
                    message: Some(db_err.message().to_string()),
                }
            }
            other => Self::general(other.to_string()),
        }
    }

    /// A general error with no driver code.
    pub fn general(message: impl Into<String>) -> Self {
        Self {
            sql_state: SQLSTATE_GENERAL_ERROR.to_string(),
            driver_code: None,
            message: Some(message.into()),
        }
    }
}

impl Default for ErrorInfo {
    fn default() -> Self {
        Self::success()
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = vec![self.sql_state.as_str()];
        if let Some(code) = &self.driver_code {
            parts.push(code);
        }
        if let Some(message) = &self.message {
            parts.push(message);
        }
        write!(f, "{}", parts.join(" - "))
    }
}

/// Split a database error into its SQLSTATE and vendor-specific code.
fn split_database_codes(
    db_err: &(dyn sqlx::error::DatabaseError + 'static),
) -> (String, Option<String>) {
    if let Some(mysql) = db_err.try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>() {
        let sql_state = mysql
            .code()
            .unwrap_or(SQLSTATE_GENERAL_ERROR)
            .to_string();
        return (sql_state, Some(mysql.number().to_string()));
    }
    if db_err
        .try_downcast_ref::<sqlx::sqlite::SqliteError>()
        .is_some()
    {
        // SQLite has no SQLSTATE; its result code is the vendor code
        return (
            SQLSTATE_GENERAL_ERROR.to_string(),
            db_err.code().map(|c| c.into_owned()),
        );
    }
    let sql_state = db_err
        .code()
        .map(|c| c.into_owned())
        .unwrap_or_else(|| SQLSTATE_GENERAL_ERROR.to_string());
    (sql_state, None)
}

/// Soft failure returned by `prepare` and `execute`.
///
/// The same details are stored on the connection as its last error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Query failed: {info}")]
pub struct QueryFailure {
    pub info: ErrorInfo,
}

impl QueryFailure {
    pub fn new(info: ErrorInfo) -> Self {
        Self { info }
    }

    pub fn sql_state(&self) -> &str {
        &self.info.sql_state
    }

    pub fn message(&self) -> &str {
        self.info.message.as_deref().unwrap_or_default()
    }
}
