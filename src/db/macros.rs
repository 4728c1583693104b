//! Dispatch macros for code that is identical for every driver.

/// Run the same body against whichever driver connection is inside a
/// `DbConnection`.
///
/// Each arm is type-checked separately, so the body may call generic sqlx
/// APIs whose types differ per driver, as long as every arm evaluates to
/// the same type.
///
/// # Example
///
/// ```ignore
/// let result = dispatch_connection!(&mut self.inner, c => c.execute(sql).await.map(|_| ()));
/// ```
macro_rules! dispatch_connection {
    ($conn:expr, $c:ident => $body:expr) => {
        match $conn {
            $crate::db::connection::DbConnection::MySql($c) => $body,
            $crate::db::connection::DbConnection::Postgres($c) => $body,
            $crate::db::connection::DbConnection::SQLite($c) => $body,
        }
    };
}

pub(crate) use dispatch_connection;
