//! Prepared statements, the statement argument of `execute`, and buffered
//! statement results.

use crate::db::row::RowToJson;
use crate::models::ColumnMetadata;
use serde_json::{Map, Value as JsonValue};
use sqlx::mysql::MySqlStatement;
use sqlx::postgres::PgStatement;
use sqlx::sqlite::SqliteStatement;
use sqlx::{Column, TypeInfo};
use uuid::Uuid;

/// Options accepted by `Connection::prepare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepareOptions {
    /// Keep the server-side statement in the connection's statement cache
    /// after execution. When false it is closed after every execute.
    pub persistent: bool,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self { persistent: true }
    }
}

/// Driver statement handle.
#[derive(Debug)]
pub(crate) enum StatementHandle {
    MySql(MySqlStatement<'static>),
    Postgres(PgStatement<'static>),
    SQLite(SqliteStatement<'static>),
}

impl StatementHandle {
    fn columns(&self) -> Vec<ColumnMetadata> {
        fn collect<C: Column>(columns: &[C]) -> Vec<ColumnMetadata> {
            columns
                .iter()
                .map(|c| {
                    ColumnMetadata::new(c.name(), c.type_info().name(), !c.type_info().is_null())
                })
                .collect()
        }

        use sqlx::Statement as _;
        match self {
            StatementHandle::MySql(s) => collect(s.columns()),
            StatementHandle::Postgres(s) => collect(s.columns()),
            StatementHandle::SQLite(s) => collect(s.columns()),
        }
    }
}

/// A statement prepared on one connection.
///
/// It can only be executed on the connection that prepared it.
#[derive(Debug)]
pub struct PreparedStatement {
    pub(crate) handle: StatementHandle,
    sql: String,
    names: Vec<String>,
    owner: Uuid,
    options: PrepareOptions,
}

impl PreparedStatement {
    pub(crate) fn new(
        handle: StatementHandle,
        sql: impl Into<String>,
        names: Vec<String>,
        owner: Uuid,
        options: PrepareOptions,
    ) -> Self {
        Self {
            handle,
            sql: sql.into(),
            names,
            owner,
            options,
        }
    }

    /// SQL text as passed to `prepare`, before placeholder rewriting.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Named placeholders in order of appearance, empty for positional SQL.
    pub fn placeholder_names(&self) -> &[String] {
        &self.names
    }

    pub fn uses_named_placeholders(&self) -> bool {
        !self.names.is_empty()
    }

    /// Id of the connection this statement belongs to.
    pub fn owner(&self) -> Uuid {
        self.owner
    }

    pub fn options(&self) -> PrepareOptions {
        self.options
    }

    /// Result columns as described by the server.
    pub fn columns(&self) -> Vec<ColumnMetadata> {
        self.handle.columns()
    }
}

/// What `Connection::execute` runs: literal SQL text or a prepared statement.
#[derive(Debug, Clone, Copy)]
pub enum Statement<'a> {
    /// SQL text, sent as-is when no parameters are given.
    Raw(&'a str),
    Prepared(&'a PreparedStatement),
}

impl<'a> Statement<'a> {
    pub fn sql(&self) -> &'a str {
        match self {
            Statement::Raw(sql) => sql,
            Statement::Prepared(stmt) => stmt.sql(),
        }
    }

    pub fn is_prepared(&self) -> bool {
        matches!(self, Statement::Prepared(_))
    }
}

impl<'a> From<&'a str> for Statement<'a> {
    fn from(sql: &'a str) -> Self {
        Statement::Raw(sql)
    }
}

impl<'a> From<&'a String> for Statement<'a> {
    fn from(sql: &'a String) -> Self {
        Statement::Raw(sql.as_str())
    }
}

impl<'a> From<&'a PreparedStatement> for Statement<'a> {
    fn from(stmt: &'a PreparedStatement) -> Self {
        Statement::Prepared(stmt)
    }
}

/// Fully buffered result of a successful execute.
///
/// Rows are read through a forward-only cursor, like a driver result set:
/// `fetch_one` and `fetch_column` advance it, `fetch_all` and
/// `fetch_all_column` drain what is left.
#[derive(Debug, Clone, Default)]
pub struct StatementResult {
    columns: Vec<ColumnMetadata>,
    rows: Vec<Map<String, JsonValue>>,
    rows_affected: u64,
    last_insert_id: Option<String>,
    cursor: usize,
}

impl StatementResult {
    pub fn new(
        columns: Vec<ColumnMetadata>,
        rows: Vec<Map<String, JsonValue>>,
        rows_affected: u64,
        last_insert_id: Option<String>,
    ) -> Self {
        Self {
            columns,
            rows,
            rows_affected,
            last_insert_id,
            cursor: 0,
        }
    }

    /// Decode driver rows. Column metadata comes from the first row.
    pub(crate) fn from_rows<R: RowToJson>(
        rows: &[R],
        rows_affected: u64,
        last_insert_id: Option<String>,
    ) -> Self {
        let columns = rows
            .first()
            .map(|r| r.column_metadata())
            .unwrap_or_default();
        let rows = rows.iter().map(|r| r.to_json_map()).collect();
        Self::new(columns, rows, rows_affected, last_insert_id)
    }

    /// Use `columns` when no row described the result columns.
    pub(crate) fn with_fallback_columns(
        mut self,
        columns: impl FnOnce() -> Vec<ColumnMetadata>,
    ) -> Self {
        if self.columns.is_empty() {
            self.columns = columns();
        }
        self
    }

    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows the statement returned.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Rows changed by INSERT, UPDATE or DELETE statements.
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Id generated by this statement, if it generated one.
    pub fn last_insert_id(&self) -> Option<&str> {
        self.last_insert_id.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Next row, or `None` once every row was read.
    pub fn fetch_one(&mut self) -> Option<Map<String, JsonValue>> {
        let row = self.rows.get(self.cursor).cloned();
        if row.is_some() {
            self.cursor += 1;
        }
        row
    }

    /// Every row not read yet.
    pub fn fetch_all(&mut self) -> Vec<Map<String, JsonValue>> {
        let rest = self.rows.get(self.cursor..).unwrap_or_default().to_vec();
        self.cursor = self.rows.len();
        rest
    }

    /// Column `idx` of the next row.
    ///
    /// Returns `None` when no rows are left or `idx` is out of range; the
    /// cursor only advances when a value is returned.
    pub fn fetch_column(&mut self, idx: usize) -> Option<JsonValue> {
        let value = self.column_value(self.cursor, idx)?;
        self.cursor += 1;
        Some(value)
    }

    /// Column `idx` of every row not read yet.
    pub fn fetch_all_column(&mut self, idx: usize) -> Vec<JsonValue> {
        if idx >= self.columns.len() {
            return Vec::new();
        }
        let values = (self.cursor..self.rows.len())
            .filter_map(|row| self.column_value(row, idx))
            .collect();
        self.cursor = self.rows.len();
        values
    }

    fn column_value(&self, row: usize, idx: usize) -> Option<JsonValue> {
        let name = &self.columns.get(idx)?.name;
        let row = self.rows.get(row)?;
        Some(row.get(name).cloned().unwrap_or(JsonValue::Null))
    }
}
