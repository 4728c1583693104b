//! A single database connection.
//!
//! [`Connection`] owns one dedicated driver connection (not a pool), since
//! transaction nesting state and savepoints live on that one session.
//! Statement failures are returned as [`QueryFailure`] values and recorded
//! as the connection's last error; only connection-level problems and
//! misuse are raised as [`DbError`].

use crate::db::attribute::{Attribute, AttributeValue};
use crate::db::macros::dispatch_connection;
use crate::db::params::{
    bind_mysql_param, bind_postgres_param, bind_sqlite_param, resolve_named,
    rewrite_named_placeholders,
};
use crate::db::quoting;
use crate::db::statement::{
    PrepareOptions, PreparedStatement, Statement, StatementHandle, StatementResult,
};
use crate::db::transaction::{TransactionCommand, TransactionDepth};
use crate::error::{DbError, DbResult, ErrorInfo, QueryFailure};
use crate::events::{EventSink, default_sink};
use crate::models::connection::validate_quote_char;
use crate::models::{ConnectParams, DatabaseType, Parameters, QueryParam};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection as _, Executor};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Driver-specific connection.
///
/// Reachable through [`Connection::raw_mut`] for driver features this crate
/// does not wrap.
pub enum DbConnection {
    MySql(MySqlConnection),
    Postgres(PgConnection),
    SQLite(SqliteConnection),
}

impl DbConnection {
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbConnection::MySql(_) => DatabaseType::MySQL,
            DbConnection::Postgres(_) => DatabaseType::PostgreSQL,
            DbConnection::SQLite(_) => DatabaseType::SQLite,
        }
    }
}

/// One named, open database connection.
pub struct Connection {
    id: Uuid,
    name: String,
    inner: DbConnection,
    quote_char: char,
    depth: TransactionDepth,
    error_info: ErrorInfo,
    last_error_code: String,
    last_error_message: String,
    last_insert_id: Option<String>,
    server_version: Option<String>,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("db_type", &self.db_type())
            .field("transaction_level", &self.depth.level())
            .field("server_version", &self.server_version)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Open a connection described by `params`.
    ///
    /// UTF-8 is always negotiated (`utf8mb4` on MySQL). The init commands
    /// from the driver options run in order before the connection is
    /// returned; if one fails the connection is closed and the error is
    /// returned.
    pub async fn open(name: impl Into<String>, params: &ConnectParams) -> DbResult<Self> {
        let name = name.into();
        params.options.validate().map_err(DbError::invalid_input)?;

        info!(
            connection = %name,
            target = %params.masked(),
            "Connecting to database"
        );

        let inner = match params.options.connect_timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), connect_driver(params))
                .await
                .map_err(|_| DbError::timeout("connect", secs))??,
            None => connect_driver(params).await?,
        };

        let mut conn = Self {
            id: Uuid::new_v4(),
            name,
            inner,
            quote_char: params.quote_char(),
            depth: TransactionDepth::new(),
            error_info: ErrorInfo::success(),
            last_error_code: String::new(),
            last_error_message: String::new(),
            last_insert_id: None,
            server_version: None,
            events: default_sink(),
        };

        for command in &params.options.init_commands {
            debug!(connection = %conn.name, sql = %command, "Running init command");
            if let Err(e) = conn.run_raw(command).await {
                let err = DbError::connection(
                    format!("Init command failed: {}", e),
                    "Check the init_commands driver option",
                );
                if let Err(close_err) = conn.close().await {
                    warn!(error = %close_err, "Failed to close connection");
                }
                return Err(err);
            }
        }

        conn.server_version = conn.query_server_version().await;

        info!(
            connection = %conn.name,
            server_version = ?conn.server_version,
            "Connected successfully"
        );
        Ok(conn)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn db_type(&self) -> DatabaseType {
        self.inner.db_type()
    }

    /// Server version, queried once when the connection was opened.
    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    /// Underlying driver connection.
    pub fn raw(&self) -> &DbConnection {
        &self.inner
    }

    /// Underlying driver connection, for driver features this crate does
    /// not wrap.
    ///
    /// Statements run here emit no events, do not update the error state
    /// or the insert id, and are not counted by the transaction depth.
    pub fn raw_mut(&mut self) -> &mut DbConnection {
        &mut self.inner
    }

    /// Replace the sink receiving this connection's query events.
    pub fn set_event_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.events = sink;
    }

    /// Prepare a statement.
    ///
    /// `:name` placeholders are rewritten to the driver's positional form;
    /// the names are kept on the statement so named parameters can be bound
    /// at execute time.
    pub async fn prepare(
        &mut self,
        sql: &str,
        options: PrepareOptions,
    ) -> Result<PreparedStatement, QueryFailure> {
        let events = Arc::clone(&self.events);
        events.before_prepare(self, sql);

        let rewritten = rewrite_named_placeholders(sql, self.db_type());
        let prepared = match &mut self.inner {
            DbConnection::MySql(c) => c
                .prepare(&rewritten.sql)
                .await
                .map(|s| StatementHandle::MySql(sqlx::Statement::to_owned(&s))),
            DbConnection::Postgres(c) => c
                .prepare(&rewritten.sql)
                .await
                .map(|s| StatementHandle::Postgres(sqlx::Statement::to_owned(&s))),
            DbConnection::SQLite(c) => c
                .prepare(&rewritten.sql)
                .await
                .map(|s| StatementHandle::SQLite(sqlx::Statement::to_owned(&s))),
        };

        match prepared {
            Ok(handle) => {
                let statement =
                    PreparedStatement::new(handle, sql, rewritten.names, self.id, options);
                self.error_info = ErrorInfo::success();
                events.after_prepare(self, Some(&statement));
                Ok(statement)
            }
            Err(e) => {
                events.after_prepare(self, None);
                Err(self.record_failure(ErrorInfo::from_sqlx(&e), sql))
            }
        }
    }

    /// Execute raw SQL or a prepared statement.
    ///
    /// Raw SQL without parameters is sent to the server verbatim, with no
    /// binding at all: the caller must make sure it contains no untrusted
    /// input. With parameters, raw SQL is prepared and bound like a
    /// prepared statement.
    ///
    /// The outer `Err` is raised when the statement belongs to another
    /// connection. Everything the server rejects, and named parameters that
    /// do not match the placeholders, come back as the inner `Err`.
    pub async fn execute<'s>(
        &mut self,
        statement: impl Into<Statement<'s>>,
        parameters: Option<Parameters>,
    ) -> DbResult<Result<StatementResult, QueryFailure>> {
        let statement = statement.into();
        if let Statement::Prepared(prepared) = statement {
            if prepared.owner() != self.id {
                return Err(DbError::invalid_statement(format!(
                    "statement was not prepared on connection '{}'",
                    self.name
                )));
            }
        }

        let events = Arc::clone(&self.events);
        events.before_execute(self, &statement);

        match self.run_statement(statement, parameters).await? {
            Ok(result) => {
                self.error_info = ErrorInfo::success();
                if let Some(id) = result.last_insert_id() {
                    self.last_insert_id = Some(id.to_string());
                }
                events.after_execute(self, &statement);
                Ok(Ok(result))
            }
            Err(info) => Ok(Err(self.record_failure(info, statement.sql()))),
        }
    }

    async fn run_statement(
        &mut self,
        statement: Statement<'_>,
        parameters: Option<Parameters>,
    ) -> DbResult<Result<StatementResult, ErrorInfo>> {
        match statement {
            Statement::Raw(sql) => {
                let result = match parameters {
                    None => self.fetch_raw(sql).await,
                    Some(parameters) => match bind_values(sql, parameters, self.db_type()) {
                        Ok((sql, values)) => self.fetch_bound(&sql, &values).await,
                        Err(info) => return Ok(Err(info)),
                    },
                };
                Ok(result.map_err(|e| ErrorInfo::from_sqlx(&e)))
            }
            Statement::Prepared(prepared) => {
                let values = match parameters {
                    None => Vec::new(),
                    Some(Parameters::Positional(values)) => values,
                    Some(Parameters::Named(values)) => {
                        match resolve_named(prepared.placeholder_names(), &values) {
                            Ok(values) => values,
                            Err(info) => return Ok(Err(info)),
                        }
                    }
                };
                let result = self.fetch_prepared(prepared, &values).await?;
                Ok(result.map_err(|e| ErrorInfo::from_sqlx(&e)))
            }
        }
    }

    async fn fetch_raw(&mut self, sql: &str) -> Result<StatementResult, sqlx::Error> {
        match &mut self.inner {
            DbConnection::MySql(c) => mysql::fetch_raw(c, sql).await,
            DbConnection::Postgres(c) => postgres::fetch_raw(c, sql).await,
            DbConnection::SQLite(c) => sqlite::fetch_raw(c, sql).await,
        }
    }

    async fn fetch_bound(
        &mut self,
        sql: &str,
        params: &[QueryParam],
    ) -> Result<StatementResult, sqlx::Error> {
        match &mut self.inner {
            DbConnection::MySql(c) => mysql::fetch_bound(c, sql, params).await,
            DbConnection::Postgres(c) => postgres::fetch_bound(c, sql, params).await,
            DbConnection::SQLite(c) => sqlite::fetch_bound(c, sql, params).await,
        }
    }

    async fn fetch_prepared(
        &mut self,
        prepared: &PreparedStatement,
        params: &[QueryParam],
    ) -> DbResult<Result<StatementResult, sqlx::Error>> {
        let persistent = prepared.options().persistent;
        let result = match (&mut self.inner, &prepared.handle) {
            (DbConnection::MySql(c), StatementHandle::MySql(s)) => {
                mysql::fetch_prepared(c, s, persistent, params).await
            }
            (DbConnection::Postgres(c), StatementHandle::Postgres(s)) => {
                postgres::fetch_prepared(c, s, persistent, params).await
            }
            (DbConnection::SQLite(c), StatementHandle::SQLite(s)) => {
                sqlite::fetch_prepared(c, s, persistent, params).await
            }
            _ => {
                return Err(DbError::invalid_statement(
                    "statement was prepared for a different driver",
                ));
            }
        };
        Ok(result.map(|r| r.with_fallback_columns(|| prepared.columns())))
    }

    /// Open a transaction level.
    ///
    /// The outermost level starts a real transaction; nested levels create
    /// a savepoint instead.
    pub async fn begin_transaction(&mut self) -> DbResult<()> {
        let before = self.depth;
        let command = self.depth.begin();
        if let Err(e) = self.run_transaction_command(command).await {
            self.depth = before;
            return Err(e);
        }
        Ok(())
    }

    /// Close the innermost transaction level, committing the real
    /// transaction when it is the outermost one.
    ///
    /// Fails without touching the server when no transaction is open.
    pub async fn commit(&mut self) -> DbResult<()> {
        let command = self.depth.commit()?;
        self.run_transaction_command(command).await
    }

    /// Roll back the innermost transaction level.
    ///
    /// A failure of the outermost ROLLBACK is logged and ignored, and
    /// rolling back with no open transaction does nothing.
    pub async fn roll_back(&mut self) -> DbResult<()> {
        let Some(command) = self.depth.rollback() else {
            warn!(connection = %self.name, "Rollback requested with no active transaction");
            return Ok(());
        };
        match self.run_transaction_command(command).await {
            Err(e) if command.is_outermost() => {
                warn!(connection = %self.name, error = %e, "Ignoring rollback failure");
                Ok(())
            }
            other => other,
        }
    }

    /// Number of open transaction levels.
    pub fn transaction_level(&self) -> u32 {
        self.depth.level()
    }

    pub fn in_transaction(&self) -> bool {
        self.depth.is_active()
    }

    async fn run_transaction_command(&mut self, command: TransactionCommand) -> DbResult<()> {
        let sql = command.sql(self.db_type());
        debug!(
            connection = %self.name,
            level = self.depth.level(),
            sql = %sql,
            "Transaction step"
        );
        match self.run_raw(&sql).await {
            Ok(()) => {
                self.error_info = ErrorInfo::success();
                Ok(())
            }
            Err(e) => {
                self.error_info = ErrorInfo::from_sqlx(&e);
                Err(DbError::transaction(format!("{} failed: {}", sql, e)))
            }
        }
    }

    /// Quote an identifier with this connection's quote character.
    pub fn quote_identifier(&self, identifier: &str) -> String {
        quoting::quote_identifier(identifier, self.quote_char)
    }

    pub fn quote_identifier_symbol(&self) -> char {
        self.quote_char
    }

    /// Read a connection attribute. `None` when the value is unknown.
    pub fn get_attribute(&self, attribute: Attribute) -> Option<AttributeValue> {
        match attribute {
            Attribute::DriverName => Some(self.db_type().driver_name().into()),
            Attribute::ServerVersion => self.server_version.as_deref().map(AttributeValue::from),
            Attribute::QuoteChar => Some(self.quote_char.into()),
            Attribute::Autocommit => Some((!self.depth.is_active()).into()),
            Attribute::CachedStatements => Some(
                dispatch_connection!(&self.inner, c => c.cached_statements_size()).into(),
            ),
        }
    }

    /// Change a writable connection attribute.
    pub fn set_attribute(&mut self, attribute: Attribute, value: AttributeValue) -> DbResult<()> {
        match (attribute, value) {
            (Attribute::QuoteChar, AttributeValue::Char(c)) => {
                validate_quote_char(c).map_err(DbError::invalid_input)?;
                debug!(connection = %self.name, quote_char = %c, "Set identifier quote");
                self.quote_char = c;
                Ok(())
            }
            (Attribute::QuoteChar, other) => Err(DbError::invalid_input(format!(
                "{} expects a character, got {:?}",
                attribute, other
            ))),
            (attribute, _) => Err(DbError::invalid_input(format!(
                "{} is read-only",
                attribute
            ))),
        }
    }

    /// Render a value as an SQL literal for this connection's driver.
    ///
    /// Prefer bound parameters; this is for SQL that must be built as text.
    pub fn quote(&self, value: impl Into<QueryParam>) -> String {
        quoting::quote_literal(&value.into(), self.db_type())
    }

    /// Names of the tables in the current database, optionally filtered by
    /// an SQL `LIKE` pattern.
    pub async fn get_tables(&mut self, like: Option<&str>) -> Result<Vec<String>, QueryFailure> {
        let (sql, params) = tables_query(self.db_type(), like);
        match self.fetch_bound(&sql, &params).await {
            Ok(mut result) => {
                self.error_info = ErrorInfo::success();
                Ok(result
                    .fetch_all_column(0)
                    .into_iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect())
            }
            Err(e) => Err(self.record_failure(ErrorInfo::from_sqlx(&e), &sql)),
        }
    }

    /// Id generated by the most recent insert on this connection, `"0"`
    /// when there is none.
    ///
    /// PostgreSQL is asked for `lastval()`, so inside a transaction a
    /// connection that never used a sequence will abort that transaction.
    pub async fn insert_id(&mut self) -> String {
        if let DbConnection::Postgres(c) = &mut self.inner {
            return match sqlx::query_scalar::<_, i64>("SELECT lastval()")
                .fetch_one(c)
                .await
            {
                Ok(id) => {
                    self.error_info = ErrorInfo::success();
                    id.to_string()
                }
                Err(e) => {
                    debug!(connection = %self.name, error = %e, "No sequence value available");
                    self.error_info = ErrorInfo::from_sqlx(&e);
                    "0".to_string()
                }
            };
        }
        self.last_insert_id
            .clone()
            .unwrap_or_else(|| "0".to_string())
    }

    /// SQLSTATE of the last failed statement, empty if none failed yet.
    pub fn last_error_code(&self) -> &str {
        &self.last_error_code
    }

    /// Message of the last failed statement, empty if none failed yet.
    pub fn last_error_message(&self) -> &str {
        &self.last_error_message
    }

    /// Error details of the most recent operation; success state when it
    /// succeeded.
    pub fn error_info(&self) -> &ErrorInfo {
        &self.error_info
    }

    /// [`Self::error_info`] as one `" - "` separated string.
    pub fn error_msg(&self) -> String {
        self.error_info.to_string()
    }

    /// Check that the server still answers.
    pub async fn ping(&mut self) -> DbResult<()> {
        dispatch_connection!(&mut self.inner, c => c.ping().await).map_err(DbError::from)
    }

    /// Close the connection gracefully.
    ///
    /// An open transaction is rolled back by the server.
    pub async fn close(self) -> DbResult<()> {
        if self.depth.is_active() {
            warn!(
                connection = %self.name,
                level = self.depth.level(),
                "Closing connection with an open transaction"
            );
        }
        info!(connection = %self.name, "Closing connection");
        dispatch_connection!(self.inner, c => c.close().await).map_err(DbError::from)
    }

    fn record_failure(&mut self, info: ErrorInfo, sql: &str) -> QueryFailure {
        warn!(
            connection = %self.name,
            sql_state = %info.sql_state,
            error = %info,
            sql = %sql,
            "Statement failed"
        );
        self.last_error_code = info.sql_state.clone();
        self.last_error_message = info.message.clone().unwrap_or_default();
        self.error_info = info.clone();
        QueryFailure::new(info)
    }

    async fn run_raw(&mut self, sql: &str) -> Result<(), sqlx::Error> {
        dispatch_connection!(&mut self.inner, c => c.execute(sql).await.map(|_| ()))
    }

    async fn query_server_version(&mut self) -> Option<String> {
        let sql = match self.db_type() {
            DatabaseType::SQLite => "SELECT sqlite_version()",
            DatabaseType::MySQL | DatabaseType::PostgreSQL => "SELECT version()",
        };
        let result = dispatch_connection!(
            &mut self.inner,
            c => sqlx::query_scalar::<_, String>(sql).fetch_one(c).await
        );
        match result {
            Ok(version) => {
                debug!(version = %version, "Got server version");
                Some(version)
            }
            Err(e) => {
                warn!(error = %e, "Failed to get server version");
                None
            }
        }
    }
}

/// Turn caller parameters into positional values, rewriting `:name`
/// placeholders when the parameters are named.
fn bind_values(
    sql: &str,
    parameters: Parameters,
    db: DatabaseType,
) -> Result<(String, Vec<QueryParam>), ErrorInfo> {
    match parameters {
        Parameters::Positional(values) => Ok((sql.to_string(), values)),
        Parameters::Named(values) => {
            let rewritten = rewrite_named_placeholders(sql, db);
            let ordered = resolve_named(&rewritten.names, &values)?;
            Ok((rewritten.sql, ordered))
        }
    }
}

/// Table listing query for `db`, with the `LIKE` pattern as its only
/// parameter.
fn tables_query(db: DatabaseType, like: Option<&str>) -> (String, Vec<QueryParam>) {
    let (base, filter, order) = match db {
        DatabaseType::MySQL => (
            "SELECT TABLE_NAME FROM information_schema.TABLES WHERE TABLE_SCHEMA = DATABASE()",
            " AND TABLE_NAME LIKE ?",
            " ORDER BY TABLE_NAME",
        ),
        DatabaseType::PostgreSQL => (
            "SELECT tablename FROM pg_catalog.pg_tables WHERE schemaname = current_schema()",
            " AND tablename LIKE $1",
            " ORDER BY tablename",
        ),
        DatabaseType::SQLite => (
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
            " AND name LIKE ?",
            " ORDER BY name",
        ),
    };
    match like {
        Some(pattern) => (
            format!("{}{}{}", base, filter, order),
            vec![QueryParam::from(pattern)],
        ),
        None => (format!("{}{}", base, order), Vec::new()),
    }
}

/// Connect the driver named by `params`.
async fn connect_driver(params: &ConnectParams) -> DbResult<DbConnection> {
    let options = &params.options;
    let result = match params.driver {
        DatabaseType::MySQL => {
            let mut opts = MySqlConnectOptions::new()
                .host(&params.host)
                .username(&params.user)
                .password(&params.password)
                .database(&params.database)
                .charset("utf8mb4");
            if let Some(port) = params.port {
                opts = opts.port(port);
            }
            if let Some(capacity) = options.statement_cache_capacity {
                opts = opts.statement_cache_capacity(capacity);
            }
            opts.connect().await.map(DbConnection::MySql)
        }
        DatabaseType::PostgreSQL => {
            let mut opts = PgConnectOptions::new()
                .host(&params.host)
                .username(&params.user)
                .password(&params.password)
                .database(&params.database);
            if let Some(port) = params.port {
                opts = opts.port(port);
            }
            if let Some(capacity) = options.statement_cache_capacity {
                opts = opts.statement_cache_capacity(capacity);
            }
            opts.connect().await.map(DbConnection::Postgres)
        }
        DatabaseType::SQLite => {
            let mut opts = if params.database == ":memory:" {
                SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
                    DbError::connection(
                        format!("Invalid SQLite options: {}", e),
                        "Check the database path",
                    )
                })?
            } else {
                SqliteConnectOptions::new()
                    .filename(&params.database)
                    .create_if_missing(options.create_if_missing)
            };
            if let Some(capacity) = options.statement_cache_capacity {
                opts = opts.statement_cache_capacity(capacity);
            }
            opts.connect().await.map(DbConnection::SQLite)
        }
    };

    result.map_err(|e| {
        DbError::connection(
            format!("Failed to connect: {}", e),
            connection_suggestion(params.driver, &e),
        )
    })
}

/// Generate a helpful suggestion for connection errors.
fn connection_suggestion(db_type: DatabaseType, error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        return format!(
            "Check that the {} server is running and accessible",
            db_type
        );
    }

    if error_str.contains("authentication")
        || error_str.contains("password")
        || error_str.contains("access denied")
    {
        return "Verify the database user and password".to_string();
    }

    if error_str.contains("does not exist") || error_str.contains("unknown database") {
        return "Check that the database name exists".to_string();
    }

    if error_str.contains("unable to open database file") {
        return "Check that the SQLite file exists or enable create_if_missing".to_string();
    }

    match db_type {
        DatabaseType::SQLite => "Verify the file path exists and is accessible".to_string(),
        DatabaseType::MySQL | DatabaseType::PostgreSQL => {
            format!("Verify the host, port and database name of the {} server", db_type)
        }
    }
}

mod mysql {
    use super::*;
    use futures_util::TryStreamExt;
    use sqlx::Statement as _;
    use sqlx::Either;
    use sqlx::mysql::{MySqlQueryResult, MySqlRow, MySqlStatement};

    pub(super) async fn fetch_raw(
        conn: &mut MySqlConnection,
        sql: &str,
    ) -> Result<StatementResult, sqlx::Error> {
        let items = conn.fetch_many(sql).try_collect::<Vec<_>>().await?;
        Ok(collect(items))
    }

    pub(super) async fn fetch_bound(
        conn: &mut MySqlConnection,
        sql: &str,
        params: &[QueryParam],
    ) -> Result<StatementResult, sqlx::Error> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_mysql_param(query, param);
        }
        let items = conn.fetch_many(query).try_collect::<Vec<_>>().await?;
        Ok(collect(items))
    }

    pub(super) async fn fetch_prepared(
        conn: &mut MySqlConnection,
        stmt: &MySqlStatement<'static>,
        persistent: bool,
        params: &[QueryParam],
    ) -> Result<StatementResult, sqlx::Error> {
        let mut query = stmt.query().persistent(persistent);
        for param in params {
            query = bind_mysql_param(query, param);
        }
        let items = conn.fetch_many(query).try_collect::<Vec<_>>().await?;
        Ok(collect(items))
    }

    fn collect(items: Vec<Either<MySqlQueryResult, MySqlRow>>) -> StatementResult {
        let mut rows = Vec::new();
        let mut rows_affected = 0;
        let mut last_insert_id = None;
        for item in items {
            match item {
                Either::Left(done) => {
                    rows_affected += done.rows_affected();
                    if done.last_insert_id() != 0 {
                        last_insert_id = Some(done.last_insert_id().to_string());
                    }
                }
                Either::Right(row) => rows.push(row),
            }
        }
        StatementResult::from_rows(&rows, rows_affected, last_insert_id)
    }
}

mod postgres {
    use super::*;
    use futures_util::TryStreamExt;
    use sqlx::Statement as _;
    use sqlx::Either;
    use sqlx::postgres::{PgQueryResult, PgRow, PgStatement};

    pub(super) async fn fetch_raw(
        conn: &mut PgConnection,
        sql: &str,
    ) -> Result<StatementResult, sqlx::Error> {
        let items = conn.fetch_many(sql).try_collect::<Vec<_>>().await?;
        Ok(collect(items))
    }

    pub(super) async fn fetch_bound(
        conn: &mut PgConnection,
        sql: &str,
        params: &[QueryParam],
    ) -> Result<StatementResult, sqlx::Error> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_postgres_param(query, param);
        }
        let items = conn.fetch_many(query).try_collect::<Vec<_>>().await?;
        Ok(collect(items))
    }

    pub(super) async fn fetch_prepared(
        conn: &mut PgConnection,
        stmt: &PgStatement<'static>,
        persistent: bool,
        params: &[QueryParam],
    ) -> Result<StatementResult, sqlx::Error> {
        let mut query = stmt.query().persistent(persistent);
        for param in params {
            query = bind_postgres_param(query, param);
        }
        let items = conn.fetch_many(query).try_collect::<Vec<_>>().await?;
        Ok(collect(items))
    }

    // sequence values are read with lastval() instead
    fn collect(items: Vec<Either<PgQueryResult, PgRow>>) -> StatementResult {
        let mut rows = Vec::new();
        let mut rows_affected = 0;
        for item in items {
            match item {
                Either::Left(done) => rows_affected += done.rows_affected(),
                Either::Right(row) => rows.push(row),
            }
        }
        StatementResult::from_rows(&rows, rows_affected, None)
    }
}

mod sqlite {
    use super::*;
    use futures_util::TryStreamExt;
    use sqlx::Statement as _;
    use sqlx::Either;
    use sqlx::sqlite::{SqliteQueryResult, SqliteRow, SqliteStatement};

    pub(super) async fn fetch_raw(
        conn: &mut SqliteConnection,
        sql: &str,
    ) -> Result<StatementResult, sqlx::Error> {
        let items = conn.fetch_many(sql).try_collect::<Vec<_>>().await?;
        Ok(collect(items))
    }

    pub(super) async fn fetch_bound(
        conn: &mut SqliteConnection,
        sql: &str,
        params: &[QueryParam],
    ) -> Result<StatementResult, sqlx::Error> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_sqlite_param(query, param);
        }
        let items = conn.fetch_many(query).try_collect::<Vec<_>>().await?;
        Ok(collect(items))
    }

    pub(super) async fn fetch_prepared(
        conn: &mut SqliteConnection,
        stmt: &SqliteStatement<'static>,
        persistent: bool,
        params: &[QueryParam],
    ) -> Result<StatementResult, sqlx::Error> {
        let mut query = stmt.query().persistent(persistent);
        for param in params {
            query = bind_sqlite_param(query, param);
        }
        let items = conn.fetch_many(query).try_collect::<Vec<_>>().await?;
        Ok(collect(items))
    }

    fn collect(items: Vec<Either<SqliteQueryResult, SqliteRow>>) -> StatementResult {
        let mut rows = Vec::new();
        let mut rows_affected = 0;
        let mut last_insert_id = None;
        for item in items {
            match item {
                Either::Left(done) => {
                    rows_affected += done.rows_affected();
                    if done.rows_affected() > 0 && done.last_insert_rowid() != 0 {
                        last_insert_id = Some(done.last_insert_rowid().to_string());
                    }
                }
                Either::Right(row) => rows.push(row),
            }
        }
        StatementResult::from_rows(&rows, rows_affected, last_insert_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_query_with_pattern() {
        let (sql, params) = tables_query(DatabaseType::SQLite, Some("admin%"));
        assert!(sql.contains("name LIKE ?"));
        assert!(sql.ends_with("ORDER BY name"));
        assert_eq!(params, vec![QueryParam::from("admin%")]);

        let (sql, params) = tables_query(DatabaseType::PostgreSQL, Some("x"));
        assert!(sql.contains("tablename LIKE $1"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_tables_query_without_pattern() {
        let (sql, params) = tables_query(DatabaseType::MySQL, None);
        assert!(!sql.contains("LIKE"));
        assert!(params.is_empty());
    }

    #[test]
    fn test_bind_values_named() {
        let params = Parameters::named([("id", 5), ("type", 1)]);
        let (sql, values) = bind_values(
            "SELECT * FROM admin WHERE admin_type = :type AND admin_id = :id",
            params,
            DatabaseType::PostgreSQL,
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM admin WHERE admin_type = $1 AND admin_id = $2");
        assert_eq!(values, vec![QueryParam::Int(1), QueryParam::Int(5)]);
    }

    #[test]
    fn test_bind_values_positional_unchanged() {
        let (sql, values) = bind_values(
            "SELECT ?",
            Parameters::positional([7]),
            DatabaseType::MySQL,
        )
        .unwrap();
        assert_eq!(sql, "SELECT ?");
        assert_eq!(values, vec![QueryParam::Int(7)]);
    }

    #[test]
    fn test_connection_suggestion() {
        let err = sqlx::Error::Protocol("connection refused".to_string());
        assert!(connection_suggestion(DatabaseType::MySQL, &err).contains("MySQL"));
        let err = sqlx::Error::Protocol("unable to open database file".to_string());
        assert!(connection_suggestion(DatabaseType::SQLite, &err).contains("create_if_missing"));
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_options() {
        let mut params = ConnectParams::sqlite_memory();
        params.options.statement_cache_capacity = Some(0);
        let err = Connection::open("bad", &params).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }
}
