//! Query lifecycle events.
//!
//! A [`Connection`] reports four events to its sink: before and after a
//! statement is prepared, and before and after a statement is executed.
//! `after_prepare` fires whether or not preparation succeeded (with `None`
//! on failure); `after_execute` fires only after a successful execute.

use crate::db::{Connection, PreparedStatement, Statement};
use std::sync::Arc;
use tracing::debug;

/// Receiver of query lifecycle events.
///
/// Every method defaults to a no-op, so implementations only override the
/// events they care about. Sinks are called inline on the task running the
/// query and should not block.
pub trait EventSink: Send + Sync {
    fn before_prepare(&self, _conn: &Connection, _sql: &str) {}

    fn after_prepare(&self, _conn: &Connection, _statement: Option<&PreparedStatement>) {}

    fn before_execute(&self, _conn: &Connection, _statement: &Statement<'_>) {}

    fn after_execute(&self, _conn: &Connection, _statement: &Statement<'_>) {}
}

/// Sink that ignores every event. Used when none is injected.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {}

/// Sink that logs every event at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn before_prepare(&self, conn: &Connection, sql: &str) {
        debug!(
            connection = %conn.name(),
            level = conn.transaction_level(),
            sql = %sql,
            "Preparing statement"
        );
    }

    fn after_prepare(&self, conn: &Connection, statement: Option<&PreparedStatement>) {
        debug!(
            connection = %conn.name(),
            prepared = statement.is_some(),
            "Prepare finished"
        );
    }

    fn before_execute(&self, conn: &Connection, statement: &Statement<'_>) {
        debug!(
            connection = %conn.name(),
            level = conn.transaction_level(),
            prepared = statement.is_prepared(),
            sql = %statement.sql(),
            "Executing statement"
        );
    }

    fn after_execute(&self, conn: &Connection, statement: &Statement<'_>) {
        debug!(
            connection = %conn.name(),
            sql = %statement.sql(),
            "Statement executed"
        );
    }
}

/// The sink used when none is injected.
pub fn default_sink() -> Arc<dyn EventSink> {
    Arc::new(NoopSink)
}
