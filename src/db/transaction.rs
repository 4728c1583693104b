//! Nested transaction emulation.
//!
//! Only the outermost level opens a real transaction. Every inner level is a
//! savepoint named `TRANSACTION<n>`, where `n` is the depth before the inner
//! `begin` (so the first nested level is `TRANSACTION1`). `commit` and
//! `rollback` decrement first and then act on the new depth.

use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;

/// Prefix of the savepoint names issued for nested levels.
pub const SAVEPOINT_PREFIX: &str = "TRANSACTION";

/// Statement issued for one transaction step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionCommand {
    Begin,
    Savepoint(u32),
    Commit,
    Release(u32),
    Rollback,
    RollbackTo(u32),
}

impl TransactionCommand {
    /// SQL text for this step.
    pub fn sql(&self, db: DatabaseType) -> String {
        match self {
            Self::Begin => match db {
                DatabaseType::MySQL => "START TRANSACTION".to_string(),
                DatabaseType::PostgreSQL | DatabaseType::SQLite => "BEGIN".to_string(),
            },
            Self::Savepoint(n) => format!("SAVEPOINT {}", savepoint_name(*n)),
            Self::Commit => "COMMIT".to_string(),
            Self::Release(n) => format!("RELEASE SAVEPOINT {}", savepoint_name(*n)),
            Self::Rollback => "ROLLBACK".to_string(),
            Self::RollbackTo(n) => format!("ROLLBACK TO SAVEPOINT {}", savepoint_name(*n)),
        }
    }

    /// True for the steps that open or close the real transaction.
    pub fn is_outermost(&self) -> bool {
        matches!(self, Self::Begin | Self::Commit | Self::Rollback)
    }
}

/// Savepoint name for nesting level `n`.
pub fn savepoint_name(n: u32) -> String {
    format!("{}{}", SAVEPOINT_PREFIX, n)
}

/// Transaction nesting counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionDepth(u32);

impl TransactionDepth {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn level(&self) -> u32 {
        self.0
    }

    pub fn is_active(&self) -> bool {
        self.0 > 0
    }

    /// Enter one level and return the statement that opens it.
    pub fn begin(&mut self) -> TransactionCommand {
        let previous = self.0;
        self.0 += 1;
        if previous == 0 {
            TransactionCommand::Begin
        } else {
            TransactionCommand::Savepoint(previous)
        }
    }

    /// Leave one level and return the statement that commits it.
    ///
    /// Committing with no open transaction is an error and leaves the depth at 0.
    pub fn commit(&mut self) -> DbResult<TransactionCommand> {
        if self.0 == 0 {
            return Err(DbError::transaction(
                "Cannot commit: no active transaction",
            ));
        }
        self.0 -= 1;
        Ok(if self.0 == 0 {
            TransactionCommand::Commit
        } else {
            TransactionCommand::Release(self.0)
        })
    }

    /// Leave one level and return the statement that rolls it back.
    ///
    /// Returns `None` when there is nothing to roll back.
    pub fn rollback(&mut self) -> Option<TransactionCommand> {
        if self.0 == 0 {
            return None;
        }
        self.0 -= 1;
        Some(if self.0 == 0 {
            TransactionCommand::Rollback
        } else {
            TransactionCommand::RollbackTo(self.0)
        })
    }
}
