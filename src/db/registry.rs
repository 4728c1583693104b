//! Registry of named connections.
//!
//! The registry is a cheap cloneable handle; clones share the same map.
//! Each connection sits behind its own async mutex, so one caller at a time
//! runs statements on it while other names stay usable.

use crate::db::{Connection, DbConnection};
use crate::error::{DbError, DbResult};
use crate::events::{EventSink, default_sink};
use crate::models::{ConnectParams, DEFAULT_CONNECTION_NAME};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMappedMutexGuard, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

/// A registered connection, shared between the registry and its callers.
pub type SharedConnection = Arc<Mutex<Connection>>;

/// Locked driver connection of a registered connection.
pub type RawConnection = OwnedMappedMutexGuard<Connection, DbConnection>;

#[derive(Clone)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<String, SharedConnection>>>,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry").finish_non_exhaustive()
    }
}

impl ConnectionRegistry {
    /// Create an empty registry whose connections report to no sink.
    pub fn new() -> Self {
        Self::with_event_sink(default_sink())
    }

    /// Create an empty registry; every connection it opens reports to `sink`.
    pub fn with_event_sink(sink: Arc<dyn EventSink>) -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            events: sink,
        }
    }

    /// Open a connection and register it under `name`.
    ///
    /// A connection already registered under `name` is replaced and closed
    /// once the new one is open. When opening fails the registry is left
    /// unchanged: a connection already registered under `name` stays
    /// registered and usable, and an unused name stays unregistered.
    pub async fn connect(&self, name: &str, params: &ConnectParams) -> DbResult<SharedConnection> {
        let mut conn = Connection::open(name, params).await?;
        conn.set_event_sink(Arc::clone(&self.events));
        let shared = Arc::new(Mutex::new(conn));

        // Swap under the lock, close the old connection outside of it
        let previous = {
            let mut connections = self.connections.write().await;
            connections.insert(name.to_string(), Arc::clone(&shared))
        };

        if let Some(previous) = previous {
            info!(connection = %name, "Replacing existing connection");
            close_shared(name, previous).await;
        }

        Ok(shared)
    }

    /// Open the connection named `"default"`.
    pub async fn connect_default(&self, params: &ConnectParams) -> DbResult<SharedConnection> {
        self.connect(DEFAULT_CONNECTION_NAME, params).await
    }

    /// Get the connection registered under `name`.
    pub async fn get(&self, name: &str) -> DbResult<SharedConnection> {
        let connections = self.connections.read().await;
        connections
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::connection_not_found(name))
    }

    /// Get the connection named `"default"`.
    pub async fn get_default(&self) -> DbResult<SharedConnection> {
        self.get(DEFAULT_CONNECTION_NAME).await
    }

    /// Lock the connection registered under `name` and hand out its driver
    /// connection.
    ///
    /// The connection stays locked until the guard is dropped. See
    /// [`Connection::raw_mut`] for what bypassing the wrapper skips.
    pub async fn get_raw(&self, name: &str) -> DbResult<RawConnection> {
        let shared = self.get(name).await?;
        let guard = shared.lock_owned().await;
        Ok(OwnedMutexGuard::map(guard, Connection::raw_mut))
    }

    /// Remove the connection registered under `name` and close it.
    pub async fn disconnect(&self, name: &str) -> DbResult<()> {
        let removed = {
            let mut connections = self.connections.write().await;
            connections.remove(name)
        };
        match removed {
            Some(conn) => {
                close_shared(name, conn).await;
                Ok(())
            }
            None => Err(DbError::connection_not_found(name)),
        }
    }

    /// Check if a connection is registered under `name`.
    pub async fn contains(&self, name: &str) -> bool {
        let connections = self.connections.read().await;
        connections.contains_key(name)
    }

    /// Names of all registered connections, sorted.
    pub async fn names(&self) -> Vec<String> {
        let connections = self.connections.read().await;
        let mut names: Vec<String> = connections.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Close every connection and empty the registry.
    pub async fn close_all(&self) {
        let drained: Vec<(String, SharedConnection)> = {
            let mut connections = self.connections.write().await;
            connections.drain().collect()
        };
        for (name, conn) in drained {
            close_shared(&name, conn).await;
        }
        info!("All connections closed");
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Close a connection removed from the registry.
///
/// If a caller still holds a handle, the connection is closed when the last
/// handle is dropped instead.
async fn close_shared(name: &str, conn: SharedConnection) {
    match Arc::try_unwrap(conn) {
        Ok(mutex) => {
            if let Err(e) = mutex.into_inner().close().await {
                warn!(connection = %name, error = %e, "Failed to close connection");
            }
        }
        Err(_) => {
            debug!(
                connection = %name,
                "Connection still in use, it will close when released"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_creation() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.len().await, 0);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_connection_not_found() {
        let registry = ConnectionRegistry::new();
        let result = registry.get("nonexistent").await;
        assert!(matches!(result, Err(DbError::ConnectionNotFound { .. })));
        assert!(registry.get_default().await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_disconnect_unknown_name() {
        let registry = ConnectionRegistry::new();
        let result = registry.disconnect("nonexistent").await;
        assert!(matches!(result, Err(DbError::ConnectionNotFound { .. })));
    }

    #[tokio::test]
    async fn test_names_empty() {
        let registry = ConnectionRegistry::new();
        assert!(registry.names().await.is_empty());
        assert!(!registry.contains(DEFAULT_CONNECTION_NAME).await);
    }
}
