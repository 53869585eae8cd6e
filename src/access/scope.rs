use crate::backend::config::ConnectionConfig;
use crate::backend::{Backend, Connection};
use crate::core::{DbError, Result};
use futures::future::BoxFuture;
use log::{debug, error, warn};

/// Connection Scope: one fresh connection per call.
///
/// Opens a new connection, hands it to the operation with exclusive access,
/// and closes it exactly once on every exit path. No retry, no pooling; a
/// new connection per invocation keeps the lifetime rules trivial. Callers
/// wanting resilience compose a [`crate::access::RetryPolicy`] around it.
pub struct ConnectionScope<B> {
    backend: B,
    config: ConnectionConfig,
}

impl<B: Backend> ConnectionScope<B> {
    /// Create a scope over a backend. Rejects invalid configuration.
    pub fn new(backend: B, config: ConnectionConfig) -> Result<Self> {
        config.validate().map_err(DbError::ConfigError)?;
        Ok(Self { backend, config })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run one operation against a freshly opened connection.
    ///
    /// The operation borrows the connection exclusively; once `run` returns,
    /// the connection is closed and gone. Operation failures are logged and
    /// propagated unchanged. If the operation succeeded but the close fails,
    /// the close failure surfaces; if both fail, the operation failure wins
    /// and the close failure is only logged.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let result = scope
    ///     .run(|conn| Box::pin(async move {
    ///         conn.execute("SELECT * FROM users", &[]).await
    ///     }))
    ///     .await?;
    /// ```
    pub async fn run<T, F>(&self, op: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut B::Conn) -> BoxFuture<'c, Result<T>>,
    {
        let mut conn = self.backend.open(&self.config).await?;
        debug!(
            "connection opened to {}:{}/{}",
            self.config.host, self.config.port, self.config.database
        );

        let result = op(&mut conn).await;
        if let Err(err) = &result {
            error!("database operation failed: {}", err);
        }

        match conn.close().await {
            Ok(()) => debug!("connection closed"),
            Err(close_err) => {
                if result.is_ok() {
                    return Err(close_err);
                }
                warn!("failed to close connection after error: {}", close_err);
            }
        }

        result
    }
}
