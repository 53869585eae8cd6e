use crate::backend::Connection;
use crate::core::Result;
use futures::future::BoxFuture;
use log::{debug, warn};

/// Transaction Wrapper: commit on success, roll back on failure.
///
/// Runs the operation against an already-open connection. A normal return
/// commits; any failure rolls back and re-raises the original error
/// unchanged. A rollback failure is logged, never substituted for the
/// operation's error. Compose this *inside* a
/// [`crate::access::ConnectionScope`] so the same connection instance is
/// committed or rolled back.
///
/// # Examples
///
/// ```ignore
/// scope.run(|conn| Box::pin(within_transaction(conn, |conn| Box::pin(async move {
///     conn.execute("UPDATE users SET email = $1 WHERE id = $2", &params).await?;
///     Ok(())
/// })))).await?;
/// ```
pub async fn within_transaction<C, T, F>(conn: &mut C, op: F) -> Result<T>
where
    C: Connection,
    F: for<'c> FnOnce(&'c mut C) -> BoxFuture<'c, Result<T>>,
{
    match op(&mut *conn).await {
        Ok(value) => {
            conn.commit().await?;
            debug!("transaction committed");
            Ok(value)
        }
        Err(err) => {
            match conn.rollback().await {
                Ok(()) => warn!("transaction rolled back after error: {}", err),
                Err(rollback_err) => {
                    warn!(
                        "rollback failed after error '{}': {}",
                        err, rollback_err
                    );
                }
            }
            Err(err)
        }
    }
}
