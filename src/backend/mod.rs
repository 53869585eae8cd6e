//! Database boundary: the connection-providing backend contract.
//!
//! The backend is an external collaborator. This crate defines the seam the
//! access layers are written against and does not reimplement a database;
//! [`mock`] provides an instrumented stand-in for tests.

pub mod config;
pub mod mock;

use crate::core::{Result, Value};
use crate::result::QueryResult;
use async_trait::async_trait;
use config::ConnectionConfig;

/// A live session handle to a database.
///
/// Similar to postgres::Connection or mysql::Conn. The handle is owned
/// exclusively by one decorated call; it is never shared.
#[async_trait]
pub trait Connection: Send {
    /// Execute a statement with bound parameters.
    async fn execute(&mut self, statement: &str, params: &[Value]) -> Result<QueryResult>;

    /// Finalize all changes made within the current transaction scope.
    async fn commit(&mut self) -> Result<()>;

    /// Discard all changes made within the current transaction scope.
    async fn rollback(&mut self) -> Result<()>;

    /// Release the session. Using the handle afterwards is an error.
    async fn close(&mut self) -> Result<()>;
}

/// Opens connections for the access layers.
///
/// Failures surface as [`crate::DbError::ConnectionError`]; the Connection
/// Scope does not retry them itself, that is the Retry Policy's job when the
/// caller composes one around it.
#[async_trait]
pub trait Backend: Send + Sync {
    type Conn: Connection;

    async fn open(&self, config: &ConnectionConfig) -> Result<Self::Conn>;
}
