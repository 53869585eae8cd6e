//! Instrumented in-memory backend for tests.
//!
//! Records every open/close/commit/rollback/execute, serves a FIFO script of
//! canned results or injected failures, and can refuse the next N opens. The
//! access-layer tests in this crate assert their contracts against these
//! counters; downstream test suites can do the same.

use crate::core::{DbError, Result, Row, Value};
use crate::result::QueryResult;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::config::ConnectionConfig;
use super::{Backend, Connection};

/// Snapshot of the calls recorded so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub opens: usize,
    pub closes: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub executes: usize,
}

#[derive(Debug)]
enum Scripted {
    Rows(QueryResult),
    Fail(String),
}

#[derive(Debug, Default)]
struct Shared {
    opens: AtomicUsize,
    closes: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    executes: AtomicUsize,
    failing_opens: AtomicUsize,
    statements: Mutex<Vec<String>>,
    script: Mutex<VecDeque<Scripted>>,
}

/// Test-double backend. Cloning shares the recorder and the script, so a
/// test can keep one handle while the code under test owns another.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    shared: Arc<Shared>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a canned result; `execute` pops the script front-to-back.
    /// An empty script yields empty results.
    pub fn enqueue_result(&self, result: QueryResult) {
        self.shared
            .script
            .lock()
            .expect("mock script lock poisoned")
            .push_back(Scripted::Rows(result));
    }

    /// Queue a canned result built from column names and rows.
    pub fn enqueue_rows(&self, columns: &[&str], rows: Vec<Row>) {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        self.enqueue_result(QueryResult::new(columns, rows));
    }

    /// Queue a failure; `execute` raises it as an `OperationError`.
    pub fn enqueue_failure(&self, message: &str) {
        self.shared
            .script
            .lock()
            .expect("mock script lock poisoned")
            .push_back(Scripted::Fail(message.to_string()));
    }

    /// Make the next `n` calls to `open` fail with a `ConnectionError`.
    pub fn fail_next_opens(&self, n: usize) {
        self.shared.failing_opens.store(n, Ordering::SeqCst);
    }

    pub fn counts(&self) -> CallCounts {
        CallCounts {
            opens: self.shared.opens.load(Ordering::SeqCst),
            closes: self.shared.closes.load(Ordering::SeqCst),
            commits: self.shared.commits.load(Ordering::SeqCst),
            rollbacks: self.shared.rollbacks.load(Ordering::SeqCst),
            executes: self.shared.executes.load(Ordering::SeqCst),
        }
    }

    /// Statements seen by `execute`, in call order.
    pub fn executed_statements(&self) -> Vec<String> {
        self.shared
            .statements
            .lock()
            .expect("mock statement lock poisoned")
            .clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    type Conn = MockConnection;

    async fn open(&self, _config: &ConnectionConfig) -> Result<MockConnection> {
        let scripted_failure = self
            .shared
            .failing_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scripted_failure {
            return Err(DbError::ConnectionError(
                "backend unavailable (scripted failure)".into(),
            ));
        }

        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        Ok(MockConnection {
            shared: Arc::clone(&self.shared),
            open: true,
        })
    }
}

/// Connection handle produced by [`MockBackend`].
#[derive(Debug)]
pub struct MockConnection {
    shared: Arc<Shared>,
    open: bool,
}

impl MockConnection {
    fn guard_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(DbError::ConnectionError("connection is closed".into()))
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn execute(&mut self, statement: &str, _params: &[Value]) -> Result<QueryResult> {
        self.guard_open()?;
        self.shared.executes.fetch_add(1, Ordering::SeqCst);
        self.shared.statements.lock()?.push(statement.to_string());

        match self.shared.script.lock()?.pop_front() {
            Some(Scripted::Rows(result)) => Ok(result),
            Some(Scripted::Fail(message)) => Err(DbError::OperationError(message)),
            None => Ok(QueryResult::empty()),
        }
    }

    async fn commit(&mut self) -> Result<()> {
        self.guard_open()?;
        self.shared.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.guard_open()?;
        self.shared.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.guard_open()?;
        self.open = false;
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
