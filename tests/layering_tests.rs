/// Layer composition tests
///
/// The layers compose in any order, and the order changes semantics. These
/// tests pin down the observable differences using the mock backend's call
/// counters.
/// Run with: cargo test --test layering_tests
use dbstack::backend::mock::MockBackend;
use dbstack::{
    Client, Connection, ConnectionConfig, ConnectionScope, DbError, QueryCache, QueryKey,
    RetryPolicy, Value, within_transaction,
};
use std::time::Duration;

fn scope(backend: &MockBackend) -> ConnectionScope<MockBackend> {
    ConnectionScope::new(backend.clone(), ConnectionConfig::default()).unwrap()
}

fn fast_retry(retries: u32) -> RetryPolicy {
    RetryPolicy::new(retries, Duration::from_millis(1))
}

#[tokio::test]
async fn test_retry_outside_scope_opens_a_fresh_connection_per_attempt() {
    let backend = MockBackend::new();
    backend.enqueue_failure("deadlock detected");
    backend.enqueue_failure("deadlock detected");
    backend.enqueue_rows(&["id"], vec![vec![Value::Integer(1)]]);
    let scope = scope(&backend);

    let result = fast_retry(3)
        .run(|| {
            scope.run(move |conn| {
                Box::pin(async move { conn.execute("SELECT * FROM users", &[]).await })
            })
        })
        .await
        .unwrap();

    assert_eq!(result.row_count(), 1);
    let counts = backend.counts();
    assert_eq!(counts.opens, 3);
    assert_eq!(counts.closes, 3);
    assert_eq!(counts.executes, 3);
}

#[tokio::test]
async fn test_retry_inside_scope_reuses_one_connection() {
    let backend = MockBackend::new();
    backend.enqueue_failure("deadlock detected");
    backend.enqueue_failure("deadlock detected");
    backend.enqueue_rows(&["id"], vec![vec![Value::Integer(1)]]);
    let scope = scope(&backend);

    let policy = fast_retry(3);
    let result = scope
        .run(move |conn| {
            Box::pin(async move {
                policy
                    .run_on(conn, |conn| {
                        Box::pin(async move { conn.execute("SELECT * FROM users", &[]).await })
                    })
                    .await
            })
        })
        .await
        .unwrap();

    assert_eq!(result.row_count(), 1);
    let counts = backend.counts();
    assert_eq!(counts.opens, 1);
    assert_eq!(counts.closes, 1);
    assert_eq!(counts.executes, 3);
}

#[tokio::test]
async fn test_retry_outside_transaction_rolls_back_each_failed_attempt() {
    let backend = MockBackend::new();
    backend.enqueue_failure("serialization failure");
    backend.enqueue_rows(&["id"], vec![vec![Value::Integer(1)]]);
    let client = Client::new(backend.clone(), ConnectionConfig::default()).unwrap();

    let result = fast_retry(3)
        .run(|| {
            client.transact(|conn| {
                Box::pin(async move { conn.execute("UPDATE accounts SET x = 1", &[]).await })
            })
        })
        .await
        .unwrap();

    assert_eq!(result.row_count(), 1);
    let counts = backend.counts();
    // First attempt rolled back, second committed; one connection each.
    assert_eq!(counts.rollbacks, 1);
    assert_eq!(counts.commits, 1);
    assert_eq!(counts.opens, 2);
    assert_eq!(counts.closes, 2);
}

#[tokio::test]
async fn test_cache_outside_scope_opens_no_connection_on_a_hit() {
    let backend = MockBackend::new();
    backend.enqueue_rows(&["id"], vec![vec![Value::Integer(1)]]);
    let scope = scope(&backend);
    let cache = QueryCache::new();

    for _ in 0..3 {
        let key = QueryKey::new("SELECT * FROM users", &[]);
        cache
            .get_or_execute(key, || async {
                scope
                    .run(move |conn| {
                        Box::pin(async move { conn.execute("SELECT * FROM users", &[]).await })
                    })
                    .await
            })
            .await
            .unwrap();
    }

    let counts = backend.counts();
    assert_eq!(counts.opens, 1);
    assert_eq!(counts.executes, 1);
    assert_eq!(cache.stats().hits, 2);
}

#[tokio::test]
async fn test_transaction_inside_scope_commits_on_the_same_connection() {
    let backend = MockBackend::new();
    let scope = scope(&backend);

    scope
        .run(|conn| {
            Box::pin(within_transaction(conn, |conn| {
                Box::pin(async move {
                    conn.execute("INSERT INTO users VALUES (1, 'alice')", &[])
                        .await?;
                    conn.execute("INSERT INTO users VALUES (2, 'bob')", &[])
                        .await?;
                    Ok(())
                })
            }))
        })
        .await
        .unwrap();

    let counts = backend.counts();
    assert_eq!(counts.opens, 1);
    assert_eq!(counts.executes, 2);
    assert_eq!(counts.commits, 1);
    assert_eq!(counts.closes, 1);
}

#[tokio::test]
async fn test_connection_error_escapes_all_layers_unchanged() {
    let backend = MockBackend::new();
    backend.fail_next_opens(2);
    let scope = scope(&backend);

    let err = fast_retry(1)
        .run(|| {
            scope.run(move |conn| {
                Box::pin(async move { conn.execute("SELECT 1", &[]).await })
            })
        })
        .await
        .unwrap_err();

    // Both attempts failed to open; the surfaced error is still the plain
    // connection error, not a retry wrapper.
    assert!(matches!(err, DbError::ConnectionError(_)));
    assert_eq!(backend.counts().opens, 0);
    assert_eq!(backend.counts().executes, 0);
}

#[tokio::test]
async fn test_exhausted_retry_surfaces_the_final_attempt_error() {
    let backend = MockBackend::new();
    backend.enqueue_failure("error one");
    backend.enqueue_failure("error two");
    backend.enqueue_failure("error three");
    let scope = scope(&backend);

    let err = fast_retry(2)
        .run(|| {
            scope.run(move |conn| {
                Box::pin(async move { conn.execute("SELECT 1", &[]).await })
            })
        })
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Operation error: error three");
}
