//! Lazy pagination and row streaming.
//!
//! A [`Paginator`] fetches one `LIMIT`/`OFFSET` page at a time, opening a
//! fresh connection per page through the scope it borrows, and stops at the
//! first empty page. Pages and rows are also exposed as async streams.

use crate::access::ConnectionScope;
use crate::backend::{Backend, Connection};
use crate::core::{DbError, Result, Row, Value};
use futures::stream::{self, Stream, TryStreamExt};

/// Page-at-a-time cursor over a query.
///
/// # Examples
///
/// ```ignore
/// let mut pages = Paginator::new(&scope, "SELECT * FROM users", 100);
/// while let Some(page) = pages.next_page().await? {
///     for user in page {
///         println!("{:?}", user);
///     }
/// }
/// ```
pub struct Paginator<'a, B: Backend> {
    scope: &'a ConnectionScope<B>,
    statement: String,
    params: Vec<Value>,
    page_size: usize,
    offset: usize,
    done: bool,
}

impl<'a, B: Backend> Paginator<'a, B> {
    pub fn new(scope: &'a ConnectionScope<B>, statement: impl Into<String>, page_size: usize) -> Self {
        Self {
            scope,
            statement: statement.into(),
            params: Vec::new(),
            page_size,
            offset: 0,
            done: false,
        }
    }

    /// Bind parameters forwarded to every page's execution.
    pub fn params(mut self, params: &[Value]) -> Self {
        self.params = params.to_vec();
        self
    }

    /// Fetch the next page, or `None` once a page comes back empty.
    ///
    /// Each page runs through its own connection scope: open, execute the
    /// statement with `LIMIT`/`OFFSET` appended, close.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Row>>> {
        if self.done {
            return Ok(None);
        }
        if self.page_size == 0 {
            return Err(DbError::ConfigError("page size must be > 0".into()));
        }

        let statement = format!(
            "{} LIMIT {} OFFSET {}",
            self.statement, self.page_size, self.offset
        );
        let params = self.params.clone();
        let result = self
            .scope
            .run(move |conn| {
                Box::pin(async move { conn.execute(&statement, &params).await })
            })
            .await?;

        if result.is_empty() {
            self.done = true;
            return Ok(None);
        }

        self.offset += self.page_size;
        Ok(Some(result.rows))
    }

    /// Turn the paginator into a stream of pages.
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<Row>>> + 'a {
        stream::try_unfold(self, |mut pager| async move {
            let page = pager.next_page().await?;
            Ok::<_, DbError>(page.map(|rows| (rows, pager)))
        })
    }

    /// Turn the paginator into a stream of individual rows.
    pub fn into_row_stream(self) -> impl Stream<Item = Result<Row>> + 'a {
        self.into_stream()
            .map_ok(|page| stream::iter(page.into_iter().map(Ok)))
            .try_flatten()
    }
}

/// Stream every row of a query, fetched lazily in pages of `page_size`.
pub fn stream_rows<'a, B: Backend>(
    scope: &'a ConnectionScope<B>,
    statement: impl Into<String>,
    page_size: usize,
) -> impl Stream<Item = Result<Row>> + 'a {
    Paginator::new(scope, statement, page_size).into_row_stream()
}
