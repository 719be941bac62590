use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use triage_logging::{triage_debug, triage_warn};

use crate::handoff::{cancellable, deliver, drained};
use crate::types::Page;
use crate::{ApiRequest, ClientError, RequestExecutor, Sample};

/// Largest `limit` the list and search endpoints accept.
pub const PAGE_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subset {
    Owned,
    Public,
}

impl Subset {
    pub fn as_str(self) -> &'static str {
        match self {
            Subset::Owned => "owned",
            Subset::Public => "public",
        }
    }
}

/// What to page through: a named subset of samples or a search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageQuery {
    Subset(Subset),
    Search(String),
}

impl PageQuery {
    pub(crate) fn request(&self, limit: usize, cursor: Option<&str>) -> ApiRequest {
        let request = match self {
            PageQuery::Subset(subset) => {
                ApiRequest::get("/v0/samples").with_query("subset", subset.as_str())
            }
            PageQuery::Search(query) => ApiRequest::get("/v0/search").with_query("query", query),
        };
        let request = request.with_query("limit", limit.to_string());
        match cursor {
            Some(cursor) => request.with_query("offset", cursor),
            None => request,
        }
    }
}

/// Lazily pulled, ordered sequence of samples spanning as many pages as
/// needed to yield `max_records`.
///
/// A background task fetches pages and hands records over a channel bounded
/// to one page. The next page is only requested once the consumer has taken
/// every record of the previous one. An `Err` item is always the last one. Dropping the sequence
/// cancels the task and releases its connection.
pub struct PagedSequence {
    rx: mpsc::Receiver<Result<Sample, ClientError>>,
    cancel: CancellationToken,
}

impl PagedSequence {
    /// Starts fetching. Must be called from within a tokio runtime.
    ///
    /// `cancel` is a parent token: cancelling it stops this sequence too.
    pub fn fetch(
        executor: Arc<dyn RequestExecutor>,
        query: PageQuery,
        max_records: usize,
        cancel: &CancellationToken,
    ) -> Self {
        let cancel = cancel.child_token();
        let (tx, rx) = mpsc::channel(PAGE_LIMIT);
        if max_records > 0 {
            tokio::spawn(run_pages(executor, query, max_records, tx, cancel.clone()));
        }
        Self { rx, cancel }
    }

    pub async fn next(&mut self) -> Option<Result<Sample, ClientError>> {
        self.rx.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Drains the sequence, stopping at the first error.
    pub async fn collect_all(mut self) -> Result<Vec<Sample>, ClientError> {
        let mut samples = Vec::new();
        while let Some(item) = self.next().await {
            samples.push(item?);
        }
        Ok(samples)
    }
}

impl Stream for PagedSequence {
    type Item = Result<Sample, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for PagedSequence {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_pages(
    executor: Arc<dyn RequestExecutor>,
    query: PageQuery,
    max_records: usize,
    tx: mpsc::Sender<Result<Sample, ClientError>>,
    cancel: CancellationToken,
) {
    let mut cursor: Option<String> = None;
    let mut yielded = 0usize;
    loop {
        let limit = (max_records - yielded).min(PAGE_LIMIT);
        triage_debug!("page request {:?} limit={} cursor={:?}", query, limit, cursor);
        let request = query.request(limit, cursor.as_deref());
        let page = match cancellable(&cancel, executor.execute(request)).await {
            Err(ClientError::Cancelled) => return,
            Ok(value) => Page::<Sample>::from_value(value),
            Err(err) => Err(err),
        };
        let page = match page {
            Ok(page) => page,
            Err(err) => {
                triage_warn!("paging {:?} stopped: {}", query, err);
                deliver(&tx, &cancel, Err(err)).await;
                return;
            }
        };

        if page.records.is_empty() {
            if let Some(next) = page.next {
                let err = ClientError::ProtocolViolation(format!(
                    "empty page returned together with cursor {next:?}"
                ));
                triage_warn!("paging {:?} stopped: {}", query, err);
                deliver(&tx, &cancel, Err(err)).await;
            }
            return;
        }

        for record in page.records {
            if !deliver(&tx, &cancel, Ok(record)).await {
                return;
            }
            yielded += 1;
            if yielded >= max_records {
                return;
            }
        }

        match page.next {
            Some(next) => cursor = Some(next),
            None => return,
        }
        if !drained(&tx, &cancel).await {
            return;
        }
    }
}
