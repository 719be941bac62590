use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::ClientError;

/// Sends one item to the consumer. Returns `false` once the consumer is gone
/// or the worker was cancelled.
pub(crate) async fn deliver<T>(
    tx: &mpsc::Sender<T>,
    cancel: &CancellationToken,
    item: T,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(item) => sent.is_ok(),
    }
}

const DRAIN_POLL: Duration = Duration::from_millis(5);

/// Waits until the consumer has taken every buffered item. Returns `false`
/// once the consumer is gone or the worker was cancelled.
pub(crate) async fn drained<T>(tx: &mpsc::Sender<T>, cancel: &CancellationToken) -> bool {
    while tx.capacity() < tx.max_capacity() {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            _ = tx.closed() => return false,
            _ = tokio::time::sleep(DRAIN_POLL) => {}
        }
    }
    !cancel.is_cancelled()
}

/// Races `operation` against `cancel`; the operation is dropped on cancel.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, operation: F) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ClientError::Cancelled),
        result = operation => result,
    }
}
