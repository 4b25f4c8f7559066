use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Waits for the next queue item, or `None` once the queue closes or
/// `cancel` fires. Every consumer loop blocks here.
pub(crate) async fn next_item<T>(
    queue: &mut mpsc::Receiver<T>,
    cancel: &CancellationToken,
) -> Option<T> {
    tokio::select! {
        _ = cancel.cancelled() => None,
        item = queue.recv() => item,
    }
}
