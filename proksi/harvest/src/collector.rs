use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Accumulates items until either `batch_size` is reached or `wait_time`
/// elapses since the last flush, then emits the whole batch at once.
///
/// Grounded on `examples/original_source/pkg/proxy/collector.go`'s
/// `batchedCollector`: discovered candidates trickle in one at a time as
/// pages are parsed, but downstream admission (dedup + probing + scoring)
/// is cheaper to drive in batches than one at a time.
pub struct BatchedCollector<T> {
    tx: Option<mpsc::UnboundedSender<T>>,
    handle: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> BatchedCollector<T> {
    pub fn new(wait_time: Duration, batch_size: usize) -> (Self, mpsc::Receiver<Vec<T>>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<T>();
        let (batch_tx, batch_rx) = mpsc::channel(8);

        let handle = tokio::spawn(async move {
            let mut buf: Vec<T> = Vec::with_capacity(batch_size);
            let mut ticker = tokio::time::interval(wait_time);
            ticker.tick().await; // first tick fires immediately, skip it

            loop {
                tokio::select! {
                    item = rx.recv() => {
                        match item {
                            Some(item) => {
                                buf.push(item);
                                if buf.len() >= batch_size {
                                    flush(&mut buf, &batch_tx).await;
                                }
                            }
                            None => {
                                flush(&mut buf, &batch_tx).await;
                                return;
                            }
                        }
                    }
                    _ = ticker.tick() => {
                        flush(&mut buf, &batch_tx).await;
                    }
                }
            }
        });

        (
            Self {
                tx: Some(tx),
                handle: Some(handle),
            },
            batch_rx,
        )
    }

    /// Enqueues an item for the next flush. Never blocks.
    pub fn collect(&self, item: T) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(item);
        }
    }

    /// Closes the input side and waits for the final flush to land.
    /// Idempotent: subsequent calls are no-ops.
    pub async fn close(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

async fn flush<T>(buf: &mut Vec<T>, out: &mpsc::Sender<Vec<T>>) {
    if buf.is_empty() {
        return;
    }
    let batch = std::mem::take(buf);
    let _ = out.send(batch).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flushes_on_batch_size() {
        let (collector, mut batches) = BatchedCollector::new(Duration::from_secs(60), 2);
        collector.collect(1);
        collector.collect(2);
        let batch = batches.recv().await.unwrap();
        assert_eq!(batch, vec![1, 2]);
        drop(collector);
    }

    #[tokio::test]
    async fn flushes_on_timer() {
        let (collector, mut batches) = BatchedCollector::new(Duration::from_millis(20), 100);
        collector.collect(42);
        let batch = batches.recv().await.unwrap();
        assert_eq!(batch, vec![42]);
        drop(collector);
    }
}
