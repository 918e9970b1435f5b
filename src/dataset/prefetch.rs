use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, SyncSender, sync_channel},
    },
    thread::JoinHandle,
};

use crate::error::DatasetError;

/// Background reader feeding decoded samples through a bounded queue.
///
/// At most `capacity` items are buffered ahead of the consumer. The reader
/// thread must be stopped with [`shutdown`](Self::shutdown) (or by dropping
/// the prefetcher) before final results are reported.
pub struct Prefetcher<T: Send + 'static> {
    receiver: Option<Receiver<Result<T, DatasetError>>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Prefetcher<T> {
    pub fn spawn<I>(source: I, capacity: usize) -> Self
    where
        I: Iterator<Item = Result<T, DatasetError>> + Send + 'static,
    {
        let (sender, receiver) = sync_channel(capacity.max(1));
        let stop = Arc::new(AtomicBool::new(false));

        let handle = {
            let stop = stop.clone();
            std::thread::spawn(move || Self::read(source, sender, &stop))
        };

        Self {
            receiver: Some(receiver),
            stop,
            handle: Some(handle),
        }
    }

    fn read<I>(source: I, sender: SyncSender<Result<T, DatasetError>>, stop: &AtomicBool)
    where
        I: Iterator<Item = Result<T, DatasetError>>,
    {
        for item in source {
            if stop.load(Ordering::Acquire) {
                break;
            }
            let failed = item.is_err();
            // The receiver is gone once the consumer shuts down.
            if sender.send(item).is_err() || failed {
                break;
            }
        }
        tracing::debug!("prefetch reader finished");
    }

    /// Stop the reader and wait for it to exit.
    ///
    /// Items still buffered in the queue are discarded.
    pub fn shutdown(mut self) -> Result<(), DatasetError> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> Result<(), DatasetError> {
        self.stop.store(true, Ordering::Release);
        // Dropping the receiver unblocks a reader waiting on a full queue.
        drop(self.receiver.take());

        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| DatasetError::ReaderPanicked),
            None => Ok(()),
        }
    }
}

impl<T: Send + 'static> Iterator for Prefetcher<T> {
    type Item = Result<T, DatasetError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.receiver.as_ref()?.recv() {
            Ok(item) => Some(item),
            // Reader exited: either the source is exhausted or it panicked.
            Err(_) => match self.stop_and_join() {
                Ok(()) => None,
                Err(err) => Some(Err(err)),
            },
        }
    }
}

impl<T: Send + 'static> Drop for Prefetcher<T> {
    fn drop(&mut self) {
        if let Err(err) = self.stop_and_join() {
            tracing::error!(error = %err, "prefetch reader did not shut down cleanly");
        }
    }
}
