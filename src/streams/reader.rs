//! Blocking [`std::io::Read`] over a push-based source of [`DataBuffer`] chunks.
//!
//! The reader asks the publisher for exactly one chunk whenever its queue runs
//! dry, then parks on a condition variable until the chunk, an error or
//! completion arrives. Closing the reader (from any thread, see
//! [`CloseHandle`]) cancels the subscription, releases queued chunks and wakes
//! a parked read, which then reports end-of-stream.
//!
//! Reads after close always report end-of-stream, never an error.

use super::{
    data_buffer::DataBuffer,
    error::StreamError,
    flow::{Publisher, Subscriber, Subscription},
};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::{
    collections::VecDeque,
    io::{self, BufRead, Read},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    AwaitingSubscription,
    Ready,
    Errored,
    Completed,
    Closed,
}

struct ReaderInner<B> {
    state: ReaderState,
    subscription: Option<Arc<dyn Subscription>>,
    queue: VecDeque<B>,
    error: Option<StreamError>,
    // A chunk has been requested and not delivered yet
    requested: bool,
}

struct ReaderShared<B> {
    inner: Mutex<ReaderInner<B>>,
    ready: Condvar,
    closed: AtomicBool,
}

impl<B: DataBuffer> ReaderShared<B> {
    fn new() -> Self {
        Self {
            inner: Mutex::new(ReaderInner {
                state: ReaderState::AwaitingSubscription,
                subscription: None,
                queue: VecDeque::new(),
                error: None,
                requested: false,
            }),
            ready: Condvar::new(),
            closed: AtomicBool::new(false),
        }
    }

    // Blocks until a chunk, an error or the end of the stream
    fn take_next(&self) -> io::Result<Option<B>> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(chunk) = inner.queue.pop_front() {
                return Ok(Some(chunk));
            }

            let state = inner.state;
            match state {
                ReaderState::Closed | ReaderState::Completed => return Ok(None),
                ReaderState::Errored => {
                    let error = inner
                        .error
                        .clone()
                        .unwrap_or_else(|| "Upstream publisher failed".into());
                    return Err(error.into());
                }
                ReaderState::AwaitingSubscription => self.ready.wait(&mut inner),
                ReaderState::Ready if inner.requested => self.ready.wait(&mut inner),
                ReaderState::Ready => {
                    let Some(subscription) = inner.subscription.clone() else {
                        return Ok(None);
                    };
                    inner.requested = true;
                    // Synchronous publishers call back into on_next from request
                    MutexGuard::unlocked(&mut inner, || subscription.request(1));
                }
            }
        }
    }

    fn close(&self) {
        let (subscription, pending) = {
            let mut inner = self.inner.lock();
            if inner.state == ReaderState::Closed {
                return;
            }
            inner.state = ReaderState::Closed;
            inner.requested = false;
            self.closed.store(true, Ordering::SeqCst);
            let pending: Vec<B> = inner.queue.drain(..).collect();
            self.ready.notify_all();
            (inner.subscription.take(), pending)
        };

        if let Some(subscription) = subscription {
            subscription.cancel();
        }
        log::debug!(
            "data buffer reader closed, releasing {} pending chunks",
            pending.len()
        );
        for chunk in pending {
            chunk.release();
        }
    }

    fn finish(&self, outcome: ReaderState, error: Option<StreamError>) {
        let mut inner = self.inner.lock();
        inner.subscription = None;
        inner.requested = false;
        if matches!(
            inner.state,
            ReaderState::AwaitingSubscription | ReaderState::Ready
        ) {
            inner.state = outcome;
            inner.error = error;
        }
        self.ready.notify_all();
    }
}

impl<B: DataBuffer> Subscriber<B> for ReaderShared<B> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        let mut inner = self.inner.lock();
        if inner.state == ReaderState::AwaitingSubscription {
            inner.subscription = Some(subscription);
            inner.state = ReaderState::Ready;
            self.ready.notify_all();
            return;
        }
        drop(inner);
        log::warn!("data buffer reader already subscribed or closed, cancelling new subscription");
        subscription.cancel();
    }

    fn on_next(&self, chunk: B) {
        let rejected = {
            let mut inner = self.inner.lock();
            inner.requested = false;
            let rejected = if inner.state == ReaderState::Ready && chunk.remaining() > 0 {
                inner.queue.push_back(chunk);
                None
            } else {
                Some(chunk)
            };
            self.ready.notify_all();
            rejected
        };

        if let Some(chunk) = rejected {
            log::trace!("releasing chunk that will not be read");
            chunk.release();
        }
    }

    fn on_error(&self, error: StreamError) {
        log::debug!("data buffer reader source failed: {error}");
        self.finish(ReaderState::Errored, Some(error));
    }

    fn on_complete(&self) {
        self.finish(ReaderState::Completed, None);
    }
}

/// Blocking reader over a publisher of byte chunks.
///
/// ```rust
/// use flowbridge::{DataBufferReader, HeapBuffer, IterPublisher};
/// use std::io::Read;
///
/// let publisher = IterPublisher::new(|| {
///     vec![Ok(HeapBuffer::from(&b"hello "[..])), Ok(HeapBuffer::from(&b"world"[..]))]
/// });
/// let mut reader = DataBufferReader::<HeapBuffer>::subscribe(&publisher);
///
/// let mut text = String::new();
/// reader.read_to_string(&mut text).unwrap();
/// assert_eq!(text, "hello world");
/// ```
pub struct DataBufferReader<B: DataBuffer> {
    shared: Arc<ReaderShared<B>>,
    current: Option<B>,
}

impl<B: DataBuffer> DataBufferReader<B> {
    /// Reader that has not been subscribed yet; wire it up via [`Self::subscriber`].
    pub fn new() -> Self {
        Self {
            shared: Arc::new(ReaderShared::new()),
            current: None,
        }
    }

    pub fn subscribe<P>(publisher: &P) -> Self
    where
        P: Publisher<B> + ?Sized,
    {
        let reader = Self::new();
        publisher.subscribe(reader.subscriber());
        reader
    }

    /// The subscriber side of this reader.
    pub fn subscriber(&self) -> Arc<dyn Subscriber<B>> {
        self.shared.clone()
    }

    pub fn state(&self) -> ReaderState {
        self.shared.inner.lock().state
    }

    /// Handle that closes this reader from another thread.
    pub fn close_handle(&self) -> CloseHandle<B> {
        CloseHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Bytes readable without blocking from the current chunk.
    pub fn available(&self) -> usize {
        if self.shared.closed.load(Ordering::SeqCst) {
            return 0;
        }
        self.current.as_ref().map_or(0, DataBuffer::remaining)
    }

    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Discard up to `n` bytes, returning how many were skipped.
    pub fn skip(&mut self, n: u64) -> io::Result<u64> {
        let mut skipped = 0u64;
        while skipped < n {
            if !self.fill_current()? {
                break;
            }
            let Some(chunk) = self.current.as_mut() else {
                break;
            };
            let wanted = usize::try_from(n - skipped).unwrap_or(usize::MAX);
            let step = chunk.remaining().min(wanted);
            chunk.advance(step);
            skipped += step as u64;
        }
        Ok(skipped)
    }

    pub fn close(&mut self) {
        if let Some(chunk) = self.current.take() {
            chunk.release();
        }
        self.shared.close();
    }

    // Makes sure `current` has unread bytes; false at end of stream
    fn fill_current(&mut self) -> io::Result<bool> {
        loop {
            if self.shared.closed.load(Ordering::SeqCst) {
                if let Some(chunk) = self.current.take() {
                    chunk.release();
                }
                return Ok(false);
            }
            if self.current.as_ref().is_some_and(|chunk| chunk.remaining() > 0) {
                return Ok(true);
            }
            if let Some(spent) = self.current.take() {
                spent.release();
            }
            match self.shared.take_next()? {
                Some(next) => self.current = Some(next),
                None => return Ok(false),
            }
        }
    }
}

impl<B: DataBuffer> Default for DataBufferReader<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: DataBuffer> Read for DataBufferReader<B> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || !self.fill_current()? {
            return Ok(0);
        }
        Ok(self
            .current
            .as_mut()
            .map_or(0, |chunk| chunk.read_into(buf)))
    }
}

impl<B: DataBuffer> BufRead for DataBufferReader<B> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if !self.fill_current()? {
            return Ok(&[]);
        }
        Ok(self.current.as_ref().map_or(&[][..], DataBuffer::chunk))
    }

    fn consume(&mut self, amt: usize) {
        if let Some(chunk) = self.current.as_mut() {
            let step = amt.min(chunk.remaining());
            chunk.advance(step);
        }
    }
}

impl<B: DataBuffer> Drop for DataBufferReader<B> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Closes a [`DataBufferReader`] from any thread, waking a blocked read.
pub struct CloseHandle<B> {
    shared: Arc<ReaderShared<B>>,
}

impl<B: DataBuffer> CloseHandle<B> {
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

impl<B> Clone for CloseHandle<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}
