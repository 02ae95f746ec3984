use super::{
    StreamResult,
    error::StreamError,
    flow::{Publisher, Subscriber, Subscription},
};
use futures::stream::{FusedStream, Stream};
use parking_lot::Mutex;
use std::{
    collections::VecDeque,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, Waker},
};

struct StreamInner<T> {
    queue: VecDeque<T>,
    subscription: Option<Arc<dyn Subscription>>,
    error: Option<StreamError>,
    done: bool,
    // Requested from upstream and not delivered yet
    outstanding: i64,
    waker: Option<Waker>,
}

struct StreamShared<T> {
    inner: Mutex<StreamInner<T>>,
    prefetch: i64,
}

impl<T> StreamShared<T> {
    fn wake(inner: &mut StreamInner<T>) {
        if let Some(waker) = inner.waker.take() {
            waker.wake();
        }
    }

    // Demand needed to bring outstanding + queued back up to the window
    fn top_up(&self, inner: &mut StreamInner<T>) -> Option<(Arc<dyn Subscription>, i64)> {
        if inner.done {
            return None;
        }
        let in_flight = inner.outstanding + inner.queue.len() as i64;
        let missing = self.prefetch - in_flight;
        if missing <= 0 {
            return None;
        }
        let subscription = inner.subscription.clone()?;
        inner.outstanding += missing;
        Some((subscription, missing))
    }
}

impl<T: Send + 'static> Subscriber<T> for StreamShared<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        let (accepted, request) = {
            let mut inner = self.inner.lock();
            if inner.done || inner.subscription.is_some() {
                (false, None)
            } else {
                inner.subscription = Some(Arc::clone(&subscription));
                (true, self.top_up(&mut inner))
            }
        };

        if !accepted {
            log::warn!("publisher stream already subscribed or dropped, cancelling new subscription");
            subscription.cancel();
        } else if let Some((subscription, n)) = request {
            subscription.request(n);
        }
    }

    fn on_next(&self, item: T) {
        let mut inner = self.inner.lock();
        if inner.done {
            return;
        }
        inner.outstanding = (inner.outstanding - 1).max(0);
        inner.queue.push_back(item);
        Self::wake(&mut inner);
    }

    fn on_error(&self, error: StreamError) {
        let mut inner = self.inner.lock();
        if inner.done {
            return;
        }
        inner.done = true;
        inner.subscription = None;
        inner.error = Some(error);
        Self::wake(&mut inner);
    }

    fn on_complete(&self) {
        let mut inner = self.inner.lock();
        inner.done = true;
        inner.subscription = None;
        Self::wake(&mut inner);
    }
}

/// [`Stream`] of the items a publisher emits, pulled through a fixed demand
/// window.
///
/// ```rust
/// use flowbridge::{IterPublisher, PublisherStream, StreamError};
/// use futures::{StreamExt, executor::block_on};
///
/// let publisher = IterPublisher::new(|| (1..=3).map(Ok::<_, StreamError>));
/// let items: Vec<i32> = block_on(
///     PublisherStream::<i32>::new(&publisher).map(Result::unwrap).collect(),
/// );
/// assert_eq!(items, vec![1, 2, 3]);
/// ```
pub struct PublisherStream<T> {
    shared: Arc<StreamShared<T>>,
    finished: bool,
}

impl<T: Send + 'static> PublisherStream<T> {
    /// Stream that keeps one item in flight.
    pub fn new<P>(publisher: &P) -> Self
    where
        P: Publisher<T> + ?Sized,
    {
        Self::with_prefetch(publisher, 1)
    }

    /// Stream that keeps up to `prefetch` items requested or buffered.
    pub fn with_prefetch<P>(publisher: &P, prefetch: u32) -> Self
    where
        P: Publisher<T> + ?Sized,
    {
        let shared = Arc::new(StreamShared {
            inner: Mutex::new(StreamInner {
                queue: VecDeque::new(),
                subscription: None,
                error: None,
                done: false,
                outstanding: 0,
                waker: None,
            }),
            prefetch: i64::from(prefetch.max(1)),
        });
        publisher.subscribe(shared.clone());
        Self {
            shared,
            finished: false,
        }
    }
}

impl<T: Send + 'static> Stream for PublisherStream<T> {
    type Item = StreamResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        let (poll, request) = {
            let mut inner = self.shared.inner.lock();
            if let Some(item) = inner.queue.pop_front() {
                let request = self.shared.top_up(&mut inner);
                (Poll::Ready(Some(Ok(item))), request)
            } else if let Some(error) = inner.error.take() {
                (Poll::Ready(Some(Err(error))), None)
            } else if inner.done {
                (Poll::Ready(None), None)
            } else {
                let waker = cx.waker();
                if !inner.waker.as_ref().is_some_and(|w| w.will_wake(waker)) {
                    inner.waker = Some(waker.clone());
                }
                (Poll::Pending, None)
            }
        };

        if let Some((subscription, n)) = request {
            subscription.request(n);
        }
        if matches!(poll, Poll::Ready(None)) {
            self.finished = true;
        }
        poll
    }
}

impl<T: Send + 'static> FusedStream for PublisherStream<T> {
    fn is_terminated(&self) -> bool {
        self.finished
    }
}

impl<T> Drop for PublisherStream<T> {
    fn drop(&mut self) {
        let subscription = {
            let mut inner = self.shared.inner.lock();
            inner.done = true;
            inner.queue.clear();
            inner.subscription.take()
        };
        if let Some(subscription) = subscription {
            subscription.cancel();
        }
    }
}
