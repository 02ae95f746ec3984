use super::{
    StreamResult,
    error::StreamError,
    executor::{Executor, InlineExecutor},
    flow::{Publisher, Subscriber, Subscription},
};
use parking_lot::Mutex;
use std::{
    iter::Peekable,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicI64, Ordering},
    },
};

// ----------- Sequence Suppliers -----------

/// Produces a fresh, lazily evaluated sequence for every subscriber.
///
/// Implemented for any `Fn() -> impl IntoIterator<Item = StreamResult<T>>`.
pub trait SequenceSupplier<T>: Send + Sync + 'static {
    type Iter: Iterator<Item = StreamResult<T>> + Send + 'static;

    fn sequence(&self) -> Self::Iter;
}

impl<T, F, I> SequenceSupplier<T> for F
where
    F: Fn() -> I + Send + Sync + 'static,
    I: IntoIterator<Item = StreamResult<T>>,
    I::IntoIter: Send + 'static,
{
    type Iter = I::IntoIter;

    fn sequence(&self) -> Self::Iter {
        self().into_iter()
    }
}

/// Replays a fixed list of items to each subscriber.
pub struct VecSupplier<T> {
    items: Arc<Vec<T>>,
}

impl<T> SequenceSupplier<T> for VecSupplier<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Iter = VecSequence<T>;

    fn sequence(&self) -> Self::Iter {
        VecSequence {
            items: Arc::clone(&self.items),
            position: 0,
        }
    }
}

pub struct VecSequence<T> {
    items: Arc<Vec<T>>,
    position: usize,
}

impl<T: Clone> Iterator for VecSequence<T> {
    type Item = StreamResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.items.get(self.position)?.clone();
        self.position += 1;
        Some(Ok(item))
    }
}

// ----------- Publisher -----------

/// Publisher that emits a supplied sequence under subscriber demand.
///
/// ```rust
/// use flowbridge::IterPublisher;
///
/// use flowbridge::StreamError;
///
/// let publisher = IterPublisher::new(|| (1..=3).map(Ok::<_, StreamError>));
/// # drop(publisher);
/// ```
pub struct IterPublisher<S> {
    supplier: S,
    executor: Arc<dyn Executor>,
    batch_size: usize,
}

impl<S> IterPublisher<S> {
    /// Publisher with an inline executor and no batch limit.
    pub fn new(supplier: S) -> Self {
        Self::builder(supplier).build()
    }

    pub fn builder(supplier: S) -> IterPublisherBuilder<S> {
        IterPublisherBuilder::new(supplier)
    }
}

impl<T> IterPublisher<VecSupplier<T>>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn from_vec(items: Vec<T>) -> Self {
        Self::new(VecSupplier {
            items: Arc::new(items),
        })
    }
}

impl<T, S> Publisher<T> for IterPublisher<S>
where
    T: Send + 'static,
    S: SequenceSupplier<T>,
{
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let subscription = IterSubscription::new(
            self.supplier.sequence(),
            Arc::clone(&subscriber),
            Arc::clone(&self.executor),
            self.batch_size,
        );
        log::trace!("subscriber attached to iterator publisher");
        subscriber.on_subscribe(Arc::new(subscription));
    }
}

// ----------- Builder Pattern Implementation -----------
pub struct IterPublisherBuilder<S> {
    supplier: S,
    executor: Arc<dyn Executor>,
    batch_size: usize,
}

impl<S> IterPublisherBuilder<S> {
    fn new(supplier: S) -> Self {
        Self {
            supplier,
            executor: Arc::new(InlineExecutor),
            batch_size: usize::MAX,
        }
    }

    /// Executor that runs the emission loop.
    pub fn executor<E: Executor>(mut self, executor: E) -> Self {
        self.executor = Arc::new(executor);
        self
    }

    /// Share one executor between several publishers.
    pub fn shared_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    /// Maximum items emitted by one executor task before the loop hands the
    /// rest of the demand back to the executor. Zero is treated as one.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn build(self) -> IterPublisher<S> {
        IterPublisher {
            supplier: self.supplier,
            executor: self.executor,
            batch_size: self.batch_size,
        }
    }
}

// ----------- Subscription -----------

/// Demand-tracked subscription over one sequence.
pub struct IterSubscription<T, I>
where
    I: Iterator<Item = StreamResult<T>>,
{
    state: Arc<EmitterState<T, I>>,
}

struct EmitterState<T, I>
where
    I: Iterator<Item = StreamResult<T>>,
{
    items: Mutex<Peekable<I>>,
    // Released on termination so the subscriber is not kept alive by us
    subscriber: Mutex<Option<Arc<dyn Subscriber<T>>>>,
    demand: AtomicI64,
    // Terminal error raised by `request`, delivered by the draining thread
    pending_error: Mutex<Option<StreamError>>,
    terminated: AtomicBool,
    executor: Arc<dyn Executor>,
    batch_size: usize,
}

impl<T, I> IterSubscription<T, I>
where
    T: Send + 'static,
    I: Iterator<Item = StreamResult<T>> + Send + 'static,
{
    pub fn new(
        items: I,
        subscriber: Arc<dyn Subscriber<T>>,
        executor: Arc<dyn Executor>,
        batch_size: usize,
    ) -> Self {
        Self {
            state: Arc::new(EmitterState {
                items: Mutex::new(items.peekable()),
                subscriber: Mutex::new(Some(subscriber)),
                demand: AtomicI64::new(0),
                pending_error: Mutex::new(None),
                terminated: AtomicBool::new(false),
                executor,
                batch_size: batch_size.max(1),
            }),
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.state.terminated.load(Ordering::SeqCst)
    }

    /// Outstanding, not yet fulfilled demand.
    pub fn demand(&self) -> i64 {
        self.state.demand.load(Ordering::SeqCst)
    }
}

impl<T, I> Subscription for IterSubscription<T, I>
where
    T: Send + 'static,
    I: Iterator<Item = StreamResult<T>> + Send + 'static,
{
    fn request(&self, n: i64) {
        if self.is_terminated() {
            return;
        }

        let mut n = n;
        if n <= 0 {
            log::debug!("rejecting non-positive request of {n}");
            let mut pending = self.state.pending_error.lock();
            if pending.is_none() {
                *pending = Some(StreamError::InvalidDemand(n));
            }
            // One unit of demand wakes the drain loop that reports the error
            n = 1;
        }

        let previous = match self.state.demand.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |current| Some(current.saturating_add(n)),
        ) {
            Ok(previous) | Err(previous) => previous,
        };

        // Only the zero -> positive transition starts a drain
        if previous == 0 {
            self.state.schedule();
        }
    }

    fn cancel(&self) {
        if self.state.terminate().is_some() {
            log::trace!("iterator subscription cancelled");
        }
    }
}

impl<T, I> EmitterState<T, I>
where
    T: Send + 'static,
    I: Iterator<Item = StreamResult<T>> + Send + 'static,
{
    fn schedule(self: &Arc<Self>) {
        let task = DrainTask {
            state: Some(Arc::clone(self)),
        };
        self.executor.execute(Box::new(move || task.run()));
    }

    // Reports an error raised by `request` from inside the drain loop
    fn take_pending_error(&self) -> bool {
        let Some(error) = self.pending_error.lock().take() else {
            return false;
        };
        self.fail(error);
        true
    }

    fn drain(self: &Arc<Self>) {
        let Some(subscriber) = self.subscriber.lock().clone() else {
            return;
        };

        let mut emitted = 0usize;
        loop {
            if self.terminated.load(Ordering::SeqCst) || self.take_pending_error() {
                return;
            }

            let next = self.items.lock().next();
            match next {
                None => {
                    self.complete();
                    return;
                }
                Some(Err(error)) => {
                    self.fail(error);
                    return;
                }
                Some(Ok(item)) => {
                    // Cancel may have landed while the item was produced
                    if self.terminated.load(Ordering::SeqCst) {
                        return;
                    }
                    subscriber.on_next(item);
                }
            }

            if self.take_pending_error() {
                return;
            }
            if self.items.lock().peek().is_none() {
                self.complete();
                return;
            }

            if self.demand.fetch_sub(1, Ordering::SeqCst) == 1 {
                return;
            }

            emitted += 1;
            if emitted >= self.batch_size {
                self.schedule();
                return;
            }
        }
    }

    // Flips the termination flag; only the first caller gets the subscriber
    fn terminate(&self) -> Option<Arc<dyn Subscriber<T>>> {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return None;
        }
        self.subscriber.lock().take()
    }

    fn complete(&self) {
        if let Some(subscriber) = self.terminate() {
            subscriber.on_complete();
        }
    }

    fn fail(&self, error: StreamError) {
        if let Some(subscriber) = self.terminate() {
            log::debug!("iterator subscription failed: {error}");
            subscriber.on_error(error);
        }
    }
}

// Fails the subscription if the executor drops the task without running it
struct DrainTask<T, I>
where
    T: Send + 'static,
    I: Iterator<Item = StreamResult<T>> + Send + 'static,
{
    state: Option<Arc<EmitterState<T, I>>>,
}

impl<T, I> DrainTask<T, I>
where
    T: Send + 'static,
    I: Iterator<Item = StreamResult<T>> + Send + 'static,
{
    fn run(mut self) {
        if let Some(state) = self.state.take() {
            state.drain();
        }
    }
}

impl<T, I> Drop for DrainTask<T, I>
where
    T: Send + 'static,
    I: Iterator<Item = StreamResult<T>> + Send + 'static,
{
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            log::warn!("executor dropped an emission task, failing the subscription");
            state.fail(StreamError::Rejected);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::executor::{Task, ThreadExecutor};
    use std::{
        sync::atomic::AtomicUsize,
        thread,
        time::{Duration, Instant},
    };

    #[derive(Debug, Clone, PartialEq)]
    enum Signal<T> {
        Next(T),
        Error(String),
        Complete,
    }

    struct Recorder<T> {
        signals: Mutex<Vec<Signal<T>>>,
        subscription: Mutex<Option<Arc<dyn Subscription>>>,
        on_next: Box<dyn Fn(&Recorder<T>, &T) + Send + Sync>,
    }

    impl<T: Clone + Send + 'static> Recorder<T> {
        fn new() -> Arc<Self> {
            Self::with_on_next(|_, _| {})
        }

        fn with_on_next(on_next: impl Fn(&Recorder<T>, &T) + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                signals: Mutex::new(Vec::new()),
                subscription: Mutex::new(None),
                on_next: Box::new(on_next),
            })
        }

        fn request(&self, n: i64) {
            let subscription = self.subscription.lock().clone();
            subscription.expect("subscribed").request(n);
        }

        fn cancel(&self) {
            let subscription = self.subscription.lock().clone();
            subscription.expect("subscribed").cancel();
        }

        fn signals(&self) -> Vec<Signal<T>> {
            self.signals.lock().clone()
        }
    }

    impl<T: Clone + Send + 'static> Subscriber<T> for Recorder<T> {
        fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
            *self.subscription.lock() = Some(subscription);
        }

        fn on_next(&self, item: T) {
            self.signals.lock().push(Signal::Next(item.clone()));
            (self.on_next)(self, &item);
        }

        fn on_error(&self, error: StreamError) {
            self.signals.lock().push(Signal::Error(error.to_string()));
        }

        fn on_complete(&self) {
            self.signals.lock().push(Signal::Complete);
        }
    }

    fn attach<T, P>(publisher: &P, recorder: &Arc<Recorder<T>>)
    where
        T: Clone + Send + 'static,
        P: Publisher<T>,
    {
        publisher.subscribe(recorder.clone());
    }

    #[test]
    fn emits_all_items_across_requests_then_completes() {
        let publisher = IterPublisher::from_vec(vec![1, 2, 3]);
        let recorder = Recorder::<i32>::new();
        attach(&publisher, &recorder);

        recorder.request(2);
        assert_eq!(recorder.signals(), vec![Signal::Next(1), Signal::Next(2)]);

        recorder.request(5);
        assert_eq!(
            recorder.signals(),
            vec![
                Signal::Next(1),
                Signal::Next(2),
                Signal::Next(3),
                Signal::Complete
            ]
        );
    }

    #[test]
    fn empty_sequence_completes_on_first_request() {
        let publisher = IterPublisher::from_vec(Vec::<i32>::new());
        let recorder = Recorder::<i32>::new();
        attach(&publisher, &recorder);

        assert!(recorder.signals().is_empty());
        recorder.request(1);
        assert_eq!(recorder.signals(), vec![Signal::Complete]);
    }

    #[test]
    fn never_emits_more_than_requested() {
        let publisher = IterPublisher::new(|| (0..100).map(Ok));
        let recorder = Recorder::<i32>::new();
        attach(&publisher, &recorder);

        recorder.request(3);
        recorder.request(4);
        assert_eq!(recorder.signals().len(), 7);
        assert!(!recorder.signals().contains(&Signal::Complete));
    }

    #[test]
    fn completes_without_extra_demand_once_exhausted() {
        let publisher = IterPublisher::from_vec(vec!["a", "b"]);
        let recorder = Recorder::<&str>::new();
        attach(&publisher, &recorder);

        recorder.request(2);
        assert_eq!(
            recorder.signals(),
            vec![Signal::Next("a"), Signal::Next("b"), Signal::Complete]
        );
    }

    #[test]
    fn cancel_stops_all_signals() {
        let publisher = IterPublisher::from_vec(vec![1, 2, 3]);
        let recorder = Recorder::<i32>::new();
        attach(&publisher, &recorder);

        recorder.request(1);
        recorder.cancel();
        recorder.request(10);
        recorder.request(-1);

        assert_eq!(recorder.signals(), vec![Signal::Next(1)]);
    }

    #[test]
    fn cancel_from_on_next_stops_the_drain() {
        let publisher = IterPublisher::new(|| (0..10).map(Ok));
        let recorder = Recorder::<i32>::with_on_next(|recorder, item| {
            if *item == 2 {
                recorder.cancel();
            }
        });
        attach(&publisher, &recorder);

        recorder.request(i64::MAX);
        assert_eq!(
            recorder.signals(),
            vec![Signal::Next(0), Signal::Next(1), Signal::Next(2)]
        );
    }

    #[test]
    fn non_positive_request_is_a_terminal_error() {
        for bad in [0, -5] {
            let publisher = IterPublisher::from_vec(vec![1, 2, 3]);
            let recorder = Recorder::<i32>::new();
            attach(&publisher, &recorder);

            recorder.request(bad);
            recorder.request(bad);
            recorder.request(3);

            let signals = recorder.signals();
            assert_eq!(signals.len(), 1);
            assert!(matches!(&signals[0], Signal::Error(msg) if msg.contains(&bad.to_string())));
        }
    }

    #[test]
    fn sequence_errors_become_error_signals() {
        let publisher = IterPublisher::new(|| {
            vec![Ok(1), Err(StreamError::from("boom")), Ok(3)]
        });
        let recorder = Recorder::<i32>::new();
        attach(&publisher, &recorder);

        recorder.request(10);
        assert_eq!(
            recorder.signals(),
            vec![Signal::Next(1), Signal::Error("boom".to_string())]
        );
    }

    #[test]
    fn demand_saturates_instead_of_overflowing() {
        let publisher = IterPublisher::new(|| (0..5).map(Ok));
        let recorder = Recorder::<i32>::new();
        attach(&publisher, &recorder);

        recorder.request(i64::MAX);
        recorder.request(i64::MAX);

        let signals = recorder.signals();
        assert_eq!(signals.len(), 6);
        assert_eq!(signals.last(), Some(&Signal::Complete));
    }

    #[test]
    fn saturated_demand_still_counts_down() {
        let queued: Arc<Mutex<Vec<Task>>> = Arc::new(Mutex::new(Vec::new()));
        let queue = Arc::clone(&queued);
        let executor: Arc<dyn Executor> = Arc::new(move |task: Task| queue.lock().push(task));

        let recorder = Recorder::<i32>::new();
        let subscription =
            IterSubscription::<i32, _>::new((0..5).map(Ok), recorder.clone(), executor, usize::MAX);

        subscription.request(i64::MAX);
        subscription.request(1);
        assert_eq!(subscription.demand(), i64::MAX);

        let tasks: Vec<Task> = queued.lock().drain(..).collect();
        assert_eq!(tasks.len(), 1);
        for task in tasks {
            task();
        }

        // Four decrements; the last item completes the stream instead
        assert_eq!(subscription.demand(), i64::MAX - 4);
        assert!(subscription.is_terminated());
        assert_eq!(recorder.signals().len(), 6);
    }

    #[test]
    fn reentrant_requests_do_not_start_a_second_drain() {
        let depth = Arc::new(AtomicUsize::new(0));
        let max_depth = Arc::new(AtomicUsize::new(0));
        let (d, m) = (Arc::clone(&depth), Arc::clone(&max_depth));

        let publisher = IterPublisher::new(|| (0..50).map(Ok));
        let recorder = Recorder::<i32>::with_on_next(move |recorder, _| {
            let now = d.fetch_add(1, Ordering::SeqCst) + 1;
            m.fetch_max(now, Ordering::SeqCst);
            recorder.request(1);
            d.fetch_sub(1, Ordering::SeqCst);
        });
        attach(&publisher, &recorder);

        recorder.request(1);

        let signals = recorder.signals();
        assert_eq!(signals.len(), 51);
        assert_eq!(signals.last(), Some(&Signal::Complete));
        assert_eq!(max_depth.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn batch_size_hands_work_back_to_the_executor() {
        let executions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&executions);

        let publisher = IterPublisher::builder(|| (0..5).map(Ok))
            .executor(move |task: Task| {
                counter.fetch_add(1, Ordering::SeqCst);
                task();
            })
            .batch_size(2)
            .build();
        let recorder = Recorder::<i32>::new();
        attach(&publisher, &recorder);

        recorder.request(5);

        assert_eq!(recorder.signals().len(), 6);
        assert_eq!(executions.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn each_subscriber_gets_a_fresh_sequence() {
        let publisher = IterPublisher::from_vec(vec![7, 8]);
        let first = Recorder::<i32>::new();
        let second = Recorder::<i32>::new();
        attach(&publisher, &first);
        attach(&publisher, &second);

        first.request(5);
        second.request(1);

        assert_eq!(first.signals().len(), 3);
        assert_eq!(second.signals(), vec![Signal::Next(7)]);
    }

    fn wait_until(condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn invalid_request_waits_for_the_item_in_flight() {
        let entered = Arc::new(AtomicBool::new(false));
        let release = Arc::new(AtomicBool::new(false));
        let (e, r) = (Arc::clone(&entered), Arc::clone(&release));

        let publisher = IterPublisher::builder(|| (0..3).map(Ok))
            .executor(ThreadExecutor::new())
            .build();
        let recorder = Recorder::<i32>::with_on_next(move |_, item| {
            if *item == 0 {
                e.store(true, Ordering::SeqCst);
                while !r.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(1));
                }
            }
        });
        attach(&publisher, &recorder);

        recorder.request(1);
        wait_until(|| entered.load(Ordering::SeqCst));

        recorder.request(-1);
        assert_eq!(recorder.signals(), vec![Signal::Next(0)]);

        release.store(true, Ordering::SeqCst);
        wait_until(|| recorder.signals().len() == 2);

        let signals = recorder.signals();
        assert_eq!(signals[0], Signal::Next(0));
        assert!(matches!(&signals[1], Signal::Error(msg) if msg.contains("-1")));
    }

    #[test]
    fn dropped_emission_task_fails_the_subscription() {
        let publisher = IterPublisher::builder(|| (0..3).map(Ok))
            .executor(|task: Task| drop(task))
            .build();
        let recorder = Recorder::<i32>::new();
        attach(&publisher, &recorder);

        recorder.request(1);
        recorder.request(10);

        assert_eq!(
            recorder.signals(),
            vec![Signal::Error(StreamError::Rejected.to_string())]
        );
    }

    #[test]
    fn publishers_can_share_one_executor() {
        let executions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&executions);
        let executor: Arc<dyn Executor> = Arc::new(move |task: Task| {
            counter.fetch_add(1, Ordering::SeqCst);
            task();
        });

        let first = IterPublisher::builder(|| (0..2).map(Ok))
            .shared_executor(Arc::clone(&executor))
            .build();
        let second = IterPublisher::builder(|| (10..12).map(Ok))
            .shared_executor(executor)
            .build();
        let (a, b) = (Recorder::<i32>::new(), Recorder::<i32>::new());
        attach(&first, &a);
        attach(&second, &b);

        a.request(5);
        b.request(5);

        assert_eq!(
            a.signals(),
            vec![Signal::Next(0), Signal::Next(1), Signal::Complete]
        );
        assert_eq!(
            b.signals(),
            vec![Signal::Next(10), Signal::Next(11), Signal::Complete]
        );
        assert_eq!(executions.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn concurrent_requests_deliver_in_order_exactly_once() {
        let publisher = IterPublisher::builder(|| (0..1000).map(Ok))
            .executor(ThreadExecutor::named("emit"))
            .batch_size(64)
            .build();
        let recorder = Recorder::<i32>::new();
        attach(&publisher, &recorder);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let recorder = Arc::clone(&recorder);
                thread::spawn(move || {
                    for _ in 0..250 {
                        recorder.request(1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let deadline = Instant::now() + Duration::from_secs(10);
        while !recorder.signals().contains(&Signal::Complete) {
            assert!(Instant::now() < deadline, "stream did not complete");
            thread::sleep(Duration::from_millis(5));
        }

        let signals = recorder.signals();
        let expected: Vec<_> = (0..1000)
            .map(Signal::Next)
            .chain(std::iter::once(Signal::Complete))
            .collect();
        assert_eq!(signals, expected);
    }
}
