//! Conversions between the [`flow`] and [`reactive`] interface families.
//!
//! Every role has one handle per family. A handle either holds an object of
//! its own family (`Native`) or forwards 1:1 to an object of the other one.
//! Converting a handle to the other family never nests adapters: a `Native`
//! value becomes a forwarding handle, and a forwarding handle is unwrapped
//! back to the object it was created from.
//!
//! ```rust
//! use flowbridge::{FlowPublisher, IterPublisher, flow};
//! use std::sync::Arc;
//!
//! let publisher: Arc<dyn flow::Publisher<i32>> = Arc::new(IterPublisher::from_vec(vec![1, 2]));
//! let reactive = FlowPublisher::Native(Arc::clone(&publisher)).to_reactive();
//!
//! match reactive.to_flow() {
//!     FlowPublisher::Native(original) => assert!(Arc::ptr_eq(&original, &publisher)),
//!     FlowPublisher::Reactive(_) => unreachable!(),
//! }
//! ```

use super::{error::StreamError, flow, reactive};
use std::sync::Arc;

// ----------- Subscription -----------

#[derive(Clone)]
pub enum FlowSubscription {
    Native(Arc<dyn flow::Subscription>),
    Reactive(Arc<dyn reactive::Subscription>),
}

#[derive(Clone)]
pub enum ReactiveSubscription {
    Native(Arc<dyn reactive::Subscription>),
    Flow(Arc<dyn flow::Subscription>),
}

impl FlowSubscription {
    pub fn to_reactive(&self) -> ReactiveSubscription {
        match self {
            Self::Native(s) => ReactiveSubscription::Flow(Arc::clone(s)),
            Self::Reactive(s) => ReactiveSubscription::Native(Arc::clone(s)),
        }
    }

    /// The handle as a plain `flow` object, without a wrapper when native.
    pub fn into_shared(self) -> Arc<dyn flow::Subscription> {
        match self {
            Self::Native(s) => s,
            forwarding => Arc::new(forwarding),
        }
    }
}

impl ReactiveSubscription {
    pub fn to_flow(&self) -> FlowSubscription {
        match self {
            Self::Native(s) => FlowSubscription::Reactive(Arc::clone(s)),
            Self::Flow(s) => FlowSubscription::Native(Arc::clone(s)),
        }
    }

    pub fn into_shared(self) -> Arc<dyn reactive::Subscription> {
        match self {
            Self::Native(s) => s,
            forwarding => Arc::new(forwarding),
        }
    }
}

impl flow::Subscription for FlowSubscription {
    fn request(&self, n: i64) {
        match self {
            Self::Native(s) => s.request(n),
            Self::Reactive(s) => s.request(n),
        }
    }

    fn cancel(&self) {
        match self {
            Self::Native(s) => s.cancel(),
            Self::Reactive(s) => s.cancel(),
        }
    }
}

impl reactive::Subscription for ReactiveSubscription {
    fn request(&self, n: i64) {
        match self {
            Self::Native(s) => s.request(n),
            Self::Flow(s) => s.request(n),
        }
    }

    fn cancel(&self) {
        match self {
            Self::Native(s) => s.cancel(),
            Self::Flow(s) => s.cancel(),
        }
    }
}

impl From<ReactiveSubscription> for FlowSubscription {
    fn from(subscription: ReactiveSubscription) -> Self {
        subscription.to_flow()
    }
}

impl From<FlowSubscription> for ReactiveSubscription {
    fn from(subscription: FlowSubscription) -> Self {
        subscription.to_reactive()
    }
}

// ----------- Subscriber -----------

pub enum FlowSubscriber<T> {
    Native(Arc<dyn flow::Subscriber<T>>),
    Reactive(Arc<dyn reactive::Subscriber<T>>),
}

pub enum ReactiveSubscriber<T> {
    Native(Arc<dyn reactive::Subscriber<T>>),
    Flow(Arc<dyn flow::Subscriber<T>>),
}

impl<T> Clone for FlowSubscriber<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Native(s) => Self::Native(Arc::clone(s)),
            Self::Reactive(s) => Self::Reactive(Arc::clone(s)),
        }
    }
}

impl<T> Clone for ReactiveSubscriber<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Native(s) => Self::Native(Arc::clone(s)),
            Self::Flow(s) => Self::Flow(Arc::clone(s)),
        }
    }
}

impl<T: Send + 'static> FlowSubscriber<T> {
    pub fn to_reactive(&self) -> ReactiveSubscriber<T> {
        match self {
            Self::Native(s) => ReactiveSubscriber::Flow(Arc::clone(s)),
            Self::Reactive(s) => ReactiveSubscriber::Native(Arc::clone(s)),
        }
    }

    pub fn into_shared(self) -> Arc<dyn flow::Subscriber<T>> {
        match self {
            Self::Native(s) => s,
            forwarding => Arc::new(forwarding),
        }
    }
}

impl<T: Send + 'static> ReactiveSubscriber<T> {
    pub fn to_flow(&self) -> FlowSubscriber<T> {
        match self {
            Self::Native(s) => FlowSubscriber::Reactive(Arc::clone(s)),
            Self::Flow(s) => FlowSubscriber::Native(Arc::clone(s)),
        }
    }

    pub fn into_shared(self) -> Arc<dyn reactive::Subscriber<T>> {
        match self {
            Self::Native(s) => s,
            forwarding => Arc::new(forwarding),
        }
    }
}

impl<T: Send + 'static> flow::Subscriber<T> for FlowSubscriber<T> {
    fn on_subscribe(&self, subscription: Arc<dyn flow::Subscription>) {
        match self {
            Self::Native(s) => s.on_subscribe(subscription),
            Self::Reactive(s) => {
                s.on_subscribe(ReactiveSubscription::Flow(subscription).into_shared())
            }
        }
    }

    fn on_next(&self, item: T) {
        match self {
            Self::Native(s) => s.on_next(item),
            Self::Reactive(s) => s.on_next(item),
        }
    }

    fn on_error(&self, error: StreamError) {
        match self {
            Self::Native(s) => s.on_error(error),
            Self::Reactive(s) => s.on_error(error),
        }
    }

    fn on_complete(&self) {
        match self {
            Self::Native(s) => s.on_complete(),
            Self::Reactive(s) => s.on_complete(),
        }
    }
}

impl<T: Send + 'static> reactive::Subscriber<T> for ReactiveSubscriber<T> {
    fn on_subscribe(&self, subscription: Arc<dyn reactive::Subscription>) {
        match self {
            Self::Native(s) => s.on_subscribe(subscription),
            Self::Flow(s) => s.on_subscribe(FlowSubscription::Reactive(subscription).into_shared()),
        }
    }

    fn on_next(&self, item: T) {
        match self {
            Self::Native(s) => s.on_next(item),
            Self::Flow(s) => s.on_next(item),
        }
    }

    fn on_error(&self, error: StreamError) {
        match self {
            Self::Native(s) => s.on_error(error),
            Self::Flow(s) => s.on_error(error),
        }
    }

    fn on_complete(&self) {
        match self {
            Self::Native(s) => s.on_complete(),
            Self::Flow(s) => s.on_complete(),
        }
    }
}

impl<T: Send + 'static> From<ReactiveSubscriber<T>> for FlowSubscriber<T> {
    fn from(subscriber: ReactiveSubscriber<T>) -> Self {
        subscriber.to_flow()
    }
}

impl<T: Send + 'static> From<FlowSubscriber<T>> for ReactiveSubscriber<T> {
    fn from(subscriber: FlowSubscriber<T>) -> Self {
        subscriber.to_reactive()
    }
}

// ----------- Publisher -----------

pub enum FlowPublisher<T> {
    Native(Arc<dyn flow::Publisher<T>>),
    Reactive(Arc<dyn reactive::Publisher<T>>),
}

pub enum ReactivePublisher<T> {
    Native(Arc<dyn reactive::Publisher<T>>),
    Flow(Arc<dyn flow::Publisher<T>>),
}

impl<T> Clone for FlowPublisher<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Native(p) => Self::Native(Arc::clone(p)),
            Self::Reactive(p) => Self::Reactive(Arc::clone(p)),
        }
    }
}

impl<T> Clone for ReactivePublisher<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Native(p) => Self::Native(Arc::clone(p)),
            Self::Flow(p) => Self::Flow(Arc::clone(p)),
        }
    }
}

impl<T: Send + 'static> FlowPublisher<T> {
    pub fn to_reactive(&self) -> ReactivePublisher<T> {
        match self {
            Self::Native(p) => ReactivePublisher::Flow(Arc::clone(p)),
            Self::Reactive(p) => ReactivePublisher::Native(Arc::clone(p)),
        }
    }

    pub fn into_shared(self) -> Arc<dyn flow::Publisher<T>> {
        match self {
            Self::Native(p) => p,
            forwarding => Arc::new(forwarding),
        }
    }
}

impl<T: Send + 'static> ReactivePublisher<T> {
    pub fn to_flow(&self) -> FlowPublisher<T> {
        match self {
            Self::Native(p) => FlowPublisher::Reactive(Arc::clone(p)),
            Self::Flow(p) => FlowPublisher::Native(Arc::clone(p)),
        }
    }

    pub fn into_shared(self) -> Arc<dyn reactive::Publisher<T>> {
        match self {
            Self::Native(p) => p,
            forwarding => Arc::new(forwarding),
        }
    }
}

impl<T: Send + 'static> flow::Publisher<T> for FlowPublisher<T> {
    fn subscribe(&self, subscriber: Arc<dyn flow::Subscriber<T>>) {
        match self {
            Self::Native(p) => p.subscribe(subscriber),
            Self::Reactive(p) => p.subscribe(ReactiveSubscriber::Flow(subscriber).into_shared()),
        }
    }
}

impl<T: Send + 'static> reactive::Publisher<T> for ReactivePublisher<T> {
    fn subscribe(&self, subscriber: Arc<dyn reactive::Subscriber<T>>) {
        match self {
            Self::Native(p) => p.subscribe(subscriber),
            Self::Flow(p) => p.subscribe(FlowSubscriber::Reactive(subscriber).into_shared()),
        }
    }
}

impl<T: Send + 'static> From<ReactivePublisher<T>> for FlowPublisher<T> {
    fn from(publisher: ReactivePublisher<T>) -> Self {
        publisher.to_flow()
    }
}

impl<T: Send + 'static> From<FlowPublisher<T>> for ReactivePublisher<T> {
    fn from(publisher: FlowPublisher<T>) -> Self {
        publisher.to_reactive()
    }
}

// ----------- Processor -----------

pub enum FlowProcessor<T, R> {
    Native(Arc<dyn flow::Processor<T, R>>),
    Reactive(Arc<dyn reactive::Processor<T, R>>),
}

pub enum ReactiveProcessor<T, R> {
    Native(Arc<dyn reactive::Processor<T, R>>),
    Flow(Arc<dyn flow::Processor<T, R>>),
}

impl<T, R> Clone for FlowProcessor<T, R> {
    fn clone(&self) -> Self {
        match self {
            Self::Native(p) => Self::Native(Arc::clone(p)),
            Self::Reactive(p) => Self::Reactive(Arc::clone(p)),
        }
    }
}

impl<T, R> Clone for ReactiveProcessor<T, R> {
    fn clone(&self) -> Self {
        match self {
            Self::Native(p) => Self::Native(Arc::clone(p)),
            Self::Flow(p) => Self::Flow(Arc::clone(p)),
        }
    }
}

impl<T: Send + 'static, R: Send + 'static> FlowProcessor<T, R> {
    pub fn to_reactive(&self) -> ReactiveProcessor<T, R> {
        match self {
            Self::Native(p) => ReactiveProcessor::Flow(Arc::clone(p)),
            Self::Reactive(p) => ReactiveProcessor::Native(Arc::clone(p)),
        }
    }
}

impl<T: Send + 'static, R: Send + 'static> ReactiveProcessor<T, R> {
    pub fn to_flow(&self) -> FlowProcessor<T, R> {
        match self {
            Self::Native(p) => FlowProcessor::Reactive(Arc::clone(p)),
            Self::Flow(p) => FlowProcessor::Native(Arc::clone(p)),
        }
    }
}

impl<T: Send + 'static, R: Send + 'static> flow::Subscriber<T> for FlowProcessor<T, R> {
    fn on_subscribe(&self, subscription: Arc<dyn flow::Subscription>) {
        match self {
            Self::Native(p) => p.on_subscribe(subscription),
            Self::Reactive(p) => {
                p.on_subscribe(ReactiveSubscription::Flow(subscription).into_shared())
            }
        }
    }

    fn on_next(&self, item: T) {
        match self {
            Self::Native(p) => p.on_next(item),
            Self::Reactive(p) => p.on_next(item),
        }
    }

    fn on_error(&self, error: StreamError) {
        match self {
            Self::Native(p) => p.on_error(error),
            Self::Reactive(p) => p.on_error(error),
        }
    }

    fn on_complete(&self) {
        match self {
            Self::Native(p) => p.on_complete(),
            Self::Reactive(p) => p.on_complete(),
        }
    }
}

impl<T: Send + 'static, R: Send + 'static> flow::Publisher<R> for FlowProcessor<T, R> {
    fn subscribe(&self, subscriber: Arc<dyn flow::Subscriber<R>>) {
        match self {
            Self::Native(p) => p.subscribe(subscriber),
            Self::Reactive(p) => p.subscribe(ReactiveSubscriber::Flow(subscriber).into_shared()),
        }
    }
}

impl<T: Send + 'static, R: Send + 'static> reactive::Subscriber<T> for ReactiveProcessor<T, R> {
    fn on_subscribe(&self, subscription: Arc<dyn reactive::Subscription>) {
        match self {
            Self::Native(p) => p.on_subscribe(subscription),
            Self::Flow(p) => p.on_subscribe(FlowSubscription::Reactive(subscription).into_shared()),
        }
    }

    fn on_next(&self, item: T) {
        match self {
            Self::Native(p) => p.on_next(item),
            Self::Flow(p) => p.on_next(item),
        }
    }

    fn on_error(&self, error: StreamError) {
        match self {
            Self::Native(p) => p.on_error(error),
            Self::Flow(p) => p.on_error(error),
        }
    }

    fn on_complete(&self) {
        match self {
            Self::Native(p) => p.on_complete(),
            Self::Flow(p) => p.on_complete(),
        }
    }
}

impl<T: Send + 'static, R: Send + 'static> reactive::Publisher<R> for ReactiveProcessor<T, R> {
    fn subscribe(&self, subscriber: Arc<dyn reactive::Subscriber<R>>) {
        match self {
            Self::Native(p) => p.subscribe(subscriber),
            Self::Flow(p) => p.subscribe(FlowSubscriber::Reactive(subscriber).into_shared()),
        }
    }
}

impl<T: Send + 'static, R: Send + 'static> From<ReactiveProcessor<T, R>> for FlowProcessor<T, R> {
    fn from(processor: ReactiveProcessor<T, R>) -> Self {
        processor.to_flow()
    }
}

impl<T: Send + 'static, R: Send + 'static> From<FlowProcessor<T, R>> for ReactiveProcessor<T, R> {
    fn from(processor: FlowProcessor<T, R>) -> Self {
        processor.to_reactive()
    }
}
