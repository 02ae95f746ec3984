//! The `flow` interface family: publisher, subscriber, subscription and processor.
//!
//! Signals are delivered from whatever thread the publisher runs on, so every
//! role is `Send + Sync` and shared behind an `Arc`.

use super::error::StreamError;
use std::sync::Arc;

/// Link between one publisher and one subscriber.
pub trait Subscription: Send + Sync + 'static {
    /// Authorise the publisher to emit up to `n` more items.
    ///
    /// A non-positive `n` is a protocol violation; the publisher answers it
    /// with a terminal error signal.
    fn request(&self, n: i64);

    /// Stop emission. After this returns no new signals are started.
    fn cancel(&self);
}

/// Receiver of items and terminal signals.
pub trait Subscriber<T>: Send + Sync + 'static {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>);

    fn on_next(&self, item: T);

    fn on_error(&self, error: StreamError);

    fn on_complete(&self);
}

/// Source of items for any number of subscribers.
pub trait Publisher<T>: Send + Sync + 'static {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>);
}

/// A stage that consumes `T` and publishes `R`.
pub trait Processor<T, R>: Subscriber<T> + Publisher<R> {}
