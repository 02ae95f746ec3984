//! The `reactive` interface family.
//!
//! Same shape and contract as [`crate::streams::flow`]; libraries tend to
//! pick one of the two, and [`crate::streams::bridge`] converts between them.

use super::error::StreamError;
use std::sync::Arc;

pub trait Subscription: Send + Sync + 'static {
    fn request(&self, n: i64);

    fn cancel(&self);
}

pub trait Subscriber<T>: Send + Sync + 'static {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>);

    fn on_next(&self, item: T);

    fn on_error(&self, error: StreamError);

    fn on_complete(&self);
}

pub trait Publisher<T>: Send + Sync + 'static {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>);
}

pub trait Processor<T, R>: Subscriber<T> + Publisher<R> {}
