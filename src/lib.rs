//! Push/pull plumbing for reactive streams.
//!
//! - [`IterPublisher`] emits a lazily supplied sequence under subscriber demand.
//! - [`DataBufferReader`] reads a publisher of byte chunks through blocking
//!   [`std::io::Read`].
//! - [`bridge`] converts between the [`flow`] and [`reactive`] interface
//!   families without nesting adapters.
//! - [`PublisherStream`] exposes a publisher as a [`futures::Stream`].

pub mod streams;

pub use streams::*;
