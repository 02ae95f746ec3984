pub mod bridge;
pub mod data_buffer;
pub mod error;
pub mod executor;
pub mod flow;
pub mod publisher;
pub mod reactive;
pub mod reader;
pub mod stream;

pub type StreamResult<T> = Result<T, error::StreamError>;

// Re-export main types
pub use bridge::{
    FlowProcessor, FlowPublisher, FlowSubscriber, FlowSubscription, ReactiveProcessor,
    ReactivePublisher, ReactiveSubscriber, ReactiveSubscription,
};
pub use data_buffer::{DataBuffer, HeapBuffer};
pub use error::StreamError;
pub use executor::{Executor, InlineExecutor, Task, ThreadExecutor};
pub use publisher::{IterPublisher, IterPublisherBuilder, IterSubscription, SequenceSupplier};
pub use reader::{CloseHandle, DataBufferReader, ReaderState};
pub use stream::PublisherStream;
