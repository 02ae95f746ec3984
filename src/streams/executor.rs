use std::thread;

/// Unit of work handed to an [`Executor`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs emission work on behalf of a publisher.
///
/// Any `Fn(Task)` closure is an executor, so spawn functions can be passed
/// straight through:
///
/// ```rust
/// use flowbridge::{IterPublisher, StreamError, Task};
///
/// let publisher = IterPublisher::builder(|| (0..3).map(Ok::<_, StreamError>))
///     .executor(|task: Task| {
///         std::thread::spawn(task);
///     })
///     .build();
/// # drop(publisher);
/// ```
pub trait Executor: Send + Sync + 'static {
    fn execute(&self, task: Task);
}

impl<F> Executor for F
where
    F: Fn(Task) + Send + Sync + 'static,
{
    fn execute(&self, task: Task) {
        self(task)
    }
}

/// Runs each task immediately on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, task: Task) {
        task()
    }
}

/// Runs each task on its own OS thread.
///
/// A task whose thread cannot be spawned is dropped unrun, which fails the
/// subscription that scheduled it with [`StreamError::Rejected`].
///
/// [`StreamError::Rejected`]: crate::StreamError::Rejected
#[derive(Debug, Clone, Default)]
pub struct ThreadExecutor {
    name: Option<String>,
}

impl ThreadExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name given to spawned threads.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

impl Executor for ThreadExecutor {
    fn execute(&self, task: Task) {
        let mut builder = thread::Builder::new();
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }
        if let Err(e) = builder.spawn(task) {
            log::warn!("failed to spawn executor thread: {e}");
        }
    }
}
