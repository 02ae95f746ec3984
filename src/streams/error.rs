use std::{error::Error, fmt, io, sync::Arc};

#[derive(Debug, Clone, thiserror::Error)]
pub enum StreamError {
    /// A subscriber asked for zero or a negative number of items.
    #[error("Non-positive request signals are illegal: requested {0}")]
    InvalidDemand(i64),
    /// The executor dropped an emission task without running it.
    #[error("Executor dropped the emission task before running it")]
    Rejected,
    #[error("{0}")]
    Other(#[source] Arc<dyn Error + Send + Sync>),
}

impl StreamError {
    /// Wrap any error type into `StreamError`
    pub fn other<E>(e: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        StreamError::Other(Arc::new(e))
    }

    /// Wrap a boxed error
    pub fn other_boxed(e: Box<dyn Error + Send + Sync>) -> Self {
        StreamError::Other(e.into())
    }
}

#[derive(Debug)]
struct MessageError(String);

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for MessageError {}

impl From<&str> for StreamError {
    fn from(s: &str) -> Self {
        StreamError::Other(Arc::new(MessageError(s.to_string())))
    }
}

impl From<String> for StreamError {
    fn from(s: String) -> Self {
        StreamError::Other(Arc::new(MessageError(s)))
    }
}

impl From<io::Error> for StreamError {
    fn from(e: io::Error) -> Self {
        StreamError::Other(Arc::new(e))
    }
}

impl From<Box<dyn Error + Send + Sync>> for StreamError {
    fn from(e: Box<dyn Error + Send + Sync>) -> Self {
        StreamError::Other(e.into())
    }
}

// Upstream failures reach blocking readers as I/O errors
impl From<StreamError> for io::Error {
    fn from(e: StreamError) -> Self {
        io::Error::other(e)
    }
}

/// Macro for users to add direct `From` implementations for their error types,
/// so fallible sequences can use `?` without `.map_err(StreamError::other)`.
///
/// # Example
/// ```rust
/// use flowbridge::{StreamError, impl_stream_error_from};
///
/// #[derive(Debug)]
/// struct ParseError;
/// impl std::fmt::Display for ParseError {
///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
///         write!(f, "parse error")
///     }
/// }
/// impl std::error::Error for ParseError {}
///
/// impl_stream_error_from!(ParseError);
///
/// fn parse() -> Result<(), StreamError> {
///     Err::<(), _>(ParseError)?;
///     Ok(())
/// }
/// assert!(parse().is_err());
/// ```
#[macro_export]
macro_rules! impl_stream_error_from {
    ($($error_type:ty),* $(,)?) => {
        $(
            impl From<$error_type> for $crate::streams::error::StreamError {
                fn from(e: $error_type) -> Self {
                    $crate::streams::error::StreamError::Other(std::sync::Arc::new(e))
                }
            }
        )*
    };
}
