use thiserror::Error;

use crate::reference::MethodId;
use crate::source::TopicSource;

pub type Result<T> = std::result::Result<T, TendrilError>;

#[derive(Debug, Error)]
pub enum TendrilError {
    #[error("instance method {method} needs a target to bind to")]
    InvalidBinding { method: MethodId },

    #[error("callable aggregates {count} bindings; exactly one is allowed")]
    MultipleBindingsNotAllowed { count: usize },

    #[error("subscriber store for {topic} is disposed")]
    StoreDisposed { topic: TopicSource },

    /// A subscriber returned an error; dispatch to the rest was abandoned.
    #[error("subscriber {method} failed: {source}")]
    SubscriberInvocationFailed {
        method: MethodId,
        source: HandlerError,
    },
}

/// Error returned by a subscriber callable.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// What a subscriber callable returns.
pub type HandlerResult = std::result::Result<(), HandlerError>;
