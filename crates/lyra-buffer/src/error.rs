use lyra_core::BufferType;
use lyra_net::NetError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BufferError {
    #[error("Network error: {0}")]
    Net(#[from] NetError),

    #[error("Source buffer error: {0}")]
    SourceBuffer(String),

    #[error("{buffer_type} buffer error: {message}")]
    Scheduler {
        buffer_type: BufferType,
        message: String,
    },
}

impl BufferError {
    pub fn scheduler(buffer_type: BufferType, message: impl Into<String>) -> Self {
        Self::Scheduler {
            buffer_type,
            message: message.into(),
        }
    }

    pub fn source_buffer(message: impl Into<String>) -> Self {
        Self::SourceBuffer(message.into())
    }

    /// The segment asked for is not available yet (HTTP 412).
    #[must_use]
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, Self::Net(error) if error.is_precondition_failed())
    }
}

pub type BufferResult<T> = Result<T, BufferError>;
