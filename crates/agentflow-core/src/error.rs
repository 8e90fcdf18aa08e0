use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum FlowError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Routing error: {0}")]
    Routing(String),

    #[error("Tool error: {tool}: {message}")]
    Tool { tool: String, message: String },

    #[error("Model error: {0}")]
    Model(String),

    #[error("Run exceeded its ceiling of {0} steps")]
    CeilingExceeded(usize),

    #[error("Run cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for FlowError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

/// Coarse classification of a [`FlowError`], used when reporting a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Routing,
    Tool,
    Model,
    CeilingExceeded,
    Cancelled,
}

impl FlowError {
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FlowError::Configuration(_) | FlowError::Io(_) => ErrorKind::Configuration,
            FlowError::Routing(_) => ErrorKind::Routing,
            FlowError::Tool { .. } => ErrorKind::Tool,
            FlowError::Model(_) => ErrorKind::Model,
            FlowError::CeilingExceeded(_) => ErrorKind::CeilingExceeded,
            FlowError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
