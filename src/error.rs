//! Error handling for ascope-rs
//!
//! This module defines the crate error type, a Result alias, and the
//! process exit codes derived from it.

use thiserror::Error;

/// Exit status when the process quits normally
pub const EXIT_OK: i32 = 0;

/// Exit status when the link or display could not be acquired at startup
pub const EXIT_STARTUP: i32 = 1;

/// Exit status when the link failed while running
pub const EXIT_LINK: i32 = 2;

/// Main error type for ascope-rs operations
#[derive(Error, Debug)]
pub enum ScopeError {
    /// The instrument channel or the display surface could not be acquired
    #[error("Startup error: {0}")]
    Startup(String),

    /// Transport-level failure on the instrument channel
    #[error("Link error: {0}")]
    Link(String),

    /// A started frame did not complete before its deadline
    #[error("Frame timed out after {received} of {expected} bytes")]
    FrameTimeout { received: usize, expected: usize },

    /// An acquisition config the instrument cannot be asked to run
    #[error("Invalid acquisition config: {0}")]
    InvalidConfig(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ScopeError>,
    },
}

impl ScopeError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ScopeError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any context wrappers
    pub fn root(&self) -> &ScopeError {
        match self {
            ScopeError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the reactor must stop on this error
    pub fn is_fatal(&self) -> bool {
        !matches!(self.root(), ScopeError::FrameTimeout { .. })
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self.root() {
            ScopeError::Startup(_) | ScopeError::Config(_) => EXIT_STARTUP,
            _ => EXIT_LINK,
        }
    }
}

/// Result type alias for ascope-rs operations
pub type Result<T> = std::result::Result<T, ScopeError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
