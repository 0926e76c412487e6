//! Server error types.

use derive_more::{Display, Error};

/// Kinds of server failure.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ServerErrorKind {
    /// The listening socket could not be bound. Fatal at startup.
    #[display("failed to bind {address}: {message}")]
    Bind {
        /// Address that was requested.
        address: String,
        /// Underlying I/O error.
        message: String,
    },

    /// Any other socket failure.
    #[display("I/O error: {message}")]
    Io {
        /// Underlying I/O error.
        message: String,
    },
}

/// Server error with the location it was raised at.
#[derive(Debug, Clone, Display, Error)]
#[display("Server error: {} at {}:{}", kind, file, line)]
pub struct ServerError {
    /// What went wrong.
    pub kind: ServerErrorKind,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ServerError {
    /// Creates a new server error.
    #[track_caller]
    pub fn new(kind: ServerErrorKind) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Bind failure for `address`.
    #[track_caller]
    pub fn bind(address: impl Into<String>, err: &std::io::Error) -> Self {
        Self::new(ServerErrorKind::Bind {
            address: address.into(),
            message: err.to_string(),
        })
    }

    /// Generic I/O failure.
    #[track_caller]
    pub fn io(err: &std::io::Error) -> Self {
        Self::new(ServerErrorKind::Io {
            message: err.to_string(),
        })
    }

    /// True for a bind failure.
    pub fn is_bind(&self) -> bool {
        matches!(self.kind, ServerErrorKind::Bind { .. })
    }
}
