use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// A failure of a top-level [`Resolver::resolve`](crate::Resolver::resolve)
/// call. Nothing is recovered locally; every error propagates to the caller
/// and leaves the cache exactly as it was before the call.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// A view name was requested that is not present in the registry.
    #[error("unknown view `{0}`")]
    UnknownView(Arc<str>),

    /// A view called itself during its own evaluation, directly or through
    /// other views. The chain lists the offending call path, ending with the
    /// view that closed the cycle.
    #[error("circular dependency: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<Arc<str>> },

    /// A view name was registered twice.
    #[error("view `{0}` is already registered")]
    DuplicateView(Arc<str>),

    /// A view function surfaced a data error while building its table.
    #[error(transparent)]
    Table(#[from] TableError),
}

/// An error produced while materializing a [`Table`](crate::Table), either
/// by a transformation input or by a raw data-source fetch.
///
/// The inner error is reference-counted: a table's rows are computed once
/// and shared, so a single failure is handed to every waiter.
#[derive(Debug, Clone)]
pub struct TableError(Arc<dyn std::error::Error + Send + Sync>);

impl TableError {
    /// Wrap an arbitrary error.
    pub fn new(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(error))
    }

    /// Construct from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self(Arc::new(Message(message.into())))
    }
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for TableError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for Message {}
