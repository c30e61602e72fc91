//! Dependency capability the relay delegates work to.
//!
//! The relay never owns a dependency's lifetime: it holds an
//! `Arc<dyn Dependency>` obtained from a [`DependencyProvider`] at
//! construction and only ever calls through `&self`.
//!
//! Two ways to supply one:
//! - implement [`Dependency`] directly (callback-style async)
//! - implement [`AsyncDependency`] and wrap it in [`Spawned`], which runs the
//!   async half as a task on a tokio runtime

use async_trait::async_trait;
use std::sync::Arc;
use tokio::runtime::Handle;

use crate::error::{Error, Result};

/// Completion routine handed to [`Dependency::async_call`].
///
/// Receives `(success, data)`. May be called from any thread.
pub type CompletionFn = Box<dyn FnOnce(bool, String) + Send + 'static>;

/// Failure reported by a dependency.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DependencyError {
    message: String,
}

impl DependencyError {
    /// Create a new dependency error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for DependencyError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

/// The capability a [`Relay`](crate::Relay) calls into to perform actual work.
///
/// Implementations must be safe for concurrent calls; the relay never
/// mutates them.
///
/// Failures are reported by returning `Err` (or `success = false` through the
/// completion routine). The relay does not catch panics: a panic in
/// `sync_call` or `async_call` unwinds into the relay's caller.
pub trait Dependency: Send + Sync {
    /// Name used in log output.
    fn name(&self) -> &str {
        "dependency"
    }

    /// Gate checked before every call. When it returns `false` the relay
    /// short-circuits and the dependency is not called.
    fn should_proceed(&self) -> bool {
        true
    }

    /// Perform the work synchronously.
    fn sync_call(&self, input: &str) -> std::result::Result<String, DependencyError>;

    /// Start the work and report its result through `completion`.
    ///
    /// Returning `Err` means the work was never scheduled.
    fn async_call(
        &self,
        param: &str,
        completion: CompletionFn,
    ) -> std::result::Result<(), DependencyError>;
}

/// Factory supplying the dependency a relay is built around.
pub trait DependencyProvider {
    /// Hand out a shared reference to the dependency.
    fn dependency(&self) -> Arc<dyn Dependency>;
}

impl<D: Dependency + 'static> DependencyProvider for Arc<D> {
    fn dependency(&self) -> Arc<dyn Dependency> {
        Arc::clone(self) as Arc<dyn Dependency>
    }
}

/// Adapts a closure into a [`DependencyProvider`].
pub struct FnProvider<F>(pub F);

impl<F> DependencyProvider for FnProvider<F>
where
    F: Fn() -> Arc<dyn Dependency>,
{
    fn dependency(&self) -> Arc<dyn Dependency> {
        (self.0)()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Future-based dependencies
// ─────────────────────────────────────────────────────────────────────────────

/// A dependency whose asynchronous work is naturally a future.
///
/// Wrap in [`Spawned`] to use it as a [`Dependency`].
#[async_trait]
pub trait AsyncDependency: Send + Sync + 'static {
    /// Name used in log output.
    fn name(&self) -> &str {
        "async-dependency"
    }

    /// See [`Dependency::should_proceed`].
    fn should_proceed(&self) -> bool {
        true
    }

    /// Perform the work synchronously.
    fn call(&self, input: &str) -> std::result::Result<String, DependencyError>;

    /// Perform the work asynchronously.
    async fn call_async(&self, param: String) -> std::result::Result<String, DependencyError>;
}

/// Runs an [`AsyncDependency`] on a tokio runtime, completing the relay's
/// routine from the spawned task.
pub struct Spawned<D> {
    inner: Arc<D>,
    runtime: Handle,
}

impl<D: AsyncDependency> Spawned<D> {
    /// Wrap `inner`, spawning its async work onto `runtime`.
    pub fn new(inner: D, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(inner),
            runtime,
        }
    }

    /// Wrap `inner` using the runtime of the current context.
    pub fn current(inner: D) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        Ok(Self::new(inner, runtime))
    }
}

impl<D: AsyncDependency> Dependency for Spawned<D> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn should_proceed(&self) -> bool {
        self.inner.should_proceed()
    }

    fn sync_call(&self, input: &str) -> std::result::Result<String, DependencyError> {
        self.inner.call(input)
    }

    fn async_call(
        &self,
        param: &str,
        completion: CompletionFn,
    ) -> std::result::Result<(), DependencyError> {
        let inner = Arc::clone(&self.inner);
        let param = param.to_string();

        self.runtime.spawn(async move {
            match inner.call_async(param).await {
                Ok(data) => completion(true, data),
                Err(e) => completion(false, e.to_string()),
            }
        });

        Ok(())
    }
}
