//! Scripted test double for [`Dependency`].
//!
//! Available in this crate's tests and to downstream crates through the
//! `test-util` feature.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use relay_core::testing::MockDependency;
//! use relay_core::Dependency;
//!
//! let mock = Arc::new(MockDependency::new());
//! mock.expect_sync("test_input", "expected_output");
//! assert_eq!(mock.sync_call("test_input").unwrap(), "expected_output");
//! assert_eq!(mock.sync_calls(), vec!["test_input"]);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use crate::dependency::{CompletionFn, Dependency, DependencyError};

/// How [`MockDependency::async_call`] reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsyncMode {
    /// Call the completion before `async_call` returns.
    Inline,
    /// Call the completion from a freshly spawned thread.
    Threaded,
    /// Call the completion from a thread after sleeping.
    Delayed(Duration),
    /// Return `Err` without scheduling anything.
    Reject(String),
    /// Drop the completion without calling it.
    Drop,
    /// Keep the completion until [`MockDependency::release`] is called.
    Hold,
}

/// Test double recording every call it receives.
///
/// Unscripted sync calls echo their input. Async calls report
/// `(true, "async-result")` inline unless configured otherwise.
pub struct MockDependency {
    name: String,
    sync_replies: Mutex<HashMap<String, Result<String, DependencyError>>>,
    sync_failure: Mutex<Option<DependencyError>>,
    async_mode: Mutex<AsyncMode>,
    async_reply: Mutex<(bool, String)>,
    proceed: AtomicBool,
    sync_calls: Mutex<Vec<String>>,
    async_calls: Mutex<Vec<String>>,
    held: Mutex<Vec<CompletionFn>>,
}

impl Default for MockDependency {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDependency {
    /// Create a mock with default behaviour.
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            sync_replies: Mutex::new(HashMap::new()),
            sync_failure: Mutex::new(None),
            async_mode: Mutex::new(AsyncMode::Inline),
            async_reply: Mutex::new((true, "async-result".to_string())),
            proceed: AtomicBool::new(true),
            sync_calls: Mutex::new(Vec::new()),
            async_calls: Mutex::new(Vec::new()),
            held: Mutex::new(Vec::new()),
        }
    }

    /// Return `output` when called with `input`.
    pub fn expect_sync(&self, input: impl Into<String>, output: impl Into<String>) {
        lock(&self.sync_replies).insert(input.into(), Ok(output.into()));
    }

    /// Fail when called with `input`.
    pub fn fail_sync_on(&self, input: impl Into<String>, message: impl Into<String>) {
        lock(&self.sync_replies).insert(input.into(), Err(DependencyError::new(message)));
    }

    /// Fail every sync call that has no scripted reply.
    pub fn fail_sync(&self, message: impl Into<String>) {
        *lock(&self.sync_failure) = Some(DependencyError::new(message));
    }

    /// Choose how async calls report back.
    pub fn set_async_mode(&self, mode: AsyncMode) {
        *lock(&self.async_mode) = mode;
    }

    /// Choose what async calls report.
    pub fn set_async_reply(&self, success: bool, data: impl Into<String>) {
        *lock(&self.async_reply) = (success, data.into());
    }

    /// Toggle the `should_proceed` gate.
    pub fn set_should_proceed(&self, proceed: bool) {
        self.proceed.store(proceed, Ordering::SeqCst);
    }

    /// Inputs received by `sync_call`, in order.
    pub fn sync_calls(&self) -> Vec<String> {
        lock(&self.sync_calls).clone()
    }

    /// Params received by `async_call`, in order.
    pub fn async_calls(&self) -> Vec<String> {
        lock(&self.async_calls).clone()
    }

    /// Number of completions held back by [`AsyncMode::Hold`].
    pub fn held(&self) -> usize {
        lock(&self.held).len()
    }

    /// Fire every held completion with `(success, data)`. Returns how many fired.
    pub fn release(&self, success: bool, data: &str) -> usize {
        let held = std::mem::take(&mut *lock(&self.held));
        let count = held.len();
        for completion in held {
            completion(success, data.to_string());
        }
        count
    }
}

impl Dependency for MockDependency {
    fn name(&self) -> &str {
        &self.name
    }

    fn should_proceed(&self) -> bool {
        self.proceed.load(Ordering::SeqCst)
    }

    fn sync_call(&self, input: &str) -> Result<String, DependencyError> {
        lock(&self.sync_calls).push(input.to_string());

        if let Some(reply) = lock(&self.sync_replies).get(input) {
            return reply.clone();
        }
        if let Some(failure) = lock(&self.sync_failure).as_ref() {
            return Err(failure.clone());
        }
        Ok(input.to_string())
    }

    fn async_call(&self, param: &str, completion: CompletionFn) -> Result<(), DependencyError> {
        lock(&self.async_calls).push(param.to_string());

        let (success, data) = lock(&self.async_reply).clone();
        let mode = lock(&self.async_mode).clone();

        match mode {
            AsyncMode::Inline => completion(success, data),
            AsyncMode::Threaded => {
                thread::spawn(move || completion(success, data));
            }
            AsyncMode::Delayed(delay) => {
                thread::spawn(move || {
                    thread::sleep(delay);
                    completion(success, data);
                });
            }
            AsyncMode::Reject(message) => return Err(DependencyError::new(message)),
            AsyncMode::Drop => drop(completion),
            AsyncMode::Hold => lock(&self.held).push(completion),
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
