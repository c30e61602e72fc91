//! The relay component.
//!
//! A [`Relay`] forwards work to its [`Dependency`] and records what happened:
//!
//! ```text
//! invoke / invoke_async
//!   │
//!   ├─► empty or None input ──► empty result, nothing touched
//!   │
//!   ├─► should_proceed() == false ──► empty result, nothing touched
//!   │
//!   └─► dependency
//!         ├─► ok     ──► Active (Error sticks until cleanup), Invocation resource held
//!         └─► failed ──► Error, error recorded
//!
//! cleanup / drop
//!   └─► resources released, error cleared, Idle
//!       (sessions are kept; completions of older operations are absorbed)
//! ```
//!
//! Dependency failures never escape as panics or errors from [`Relay::invoke`]
//! and the async entry points; they surface through [`Relay::has_error`] or a
//! `success = false` [`AsyncOutcome`].

mod state;

pub use state::{OperationId, RelayState, Resource};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::completion::Completion;
use crate::config::RelayConfig;
use crate::dependency::{CompletionFn, Dependency, DependencyProvider};
use crate::error::{Error, Result};
use crate::session::{SessionEntry, SessionRegistry};
use state::{Lifecycle, Ticket};

const EMPTY_INPUT: &str = "empty input";
const DECLINED: &str = "dependency declined the call";
const SATURATED: &str = "too many in-flight operations";
const DROPPED: &str = "dependency dropped the completion without reporting a result";

/// Result of an async invocation as reported by the dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncOutcome {
    pub success: bool,
    pub data: String,
}

impl AsyncOutcome {
    pub fn success(data: impl Into<String>) -> Self {
        Self {
            success: true,
            data: data.into(),
        }
    }

    pub fn failure(data: impl Into<String>) -> Self {
        Self {
            success: false,
            data: data.into(),
        }
    }
}

/// Builder for a [`Relay`].
pub struct RelayBuilder {
    dependency: Arc<dyn Dependency>,
    config: RelayConfig,
    runtime: Option<Handle>,
}

impl RelayBuilder {
    /// Start building a relay around `dependency`.
    pub fn new(dependency: Arc<dyn Dependency>) -> Self {
        Self {
            dependency,
            config: RelayConfig::default(),
            runtime: None,
        }
    }

    /// Set the relay configuration.
    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Runtime used to deliver completion callbacks.
    ///
    /// Defaults to the runtime of the context `build` is called from.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Build the relay.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - No runtime was given and none is current
    pub fn build(self) -> Result<Relay> {
        self.config.validate()?;

        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| Error::NoRuntime)?,
        };

        debug!(dependency = self.dependency.name(), "Relay created");

        Ok(Relay {
            dependency: self.dependency,
            lifecycle: Arc::new(Mutex::new(Lifecycle::default())),
            sessions: SessionRegistry::new(),
            runtime,
            config: self.config,
        })
    }
}

/// Stateful component delegating work to an injected [`Dependency`].
///
/// `Relay` is `Send + Sync`; share it with `Arc` to call it from several
/// threads.
pub struct Relay {
    dependency: Arc<dyn Dependency>,
    lifecycle: Arc<Mutex<Lifecycle>>,
    sessions: SessionRegistry,
    runtime: Handle,
    config: RelayConfig,
}

impl Relay {
    /// Create a relay with default configuration, taking its dependency from `provider`.
    ///
    /// Must be called from inside a tokio runtime; use [`Relay::builder`] to
    /// pass one explicitly.
    pub fn new<P>(provider: &P) -> Result<Self>
    where
        P: DependencyProvider + ?Sized,
    {
        Self::builder(provider).build()
    }

    /// Start building a relay, taking its dependency from `provider`.
    pub fn builder<P>(provider: &P) -> RelayBuilder
    where
        P: DependencyProvider + ?Sized,
    {
        RelayBuilder::new(provider.dependency())
    }

    /// The relay configuration.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Synchronous invocation
    // ─────────────────────────────────────────────────────────────────────────

    /// Forward `input` to the dependency and return its result.
    ///
    /// Returns an empty string for `None` or empty input, when the dependency
    /// declines, and when the dependency fails (the failure is recorded and
    /// visible through [`has_error`](Self::has_error)).
    pub fn invoke<'a>(&self, input: impl Into<Option<&'a str>>) -> String {
        self.try_invoke(input).unwrap_or_default()
    }

    /// Like [`invoke`](Self::invoke) but hands the dependency failure back
    /// to the caller. State is updated the same way.
    pub fn try_invoke<'a>(&self, input: impl Into<Option<&'a str>>) -> Result<String> {
        let Some(input) = input.into().filter(|input| !input.is_empty()) else {
            debug!("Empty input, dependency not called");
            return Ok(String::new());
        };

        if !self.dependency.should_proceed() {
            debug!(dependency = self.dependency.name(), "{}", DECLINED);
            return Ok(String::new());
        }

        match self.dependency.sync_call(input) {
            Ok(output) => {
                self.lifecycle().succeed();
                Ok(output)
            }
            Err(e) => {
                warn!(
                    dependency = self.dependency.name(),
                    error = %e,
                    "Dependency call failed"
                );
                self.lifecycle().fail(e.to_string());
                Err(e.into())
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Asynchronous invocation
    // ─────────────────────────────────────────────────────────────────────────

    /// Start an async call and return a handle to its outcome.
    ///
    /// The handle is completed exactly once, possibly from another thread.
    /// Failures (empty input, a declining or failing dependency, a dropped
    /// completion routine, the in-flight limit) complete it with
    /// `success = false`.
    pub fn invoke_async<'a>(&self, param: impl Into<Option<&'a str>>) -> Completion<AsyncOutcome> {
        let completion = Completion::with_timeout(self.config.default_timeout());

        let Some(param) = param.into().filter(|param| !param.is_empty()) else {
            debug!("Empty input, dependency not called");
            completion.complete(AsyncOutcome::failure(EMPTY_INPUT));
            return completion;
        };

        if !self.dependency.should_proceed() {
            debug!(dependency = self.dependency.name(), "{}", DECLINED);
            completion.complete(AsyncOutcome::failure(DECLINED));
            return completion;
        }

        let Some(ticket) = self.lifecycle().begin(self.config.max_in_flight) else {
            warn!(
                limit = ?self.config.max_in_flight,
                "Async call refused: {}", SATURATED
            );
            completion.complete(AsyncOutcome::failure(SATURATED));
            return completion;
        };

        debug!(
            operation = %ticket.id,
            dependency = self.dependency.name(),
            "Async call started"
        );

        let operation = Arc::new(Operation {
            ticket,
            lifecycle: Arc::clone(&self.lifecycle),
            completion: completion.clone(),
            phase: Mutex::new(Phase::Scheduling),
            finished: AtomicBool::new(false),
        });

        let routine = Routine {
            operation: Arc::clone(&operation),
            fired: false,
        };
        let routine: CompletionFn = Box::new(move |success, data| routine.fire(success, data));

        let scheduled = self.dependency.async_call(param, routine);
        let orphaned = operation.scheduled();

        match scheduled {
            Err(e) => {
                warn!(
                    operation = %ticket.id,
                    error = %e,
                    "Dependency failed to schedule async call"
                );
                operation.finish(false, e.to_string());
            }
            Ok(()) if orphaned => operation.finish(false, DROPPED.to_string()),
            Ok(()) => {}
        }

        completion
    }

    /// Start an async call and deliver its outcome to `callback`.
    ///
    /// `callback` runs exactly once, on the relay's runtime blocking pool, and
    /// never before this method returns, even when the dependency completes
    /// inline. If the runtime has shut down by the time the outcome arrives,
    /// delivery moves to a dedicated thread.
    pub fn invoke_async_with<'a, F>(&self, param: impl Into<Option<&'a str>>, callback: F)
    where
        F: FnOnce(bool, String) + Send + 'static,
    {
        let (returned, gate) = oneshot::channel();
        let runtime = self.runtime.clone();

        self.invoke_async(param).subscribe(move |outcome| {
            let delivery = Delivery {
                gate: Some(gate),
                pending: Some((callback, outcome)),
            };
            runtime.spawn_blocking(move || delivery.run());
        });

        // Must stay the last statement: it releases the delivery.
        let _ = returned.send(());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Introspection
    // ─────────────────────────────────────────────────────────────────────────

    /// Current lifecycle state. Pure read.
    pub fn state(&self) -> RelayState {
        self.lifecycle().state()
    }

    /// Whether a dependency failure occurred since construction or the last cleanup.
    pub fn has_error(&self) -> bool {
        self.lifecycle().has_error()
    }

    /// Message of the most recent dependency failure.
    pub fn last_error(&self) -> Option<String> {
        self.lifecycle().last_error().map(String::from)
    }

    /// Whether any resource is held.
    pub fn has_active_resources(&self) -> bool {
        self.lifecycle().has_resources()
    }

    /// Resources currently held, in a stable order.
    pub fn active_resources(&self) -> Vec<Resource> {
        self.lifecycle().resources()
    }

    /// Number of async operations still waiting on their completion.
    pub fn in_flight(&self) -> usize {
        self.lifecycle().in_flight()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a session with an empty value.
    ///
    /// Fails with [`Error::SessionExists`] if `id` is already registered; the
    /// existing value is left untouched.
    pub fn add_session(&self, id: &str) -> Result<()> {
        self.sessions.add(id)
    }

    /// Overwrite a session's value. Fails with [`Error::SessionNotFound`] if absent.
    pub fn update_session(&self, id: &str, value: impl Into<String>) -> Result<()> {
        self.sessions.update(id, value)
    }

    /// Current value of a session. Fails with [`Error::SessionNotFound`] if absent.
    pub fn session_value(&self, id: &str) -> Result<String> {
        self.sessions.value(id)
    }

    /// Full entry of a session, including timestamps.
    pub fn session(&self, id: &str) -> Result<SessionEntry> {
        self.sessions.get(id)
    }

    /// Remove a session and return its last entry.
    pub fn remove_session(&self, id: &str) -> Result<SessionEntry> {
        self.sessions.remove(id)
    }

    /// Registered session identifiers, sorted.
    pub fn session_ids(&self) -> Result<Vec<String>> {
        self.sessions.ids()
    }

    /// Number of registered sessions.
    pub fn session_count(&self) -> Result<usize> {
        self.sessions.len()
    }

    /// Remove every session. Returns how many were removed.
    pub fn clear_sessions(&self) -> Result<usize> {
        self.sessions.clear()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Cleanup
    // ─────────────────────────────────────────────────────────────────────────

    /// Release every resource, clear the error flag and return to [`RelayState::Idle`].
    ///
    /// Idempotent. Sessions are kept. Async operations started before the
    /// cleanup still complete their handles and callbacks but no longer
    /// affect the relay's state.
    pub fn cleanup(&self) {
        let released = self.lifecycle().reset();
        if released > 0 {
            info!(released, "Relay resources released");
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        lock_lifecycle(&self.lifecycle)
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        let released = self.lifecycle().reset();
        if released > 0 {
            debug!(released, "Relay dropped with active resources, released");
        }
    }
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lifecycle = self.lifecycle();
        f.debug_struct("Relay")
            .field("dependency", &self.dependency.name())
            .field("state", &lifecycle.state())
            .field("resources", &lifecycle.resources())
            .field("config", &self.config)
            .finish()
    }
}

// Lifecycle methods never panic while holding the lock, so a poisoned guard
// still protects consistent data.
fn lock_lifecycle(lifecycle: &Mutex<Lifecycle>) -> MutexGuard<'_, Lifecycle> {
    lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─────────────────────────────────────────────────────────────────────────────
// In-flight operations
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// `async_call` has not returned yet.
    Scheduling,
    /// `async_call` returned.
    Scheduled,
    /// The routine was dropped unfired while `async_call` was still running.
    Orphaned,
}

struct Operation {
    ticket: Ticket,
    lifecycle: Arc<Mutex<Lifecycle>>,
    completion: Completion<AsyncOutcome>,
    phase: Mutex<Phase>,
    finished: AtomicBool,
}

impl Operation {
    /// Settle the relay state, then publish the outcome. First call wins.
    fn finish(&self, success: bool, data: String) {
        if self.finished.swap(true, Ordering::AcqRel) {
            debug!(operation = %self.ticket.id, "Duplicate completion absorbed");
            return;
        }

        lock_lifecycle(&self.lifecycle).settle(self.ticket, success, &data);
        if success {
            debug!(operation = %self.ticket.id, "Async call completed");
        } else {
            warn!(operation = %self.ticket.id, error = %data, "Async call failed");
        }

        self.completion.complete(AsyncOutcome { success, data });
    }

    /// Mark `async_call` as returned. Returns whether the routine was dropped unfired meanwhile.
    fn scheduled(&self) -> bool {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        let orphaned = *phase == Phase::Orphaned;
        *phase = Phase::Scheduled;
        orphaned
    }

    fn orphan(&self) {
        {
            let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
            if *phase == Phase::Scheduling {
                // `invoke_async` reports this once `async_call` returns.
                *phase = Phase::Orphaned;
                return;
            }
        }
        self.finish(false, DROPPED.to_string());
    }
}

/// Completion routine handed to the dependency. Reports a failure if dropped unfired.
struct Routine {
    operation: Arc<Operation>,
    fired: bool,
}

impl Routine {
    fn fire(mut self, success: bool, data: String) {
        self.fired = true;
        self.operation.finish(success, data);
    }
}

impl Drop for Routine {
    fn drop(&mut self) {
        if !self.fired {
            self.operation.orphan();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Callback delivery
// ─────────────────────────────────────────────────────────────────────────────

/// Pending callback invocation. Waits for `invoke_async_with` to return before
/// running; if dropped unrun (runtime shut down) it finishes on its own thread.
struct Delivery<F>
where
    F: FnOnce(bool, String) + Send + 'static,
{
    gate: Option<oneshot::Receiver<()>>,
    pending: Option<(F, AsyncOutcome)>,
}

impl<F> Delivery<F>
where
    F: FnOnce(bool, String) + Send + 'static,
{
    fn run(mut self) {
        self.deliver();
    }

    fn deliver(&mut self) {
        if let Some(gate) = self.gate.take() {
            // A closed channel means the caller already unwound; deliver anyway.
            let _ = gate.blocking_recv();
        }
        if let Some((callback, outcome)) = self.pending.take() {
            callback(outcome.success, outcome.data);
        }
    }
}

impl<F> Drop for Delivery<F>
where
    F: FnOnce(bool, String) + Send + 'static,
{
    fn drop(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        let gate = self.gate.take();
        let fallback = Arc::new(Mutex::new(Some(pending)));
        let detached = Arc::clone(&fallback);

        let spawned = thread::Builder::new()
            .name("relay-callback".to_string())
            .spawn(move || {
                if let Some(gate) = gate {
                    let _ = gate.blocking_recv();
                }
                if let Some((callback, outcome)) = take_pending(&detached) {
                    callback(outcome.success, outcome.data);
                }
            });

        if let Err(e) = spawned {
            warn!(error = %e, "No thread for callback delivery, running it in place");
            if let Some((callback, outcome)) = take_pending(&fallback) {
                callback(outcome.success, outcome.data);
            }
        }
    }
}

fn take_pending<P>(slot: &Mutex<Option<P>>) -> Option<P> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}
