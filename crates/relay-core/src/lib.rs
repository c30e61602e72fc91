//! relay-core - Core library for Relay
//!
//! A [`Relay`] forwards work to an injected [`Dependency`] and keeps track of
//! what that work did to it:
//!
//! - **relay**: the component itself (lifecycle state, resources, sync/async invocation)
//! - **completion**: single-assignment result slot with wait and subscribe
//! - **session**: identifier-keyed session registry
//! - **dependency**: the capability the relay calls into, plus adapters
//! - **config**: tunables (default wait timeout, in-flight limit)
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use relay_core::{Relay, RelayState};
//! # use relay_core::{CompletionFn, Dependency, DependencyError};
//! # struct Upper;
//! # impl Dependency for Upper {
//! #     fn sync_call(&self, input: &str) -> Result<String, DependencyError> {
//! #         Ok(input.to_uppercase())
//! #     }
//! #     fn async_call(&self, param: &str, completion: CompletionFn) -> Result<(), DependencyError> {
//! #         completion(true, param.to_uppercase());
//! #         Ok(())
//! #     }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> relay_core::Result<()> {
//!     let relay = Relay::new(&Arc::new(Upper))?;
//!
//!     assert_eq!(relay.invoke("hello"), "HELLO");
//!     assert_eq!(relay.state(), RelayState::Active);
//!
//!     let outcome = relay.invoke_async("world").wait_async(relay.config().default_timeout()).await;
//!     assert!(outcome.is_ready());
//!
//!     relay.cleanup();
//!     assert!(!relay.has_active_resources());
//!     Ok(())
//! }
//! ```

pub mod completion;
pub mod config;
pub mod dependency;
pub mod error;
pub mod relay;
pub mod session;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// Re-export commonly used types
pub use completion::{Completion, WaitStatus};
pub use config::{ConfigValidationError, RelayConfig};
pub use dependency::{
    AsyncDependency, CompletionFn, Dependency, DependencyError, DependencyProvider, FnProvider,
    Spawned,
};
pub use error::{Error, Result};
pub use relay::{AsyncOutcome, OperationId, Relay, RelayBuilder, RelayState, Resource};
pub use session::{SessionEntry, SessionRegistry};
