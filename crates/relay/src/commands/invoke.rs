//! `invoke` and `invoke-async` commands.

use anyhow::{bail, Result};
use relay_core::{AsyncOutcome, Relay, RelayState, WaitStatus};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::info;

use super::build_relay;
use crate::config::Config;
use crate::error::{CliError, CliResult};

/// Result of a synchronous invocation.
#[derive(Debug, Serialize)]
pub struct InvokeReport {
    pub output: String,
    pub success: bool,
    pub state: RelayState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of an asynchronous invocation.
#[derive(Debug, Serialize)]
pub struct AsyncReport {
    pub success: bool,
    pub data: String,
    pub state: RelayState,
    pub in_flight: usize,
}

/// Invoke synchronously and capture what the relay reports afterwards.
pub fn run(relay: &Relay, input: Option<&str>) -> InvokeReport {
    let output = relay.invoke(input);
    let success = !relay.has_error();

    InvokeReport {
        output,
        success,
        state: relay.state(),
        error: if success { None } else { relay.last_error() },
    }
}

/// Invoke asynchronously and wait up to `timeout` for the outcome.
///
/// With `callback` the outcome is delivered through
/// [`Relay::invoke_async_with`]; otherwise the completion handle is awaited.
pub async fn run_async(
    relay: &Relay,
    param: Option<&str>,
    timeout: Duration,
    callback: bool,
) -> CliResult<AsyncOutcome> {
    let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);

    if callback {
        let (tx, rx) = oneshot::channel();
        relay.invoke_async_with(param, move |success, data| {
            let _ = tx.send(AsyncOutcome { success, data });
        });

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => Ok(outcome),
            _ => Err(CliError::Timeout { timeout_ms }),
        }
    } else {
        match relay.invoke_async(param).wait_async(timeout).await {
            WaitStatus::Ready(outcome) => Ok(outcome),
            WaitStatus::Timeout => Err(CliError::Timeout { timeout_ms }),
        }
    }
}

pub async fn execute(input: Option<&str>, json: bool, config: &Config) -> Result<()> {
    let relay = build_relay(config)?;
    let report = run(&relay, input);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if !report.success {
        bail!(
            "invoke failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        );
    }

    println!("{}", report.output);
    Ok(())
}

pub async fn execute_async(
    param: Option<&str>,
    timeout_ms: Option<u64>,
    callback: bool,
    json: bool,
    config: &Config,
) -> Result<()> {
    let relay = build_relay(config)?;
    let timeout = timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.relay.default_timeout());

    let outcome = run_async(&relay, param, timeout, callback).await?;
    info!(success = outcome.success, state = %relay.state(), "async invocation finished");

    let report = AsyncReport {
        success: outcome.success,
        data: outcome.data,
        state: relay.state(),
        in_flight: relay.in_flight(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.success {
        println!("{}", report.data);
        Ok(())
    } else {
        bail!("async invoke failed: {}", report.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::testing::{AsyncMode, MockDependency};
    use std::sync::Arc;
    use tokio_test::assert_ok;

    fn relay_with(mock: &Arc<MockDependency>) -> Relay {
        Relay::new(mock).unwrap()
    }

    #[tokio::test]
    async fn test_run_reports_output() {
        let mock = Arc::new(MockDependency::new());
        mock.expect_sync("ping", "pong");
        let relay = relay_with(&mock);

        let report = run(&relay, Some("ping"));
        assert_eq!(report.output, "pong");
        assert!(report.success);
        assert_eq!(report.state, RelayState::Active);
        assert!(report.error.is_none());
    }

    #[tokio::test]
    async fn test_run_reports_failure() {
        let mock = Arc::new(MockDependency::new());
        mock.fail_sync("backend down");
        let relay = relay_with(&mock);

        let report = run(&relay, Some("ping"));
        assert_eq!(report.output, "");
        assert!(!report.success);
        assert_eq!(report.state, RelayState::Error);
        assert!(report.error.is_some());
    }

    #[tokio::test]
    async fn test_run_without_input_skips_dependency() {
        let mock = Arc::new(MockDependency::new());
        let relay = relay_with(&mock);

        let report = run(&relay, None);
        assert_eq!(report.output, "");
        assert_eq!(report.state, RelayState::Idle);
        assert!(mock.sync_calls().is_empty());
    }

    #[tokio::test]
    async fn test_report_json_shape() {
        let mock = Arc::new(MockDependency::new());
        let relay = relay_with(&mock);

        let value = serde_json::to_value(run(&relay, Some("x"))).unwrap();
        assert_eq!(value["output"], "x");
        assert_eq!(value["state"], "active");
        assert!(value.get("error").is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_async_future_mode() {
        let mock = Arc::new(MockDependency::new());
        mock.set_async_mode(AsyncMode::Threaded);
        mock.set_async_reply(true, "done");
        let relay = relay_with(&mock);

        let outcome = assert_ok!(run_async(&relay, Some("p"), Duration::from_secs(5), false).await);
        assert_eq!(outcome, AsyncOutcome::success("done"));
        assert_eq!(relay.state(), RelayState::Active);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_async_callback_mode() {
        let mock = Arc::new(MockDependency::new());
        mock.set_async_reply(false, "nope");
        let relay = relay_with(&mock);

        let outcome = assert_ok!(run_async(&relay, Some("p"), Duration::from_secs(5), true).await);
        assert_eq!(outcome, AsyncOutcome::failure("nope"));
        assert_eq!(relay.state(), RelayState::Error);
    }

    #[tokio::test]
    async fn test_run_async_times_out() {
        let mock = Arc::new(MockDependency::new());
        mock.set_async_mode(AsyncMode::Hold);
        let relay = relay_with(&mock);

        let err = run_async(&relay, Some("p"), Duration::from_millis(20), false)
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Timeout { timeout_ms: 20 }));
        assert_eq!(relay.in_flight(), 1);
    }
}
