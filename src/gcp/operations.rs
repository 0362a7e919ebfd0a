//! Long-running operation polling
//!
//! Resource Manager and Service Usage mutations return an `Operation`
//! resource that has to be polled until `done` is set.

use super::client::GcpClient;
use crate::error::{Error, Result};
use serde_json::Value;
use std::time::{Duration, Instant};

/// Default wait for folder/project creation
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(600);

/// Default wait for API enablement
pub const DEFAULT_ENABLE_TIMEOUT: Duration = Duration::from_secs(300);

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// API that owns an operation; decides where it is polled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationApi {
    ResourceManager,
    ServiceUsage,
}

impl OperationApi {
    fn url(self, client: &GcpClient, operation_name: &str) -> String {
        match self {
            Self::ResourceManager => client.resourcemanager_url(operation_name),
            Self::ServiceUsage => client.serviceusage_url(operation_name),
        }
    }
}

/// Poll `operation` until it completes.
///
/// Returns the finished operation. An `error` on the finished operation
/// becomes `Error::OperationFailed`; running past `timeout` becomes
/// `Error::Timeout`.
pub async fn wait_for_operation(
    client: &GcpClient,
    api: OperationApi,
    mut operation: Value,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Value> {
    let name = operation
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let start = Instant::now();

    loop {
        if operation.get("done").and_then(|v| v.as_bool()).unwrap_or(false) {
            return finish(&name, operation);
        }

        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "operation has no name and is not done".to_string(),
            ));
        }

        let elapsed = start.elapsed();
        if elapsed > timeout {
            tracing::warn!("Operation {} still running after {:?}", name, elapsed);
            return Err(Error::Timeout {
                operation: name,
                elapsed,
            });
        }

        tokio::time::sleep(poll_interval).await;
        tracing::debug!("Polling operation {}", name);
        operation = client.get(&api.url(client, &name)).await?;
    }
}

fn finish(name: &str, operation: Value) -> Result<Value> {
    if let Some(error) = operation.get("error") {
        return Err(Error::OperationFailed {
            operation: name.to_string(),
            code: error.get("code").and_then(|v| v.as_i64()).unwrap_or(-1),
            message: error
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error")
                .to_string(),
        });
    }
    tracing::debug!("Operation {} completed", name);
    Ok(operation)
}
