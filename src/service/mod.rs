//! Typed wrappers over the VPC and tag APIs.
//!
//! Every call runs inside [`retry`](crate::retry::retry) with the read or
//! write timeout of the service's [`RetryPolicy`].

pub mod models;

mod eip;
mod eni;
mod nat;
mod network;
mod peering;
mod quota;
mod security_group;
mod snapshot;
mod tag;
mod template;

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

pub use eip::{EipSpec, EipTarget, EIP_STATUS_BIND, EIP_STATUS_BIND_ENI, EIP_STATUS_UNBIND};
pub use eni::{EniSpec, ENI_STATE_AVAILABLE};
pub use models::HasId;
pub use nat::{NatGatewaySpec, NAT_STATE_AVAILABLE};
pub use network::RouteSpec;
pub use peering::PeeringSpec;
pub use security_group::{
    build_security_group_rule_id, parse_lite_rule, parse_security_group_rule_id, LiteRule,
    RuleDirection, SecurityGroupRuleInfo,
};
pub use snapshot::SnapshotPolicySpec;
pub use tag::{TagService, TAG_SERVICE_CVM, TAG_SERVICE_VPC};

use crate::client::{Product, TencentCloudClient};
use crate::error::ProviderError;
use crate::retry::{retry, retry_error, RetryError, RetryPolicy};

/// Page size used for every list call.
pub const PAGE_LIMIT: u64 = 100;

/// How a Describe action encodes `Offset` and `Limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paging {
    /// `"Offset": "0"`
    Strings,
    /// `"Offset": 0`
    Integers,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Page {
    #[serde(default)]
    total_count: Option<u64>,
}

/// VPC API handle shared by every handler of a configured provider.
#[derive(Debug, Clone)]
pub struct VpcService {
    client: TencentCloudClient,
    policy: RetryPolicy,
}

impl VpcService {
    pub fn new(client: TencentCloudClient, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn region(&self) -> &str {
        self.client.region()
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn client(&self) -> &TencentCloudClient {
        &self.client
    }

    /// Tag API handle using the same client and retry policy.
    pub fn tags(&self) -> TagService<'_> {
        TagService::new(&self.client, self.policy)
    }

    async fn call<Resp: DeserializeOwned>(
        &self,
        action: &str,
        request: &Value,
        timeout: Duration,
        extra_codes: &[&str],
    ) -> Result<Resp, ProviderError> {
        retry(timeout, self.policy.interval, || async move {
            self.client
                .call(Product::Vpc, action, request)
                .await
                .map_err(|e| retry_error(e, extra_codes))
        })
        .await
    }

    /// Read-only call retried within the read timeout.
    pub(crate) async fn read<Resp: DeserializeOwned>(
        &self,
        action: &str,
        request: &Value,
    ) -> Result<Resp, ProviderError> {
        self.call(action, request, self.policy.read_timeout, &[]).await
    }

    /// Mutating call retried within the write timeout.
    pub(crate) async fn write<Resp: DeserializeOwned>(
        &self,
        action: &str,
        request: &Value,
    ) -> Result<Resp, ProviderError> {
        self.call(action, request, self.policy.write_timeout, &[]).await
    }

    /// Mutating call that also retries on `extra_codes`.
    pub(crate) async fn write_retrying<Resp: DeserializeOwned>(
        &self,
        action: &str,
        request: &Value,
        extra_codes: &[&str],
    ) -> Result<Resp, ProviderError> {
        self.call(action, request, self.policy.write_timeout, extra_codes).await
    }

    /// Page through a Describe action until `TotalCount` items or an empty page.
    #[instrument(skip(self, request), level = "debug")]
    pub(crate) async fn describe_all<T>(
        &self,
        action: &str,
        request: Value,
        list_key: &str,
        paging: Paging,
    ) -> Result<Vec<T>, ProviderError>
    where
        T: DeserializeOwned + HasId,
    {
        let mut request = match request {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        let mut items: Vec<T> = Vec::new();
        let mut seen = HashSet::new();
        let mut offset: u64 = 0;

        loop {
            let (off, lim) = match paging {
                Paging::Strings => (json!(offset.to_string()), json!(PAGE_LIMIT.to_string())),
                Paging::Integers => (json!(offset), json!(PAGE_LIMIT)),
            };
            request.insert("Offset".to_string(), off);
            request.insert("Limit".to_string(), lim);

            let response: Value = self.read(action, &Value::Object(request.clone())).await?;
            let page: Page = serde_json::from_value(response.clone())?;
            let batch: Vec<T> = match response.get(list_key) {
                Some(list) if !list.is_null() => serde_json::from_value(list.clone())?,
                _ => Vec::new(),
            };

            if batch.is_empty() {
                break;
            }

            let fetched = batch.len() as u64;
            for item in batch {
                if !seen.insert(item.id().to_string()) {
                    return Err(ProviderError::Sdk(format!(
                        "{} returned duplicate id {}",
                        action,
                        item.id()
                    )));
                }
                items.push(item);
            }

            offset += fetched;
            let total = page.total_count.unwrap_or(0);
            if offset >= total || fetched < PAGE_LIMIT {
                break;
            }
        }

        debug!(action, count = items.len(), "describe completed");
        Ok(items)
    }

    /// Poll `check` until it reports `true`, within `timeout`.
    pub(crate) async fn wait_until<F, Fut>(
        &self,
        timeout: Duration,
        what: &str,
        mut check: F,
    ) -> Result<(), ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, ProviderError>>,
    {
        retry(timeout, self.policy.interval, || {
            let fut = check();
            async move {
                match fut.await {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(RetryError::transient(ProviderError::Unavailable(
                        format!("still waiting for {}", what),
                    ))),
                    Err(err) => Err(RetryError::Permanent(err)),
                }
            }
        })
        .await
    }
}

/// Turn a not-found error into `None`.
pub(crate) fn found<T>(result: Result<T, ProviderError>) -> Result<Option<T>, ProviderError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

/// Append `name = value` to a filter list when `value` is non-empty.
pub(crate) fn push_filter(filters: &mut Vec<models::Filter>, name: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        filters.push(models::Filter::new(name, value));
    }
}

/// Append one `tag:<key>` filter per tag.
pub(crate) fn push_tag_filters(
    filters: &mut Vec<models::Filter>,
    tags: &std::collections::BTreeMap<String, String>,
) {
    for (key, value) in tags {
        filters.push(models::Filter::new(format!("tag:{}", key), value.clone()));
    }
}
