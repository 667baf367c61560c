//! Tag API (2018-08-13), used to update tags of existing resources.

use std::collections::BTreeMap;

use serde::de::IgnoredAny;
use serde_json::json;
use tracing::debug;

use crate::client::{Product, TencentCloudClient};
use crate::error::ProviderError;
use crate::helper::{build_tag_resource_name, diff_tags};
use crate::retry::{retry, retry_error, RetryPolicy};

/// Service name used in tag resource names.
pub const TAG_SERVICE_VPC: &str = "vpc";
/// Service name used in tag resource names for EIPs.
pub const TAG_SERVICE_CVM: &str = "cvm";

#[derive(Debug, Clone, Copy)]
pub struct TagService<'a> {
    client: &'a TencentCloudClient,
    policy: RetryPolicy,
}

impl<'a> TagService<'a> {
    pub fn new(client: &'a TencentCloudClient, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Replace and delete tags on one resource.
    pub async fn modify_tags(
        &self,
        resource_name: &str,
        replace: &BTreeMap<String, String>,
        delete: &[String],
    ) -> Result<(), ProviderError> {
        if replace.is_empty() && delete.is_empty() {
            return Ok(());
        }

        let mut request = json!({"Resource": resource_name});
        if !replace.is_empty() {
            let tags: Vec<_> = replace
                .iter()
                .map(|(k, v)| json!({"TagKey": k, "TagValue": v}))
                .collect();
            request["ReplaceTags"] = json!(tags);
        }
        if !delete.is_empty() {
            let keys: Vec<_> = delete.iter().map(|k| json!({"TagKey": k})).collect();
            request["DeleteTags"] = json!(keys);
        }
        debug!(resource = resource_name, replace = replace.len(), delete = delete.len(), "modifying tags");

        let request = &request;
        let client = self.client;
        let _: IgnoredAny = retry(self.policy.write_timeout, self.policy.interval, || async move {
            client
                .call(Product::Tag, "ModifyResourceTags", request)
                .await
                .map_err(|e| retry_error(e, &[]))
        })
        .await?;
        Ok(())
    }

    /// Move a resource's tags from `old` to `new`.
    pub async fn update_tags(
        &self,
        service: &str,
        resource_type: &str,
        id: &str,
        old: &BTreeMap<String, String>,
        new: &BTreeMap<String, String>,
    ) -> Result<(), ProviderError> {
        let (replace, delete) = diff_tags(old, new);
        let name = build_tag_resource_name(service, resource_type, self.client.region(), id);
        self.modify_tags(&name, &replace, &delete).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support;
    use wiremock::matchers::{body_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_update_tags_sends_diff() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-tc-action", "ModifyResourceTags"))
            .and(header("x-tc-version", "2018-08-13"))
            .and(body_json(json!({
                "Resource": "qcs::vpc:ap-guangzhou:uin/:vpc/vpc-1",
                "ReplaceTags": [{"TagKey": "env", "TagValue": "prod"}],
                "DeleteTags": [{"TagKey": "owner"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Response": {"RequestId": "r"}})))
            .expect(1)
            .mount(&server)
            .await;

        let svc = test_support::service(&server);
        let old: BTreeMap<_, _> = [("env", "dev"), ("owner", "ops"), ("team", "net")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let new: BTreeMap<_, _> = [("env", "prod"), ("team", "net")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        svc.tags()
            .update_tags(TAG_SERVICE_VPC, "vpc", "vpc-1", &old, &new)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_no_diff_makes_no_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let svc = test_support::service(&server);
        let tags = BTreeMap::new();
        svc.tags()
            .update_tags(TAG_SERVICE_VPC, "subnet", "subnet-1", &tags, &tags)
            .await
            .unwrap();
    }
}
