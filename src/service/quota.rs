//! Account-level quota and attribute lookups.

use serde::Deserialize;
use serde_json::json;

use super::models::{AccountAttribute, VpcLimit};
use super::VpcService;
use crate::error::ProviderError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VpcLimitsResponse {
    #[serde(default)]
    vpc_limit_set: Vec<VpcLimit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AccountAttributesResponse {
    #[serde(default)]
    account_attribute_set: Vec<AccountAttribute>,
}

impl VpcService {
    /// Quotas for `limit_types` (e.g. `appid-max-vpcs`).
    pub async fn describe_vpc_limits(&self, limit_types: &[String]) -> Result<Vec<VpcLimit>, ProviderError> {
        let response: VpcLimitsResponse = self
            .read("DescribeVpcLimits", &json!({"LimitTypes": limit_types}))
            .await?;
        Ok(response.vpc_limit_set)
    }

    pub async fn describe_account_attributes(&self) -> Result<Vec<AccountAttribute>, ProviderError> {
        let response: AccountAttributesResponse =
            self.read("DescribeAccountAttributes", &json!({})).await?;
        Ok(response.account_attribute_set)
    }
}
