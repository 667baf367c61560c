//! NAT gateways.

use std::collections::BTreeMap;

use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::models::{map_to_tags, Filter, NatGateway};
use super::{found, Paging, VpcService};
use crate::error::ProviderError;

pub const NAT_STATE_AVAILABLE: &str = "AVAILABLE";
pub const NAT_STATE_FAILED: &str = "FAILED";

/// Parameters of a new NAT gateway.
#[derive(Debug, Clone, Default)]
pub struct NatGatewaySpec {
    pub vpc_id: String,
    pub name: String,
    pub max_concurrent: i64,
    pub bandwidth: i64,
    pub assigned_eip_set: Vec<String>,
    pub zone: Option<String>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateNatGatewayResponse {
    #[serde(default)]
    nat_gateway_set: Vec<NatGateway>,
}

impl VpcService {
    /// Create a NAT gateway and wait until it is available.
    pub async fn create_nat_gateway(&self, spec: &NatGatewaySpec) -> Result<String, ProviderError> {
        let mut request = json!({
            "VpcId": spec.vpc_id,
            "NatGatewayName": spec.name,
            "MaxConcurrentConnection": spec.max_concurrent,
            "InternetMaxBandwidthOut": spec.bandwidth,
            "PublicIpAddresses": spec.assigned_eip_set,
        });
        if let Some(zone) = &spec.zone {
            request["Zone"] = json!(zone);
        }
        if !spec.tags.is_empty() {
            request["Tags"] = json!(map_to_tags(&spec.tags));
        }

        let response: CreateNatGatewayResponse = self.write("CreateNatGateway", &request).await?;
        let id = response
            .nat_gateway_set
            .into_iter()
            .next()
            .map(|nat| nat.nat_gateway_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::Sdk("CreateNatGateway returned no gateway".to_string()))?;
        info!(nat_gateway_id = %id, "created nat gateway");

        self.wait_nat_gateway_available(&id)
            .await
            .map_err(|e| e.with_partial_state(json!({ "id": id })))?;
        Ok(id)
    }

    pub async fn wait_nat_gateway_available(&self, id: &str) -> Result<(), ProviderError> {
        let what = format!("nat gateway {} to become {}", id, NAT_STATE_AVAILABLE);
        self.wait_until(self.policy().write_timeout, &what, || async move {
            let nat = self
                .describe_nat_gateway(id)
                .await?
                .ok_or_else(|| ProviderError::NotFound(format!("nat gateway {}", id)))?;
            if nat.state == NAT_STATE_FAILED {
                return Err(ProviderError::Sdk(format!("nat gateway {} failed to create", id)));
            }
            Ok(nat.state == NAT_STATE_AVAILABLE)
        })
        .await
    }

    pub async fn describe_nat_gateway(&self, id: &str) -> Result<Option<NatGateway>, ProviderError> {
        let nats: Option<Vec<NatGateway>> = found(
            self.describe_all(
                "DescribeNatGateways",
                json!({"NatGatewayIds": [id]}),
                "NatGatewaySet",
                Paging::Integers,
            )
            .await,
        )?;
        Ok(nats.and_then(|n| n.into_iter().find(|nat| nat.nat_gateway_id == id)))
    }

    pub async fn describe_nat_gateways(&self, filters: Vec<Filter>) -> Result<Vec<NatGateway>, ProviderError> {
        let request = if filters.is_empty() { json!({}) } else { json!({"Filters": filters}) };
        self.describe_all("DescribeNatGateways", request, "NatGatewaySet", Paging::Integers)
            .await
    }

    pub async fn modify_nat_gateway(&self, id: &str, name: &str, bandwidth: i64) -> Result<(), ProviderError> {
        let request = json!({
            "NatGatewayId": id,
            "NatGatewayName": name,
            "InternetMaxBandwidthOut": bandwidth,
        });
        let _: IgnoredAny = self.write("ModifyNatGatewayAttribute", &request).await?;
        Ok(())
    }

    pub async fn reset_nat_gateway_connection(&self, id: &str, max_concurrent: i64) -> Result<(), ProviderError> {
        let request = json!({"NatGatewayId": id, "MaxConcurrentConnection": max_concurrent});
        let _: IgnoredAny = self.write("ResetNatGatewayConnection", &request).await?;
        self.wait_nat_gateway_available(id).await
    }

    pub async fn associate_nat_gateway_addresses(&self, id: &str, addresses: &[String]) -> Result<(), ProviderError> {
        if addresses.is_empty() {
            return Ok(());
        }
        let request = json!({"NatGatewayId": id, "PublicIpAddresses": addresses});
        let _: IgnoredAny = self.write("AssociateNatGatewayAddress", &request).await?;
        self.wait_nat_gateway_available(id).await
    }

    pub async fn disassociate_nat_gateway_addresses(
        &self,
        id: &str,
        addresses: &[String],
    ) -> Result<(), ProviderError> {
        if addresses.is_empty() {
            return Ok(());
        }
        let request = json!({"NatGatewayId": id, "PublicIpAddresses": addresses});
        let _: IgnoredAny = self.write("DisassociateNatGatewayAddress", &request).await?;
        self.wait_nat_gateway_available(id).await
    }

    /// Delete a NAT gateway and poll until it is gone.
    pub async fn delete_nat_gateway(&self, id: &str) -> Result<(), ProviderError> {
        let _: IgnoredAny = self
            .write("DeleteNatGateway", &json!({"NatGatewayId": id}))
            .await?;
        let what = format!("nat gateway {} to be deleted", id);
        self.wait_until(self.policy().write_timeout, &what, || async move {
            Ok(self.describe_nat_gateway(id).await?.is_none())
        })
        .await?;
        info!(nat_gateway_id = %id, "deleted nat gateway");
        Ok(())
    }
}
