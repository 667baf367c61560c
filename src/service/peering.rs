//! VPC peering connections.

use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::models::PeerConnection;
use super::{found, Paging, VpcService};
use crate::error::ProviderError;

/// Parameters of a new peering connection.
#[derive(Debug, Clone, Default)]
pub struct PeeringSpec {
    pub source_vpc_id: String,
    pub peering_connection_name: String,
    pub destination_vpc_id: String,
    pub destination_uin: String,
    pub destination_region: String,
    pub bandwidth: Option<i64>,
    pub connection_type: Option<String>,
    pub charge_type: Option<String>,
    pub qos_level: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreatePeeringResponse {
    #[serde(default)]
    peering_connection_id: String,
}

impl VpcService {
    pub async fn create_peering_connection(&self, spec: &PeeringSpec) -> Result<String, ProviderError> {
        let mut request = json!({
            "SourceVpcId": spec.source_vpc_id,
            "PeeringConnectionName": spec.peering_connection_name,
            "DestinationVpcId": spec.destination_vpc_id,
            "DestinationUin": spec.destination_uin,
            "DestinationRegion": spec.destination_region,
        });
        if let Some(bandwidth) = spec.bandwidth {
            request["Bandwidth"] = json!(bandwidth);
        }
        if let Some(kind) = &spec.connection_type {
            request["Type"] = json!(kind);
        }
        if let Some(charge_type) = &spec.charge_type {
            request["ChargeType"] = json!(charge_type);
        }
        if let Some(qos_level) = &spec.qos_level {
            request["QosLevel"] = json!(qos_level);
        }

        let response: CreatePeeringResponse =
            self.write("CreateVpcPeeringConnection", &request).await?;
        if response.peering_connection_id.is_empty() {
            return Err(ProviderError::Sdk(
                "CreateVpcPeeringConnection returned no connection id".to_string(),
            ));
        }
        info!(peering_connection_id = %response.peering_connection_id, "created peering connection");
        Ok(response.peering_connection_id)
    }

    pub async fn describe_peering_connection(&self, id: &str) -> Result<Option<PeerConnection>, ProviderError> {
        let peers: Option<Vec<PeerConnection>> = found(
            self.describe_all(
                "DescribeVpcPeeringConnections",
                json!({"PeeringConnectionIds": [id]}),
                "PeerConnectionSet",
                Paging::Integers,
            )
            .await,
        )?;
        Ok(peers.and_then(|p| p.into_iter().find(|peer| peer.peering_connection_id == id)))
    }

    pub async fn modify_peering_connection(
        &self,
        id: &str,
        name: &str,
        bandwidth: Option<i64>,
        charge_type: Option<&str>,
    ) -> Result<(), ProviderError> {
        let mut request = json!({"PeeringConnectionId": id, "PeeringConnectionName": name});
        if let Some(bandwidth) = bandwidth {
            request["Bandwidth"] = json!(bandwidth);
        }
        if let Some(charge_type) = charge_type {
            request["ChargeType"] = json!(charge_type);
        }
        let _: IgnoredAny = self.write("ModifyVpcPeeringConnection", &request).await?;
        Ok(())
    }

    pub async fn delete_peering_connection(&self, id: &str) -> Result<(), ProviderError> {
        let _: IgnoredAny = self
            .write("DeleteVpcPeeringConnection", &json!({"PeeringConnectionId": id}))
            .await?;
        info!(peering_connection_id = %id, "deleted peering connection");
        Ok(())
    }
}
