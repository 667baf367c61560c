use tracing::warn;

use super::{base_schema, Resource};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema, Validator};
use crate::service::{PeeringSpec, VpcService};
use crate::state::ResourceData;

pub struct VpcPeerConnectManagerResource;

#[async_trait::async_trait]
impl Resource for VpcPeerConnectManagerResource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_vpc_peer_connect_manager"
    }

    fn schema(&self) -> Schema {
        base_schema("Provides a resource to create a VPC peering connection.")
            .with_attribute(
                "source_vpc_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("The unique ID of the local VPC."),
            )
            .with_attribute(
                "peering_connection_name",
                Attribute::required_string()
                    .with_validator(Validator::string_length(1, 60))
                    .with_description("Peer connection name."),
            )
            .with_attribute(
                "destination_vpc_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("The unique ID of the peer VPC."),
            )
            .with_attribute(
                "destination_uin",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Peer user UIN."),
            )
            .with_attribute(
                "destination_region",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Peer region."),
            )
            .with_attribute(
                "bandwidth",
                Attribute::optional_computed_int64()
                    .with_description("Bandwidth upper limit, unit Mbps."),
            )
            .with_attribute(
                "type",
                Attribute::optional_computed_string()
                    .with_force_new()
                    .with_validator(Validator::allowed_strings(["VPCX", "CCN"]))
                    .with_description("Interworking type, `VPCX` for VPCX interworking and `CCN` for CCN interworking."),
            )
            .with_attribute(
                "charge_type",
                Attribute::optional_computed_string()
                    .with_description("Billing mode, daily peak value `POSTPAID_BY_DAY_MAX`, monthly 95 `POSTPAID_BY_MONTH_95`."),
            )
            .with_attribute(
                "qos_level",
                Attribute::optional_computed_string()
                    .with_force_new()
                    .with_validator(Validator::allowed_strings(["PT", "AU", "AG"]))
                    .with_description("Service level, `PT` gold, `AU` silver, `AG` bronze."),
            )
            .with_attribute("state", Attribute::computed_string())
            .with_attribute("create_time", Attribute::computed_string())
    }

    async fn create(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let spec = PeeringSpec {
            source_vpc_id: d.require_str("source_vpc_id")?.to_string(),
            peering_connection_name: d.require_str("peering_connection_name")?.to_string(),
            destination_vpc_id: d.require_str("destination_vpc_id")?.to_string(),
            destination_uin: d.require_str("destination_uin")?.to_string(),
            destination_region: d.require_str("destination_region")?.to_string(),
            bandwidth: d.get_i64("bandwidth"),
            connection_type: d.get_string("type"),
            charge_type: d.get_string("charge_type"),
            qos_level: d.get_string("qos_level"),
        };

        let id = svc.create_peering_connection(&spec).await?;
        d.set_id(id);
        Ok(())
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<bool, ProviderError> {
        let id = d.require_id()?.to_string();
        let Some(peer) = svc.describe_peering_connection(&id).await? else {
            warn!(peering_connection_id = %id, "peering connection not found");
            return Ok(false);
        };

        d.set("source_vpc_id", peer.source_vpc_id);
        d.set("peering_connection_name", peer.peering_connection_name);
        d.set("destination_vpc_id", peer.peer_vpc_id);
        d.set("destination_region", peer.destination_region);
        if !peer.destination_uin.is_empty() {
            d.set("destination_uin", peer.destination_uin);
        }
        d.set("bandwidth", peer.bandwidth);
        d.set("type", peer.connection_type);
        d.set("charge_type", peer.charge_type);
        d.set("qos_level", peer.qos_level);
        d.set("state", peer.state);
        d.set("create_time", peer.create_time);
        Ok(true)
    }

    async fn update(
        &self,
        svc: &VpcService,
        prior: &ResourceData,
        d: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        if d.has_changes(prior, &["peering_connection_name", "bandwidth", "charge_type"]) {
            let bandwidth = d.has_change(prior, "bandwidth").then(|| d.get_i64("bandwidth")).flatten();
            let charge_type = d
                .has_change(prior, "charge_type")
                .then(|| d.get_str("charge_type"))
                .flatten();
            svc.modify_peering_connection(
                d.require_id()?,
                d.require_str("peering_connection_name")?,
                bandwidth,
                charge_type,
            )
            .await?;
        }
        Ok(())
    }

    async fn delete(&self, svc: &VpcService, d: &ResourceData) -> Result<(), ProviderError> {
        svc.delete_peering_connection(d.require_id()?).await
    }
}
