use tracing::warn;

use super::{base_schema, Resource};
use crate::error::ProviderError;
use crate::helper::{join_id, split_id, ROUTE_SEP};
use crate::schema::{Attribute, Schema, Validator};
use crate::service::{RouteSpec, VpcService};
use crate::state::ResourceData;

/// Next hop types accepted by CreateRoutes.
pub const NEXT_TYPES: &[&str] = &[
    "CVM",
    "VPN",
    "DIRECTCONNECT",
    "PEERCONNECTION",
    "SSLVPN",
    "HAVIP",
    "NAT",
    "NORMAL_CVM",
    "EIP",
    "CCN",
    "LOCAL_GATEWAY",
];

pub struct RouteTableEntryResource;

fn parse_id(id: &str) -> Result<(u64, &str), ProviderError> {
    let parts = split_id(id, ROUTE_SEP, 2)?;
    let entry_id = parts[0].parse::<u64>().map_err(|_| {
        ProviderError::InvalidRequest(format!("route entry id `{}` is broken: bad entry id", id))
    })?;
    Ok((entry_id, parts[1]))
}

#[async_trait::async_trait]
impl Resource for RouteTableEntryResource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_route_table_entry"
    }

    fn schema(&self) -> Schema {
        base_schema("Provides a resource to create an entry of a routing table.")
            .with_attribute(
                "route_table_id",
                Attribute::required_string().with_force_new(),
            )
            .with_attribute(
                "destination_cidr_block",
                Attribute::required_string()
                    .with_force_new()
                    .with_validator(Validator::Cidr)
                    .with_description("Destination address block."),
            )
            .with_attribute(
                "next_type",
                Attribute::required_string()
                    .with_force_new()
                    .with_validator(Validator::allowed_strings(NEXT_TYPES.iter().copied()))
                    .with_description("Type of next-hop."),
            )
            .with_attribute(
                "next_hub",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("ID of next-hop gateway. When `next_type` is `CVM` this is the instance's private IP."),
            )
            .with_attribute(
                "description",
                Attribute::optional_string().with_force_new(),
            )
    }

    async fn create(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let route_table_id = d.require_str("route_table_id")?.to_string();
        let spec = RouteSpec {
            destination_cidr_block: d.require_str("destination_cidr_block")?.to_string(),
            gateway_type: d.require_str("next_type")?.to_string(),
            gateway_id: d.require_str("next_hub")?.to_string(),
            description: d.get_string("description").unwrap_or_default(),
        };

        let entry_id = svc.create_route(&route_table_id, &spec).await?;
        d.set_id(join_id(&[entry_id.to_string().as_str(), route_table_id.as_str()], ROUTE_SEP));
        Ok(())
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<bool, ProviderError> {
        let id = d.require_id()?.to_string();
        let (entry_id, route_table_id) = parse_id(&id)?;

        let Some(route) = svc.describe_route(route_table_id, entry_id).await? else {
            warn!(route_table_id, entry_id, "route entry not found");
            return Ok(false);
        };

        d.set("route_table_id", route_table_id);
        d.set("destination_cidr_block", route.destination_cidr_block);
        d.set("next_type", route.gateway_type);
        d.set("next_hub", route.gateway_id);
        d.set("description", route.route_description);
        Ok(true)
    }

    async fn delete(&self, svc: &VpcService, d: &ResourceData) -> Result<(), ProviderError> {
        let (entry_id, route_table_id) = parse_id(d.require_id()?)?;
        svc.delete_route(route_table_id, entry_id).await
    }
}
