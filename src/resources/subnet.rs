use serde_json::json;
use tracing::warn;

use super::{base_schema, tags_attribute, update_tags, Resource};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema, Validator};
use crate::service::models::tags_to_map;
use crate::service::{VpcService, TAG_SERVICE_VPC};
use crate::state::ResourceData;

pub struct SubnetResource;

/// Make sure `route_table_id` belongs to `vpc_id` before associating it.
async fn check_route_table(svc: &VpcService, route_table_id: &str, vpc_id: &str) -> Result<(), ProviderError> {
    match svc.describe_route_table(route_table_id).await? {
        Some(table) if table.vpc_id == vpc_id => Ok(()),
        Some(table) => Err(ProviderError::Validation(format!(
            "route table {} belongs to vpc {}, not {}",
            route_table_id, table.vpc_id, vpc_id
        ))),
        None => Err(ProviderError::NotFound(format!("route table {}", route_table_id))),
    }
}

#[async_trait::async_trait]
impl Resource for SubnetResource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_subnet"
    }

    fn schema(&self) -> Schema {
        base_schema("Provides a resource to create a VPC subnet.")
            .with_attribute(
                "vpc_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("ID of the VPC to be associated."),
            )
            .with_attribute(
                "availability_zone",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("The availability zone within which the subnet should be created."),
            )
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_validator(Validator::string_length(1, 60))
                    .with_description("The name of subnet to be created."),
            )
            .with_attribute(
                "cidr_block",
                Attribute::required_string()
                    .with_force_new()
                    .with_validator(Validator::Cidr)
                    .with_description("A network address block of the subnet."),
            )
            .with_attribute(
                "is_multicast",
                Attribute::optional_bool()
                    .with_default(json!(true))
                    .with_description("Specify the subnet is multicast when true."),
            )
            .with_attribute(
                "route_table_id",
                Attribute::optional_computed_string()
                    .with_description("ID of a routing table to which the subnet should be associated."),
            )
            .with_attribute("tags", tags_attribute())
            .with_attribute("is_default", Attribute::computed_bool())
            .with_attribute(
                "available_ip_count",
                Attribute::computed_int64().with_description("The number of available IPs."),
            )
            .with_attribute("create_time", Attribute::computed_string())
    }

    async fn create(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let vpc_id = d.require_str("vpc_id")?.to_string();
        let name = d.require_str("name")?.to_string();
        let route_table_id = d.get_string("route_table_id");
        if let Some(route_table_id) = &route_table_id {
            check_route_table(svc, route_table_id, &vpc_id).await?;
        }

        let id = svc
            .create_subnet(
                &vpc_id,
                &name,
                d.require_str("cidr_block")?,
                d.require_str("availability_zone")?,
                &d.get_string_map("tags"),
            )
            .await?;
        d.set_id(id.clone());

        // new subnets start with multicast disabled
        if d.get_bool("is_multicast").unwrap_or(true) {
            svc.modify_subnet(&id, &name, true).await?;
        }
        if let Some(route_table_id) = route_table_id {
            svc.replace_route_table_association(&id, &route_table_id).await?;
        }
        Ok(())
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<bool, ProviderError> {
        let id = d.require_id()?.to_string();
        let Some(subnet) = svc.describe_subnet(&id).await? else {
            warn!(subnet_id = %id, "subnet not found");
            return Ok(false);
        };

        d.set("vpc_id", subnet.vpc_id);
        d.set("availability_zone", subnet.zone);
        d.set("name", subnet.subnet_name);
        d.set("cidr_block", subnet.cidr_block);
        d.set("is_multicast", subnet.enable_broadcast);
        d.set("route_table_id", subnet.route_table_id);
        d.set("is_default", subnet.is_default);
        d.set("available_ip_count", subnet.available_ip_address_count);
        d.set("create_time", subnet.created_time);
        d.set_string_map("tags", &tags_to_map(&subnet.tag_set));
        Ok(true)
    }

    async fn update(
        &self,
        svc: &VpcService,
        prior: &ResourceData,
        d: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        let id = d.require_id()?.to_string();

        if d.has_changes(prior, &["name", "is_multicast"]) {
            svc.modify_subnet(
                &id,
                d.require_str("name")?,
                d.get_bool("is_multicast").unwrap_or(true),
            )
            .await?;
        }

        if d.has_change(prior, "route_table_id") {
            if let Some(route_table_id) = d.get_str("route_table_id") {
                check_route_table(svc, route_table_id, d.require_str("vpc_id")?).await?;
                svc.replace_route_table_association(&id, route_table_id).await?;
            }
        }

        update_tags(svc, TAG_SERVICE_VPC, "subnet", prior, d).await
    }

    async fn delete(&self, svc: &VpcService, d: &ResourceData) -> Result<(), ProviderError> {
        svc.delete_subnet(d.require_id()?).await
    }
}
