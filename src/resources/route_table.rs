use tracing::warn;

use super::{base_schema, tags_attribute, update_tags, Resource};
use crate::error::ProviderError;
use crate::helper::{join_id, ROUTE_SEP};
use crate::schema::{Attribute, Schema, Validator};
use crate::service::models::tags_to_map;
use crate::service::{VpcService, TAG_SERVICE_VPC};
use crate::state::ResourceData;

pub struct RouteTableResource;

#[async_trait::async_trait]
impl Resource for RouteTableResource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_route_table"
    }

    fn schema(&self) -> Schema {
        base_schema("Provides a resource to create a VPC routing table.")
            .with_attribute(
                "vpc_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("ID of VPC to which the route table should be associated."),
            )
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_validator(Validator::string_length(1, 60))
                    .with_description("The name of routing table."),
            )
            .with_attribute("tags", tags_attribute())
            .with_attribute(
                "subnet_ids",
                Attribute::computed_string_list().with_description("ID list of the subnets associated with this route table."),
            )
            .with_attribute(
                "route_entry_ids",
                Attribute::computed_string_list().with_description("ID list of the routing entries."),
            )
            .with_attribute(
                "is_default",
                Attribute::computed_bool().with_description("Indicates whether it is the default routing table."),
            )
            .with_attribute("create_time", Attribute::computed_string())
    }

    async fn create(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let id = svc
            .create_route_table(
                d.require_str("vpc_id")?,
                d.require_str("name")?,
                &d.get_string_map("tags"),
            )
            .await?;
        d.set_id(id);
        Ok(())
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<bool, ProviderError> {
        let id = d.require_id()?.to_string();
        let Some(table) = svc.describe_route_table(&id).await? else {
            warn!(route_table_id = %id, "route table not found");
            return Ok(false);
        };

        let subnet_ids: Vec<String> = table
            .association_set
            .iter()
            .map(|a| a.subnet_id.clone())
            .collect();
        let entry_ids: Vec<String> = table
            .route_set
            .iter()
            .map(|r| join_id(&[r.route_id.to_string().as_str(), id.as_str()], ROUTE_SEP))
            .collect();

        d.set("vpc_id", table.vpc_id);
        d.set("name", table.route_table_name);
        d.set("subnet_ids", subnet_ids);
        d.set("route_entry_ids", entry_ids);
        d.set("is_default", table.main);
        d.set("create_time", table.created_time);
        d.set_string_map("tags", &tags_to_map(&table.tag_set));
        Ok(true)
    }

    async fn update(
        &self,
        svc: &VpcService,
        prior: &ResourceData,
        d: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        if d.has_change(prior, "name") {
            svc.modify_route_table(d.require_id()?, d.require_str("name")?)
                .await?;
        }
        update_tags(svc, TAG_SERVICE_VPC, "rtb", prior, d).await
    }

    async fn delete(&self, svc: &VpcService, d: &ResourceData) -> Result<(), ProviderError> {
        svc.delete_route_table(d.require_id()?).await
    }
}
