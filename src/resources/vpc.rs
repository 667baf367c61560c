use serde_json::json;
use tracing::{info, warn};

use super::{base_schema, tags_attribute, update_tags, Resource};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema, Validator};
use crate::service::models::tags_to_map;
use crate::service::{VpcService, TAG_SERVICE_VPC};
use crate::state::ResourceData;

pub struct VpcResource;

#[async_trait::async_trait]
impl Resource for VpcResource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_vpc"
    }

    fn schema(&self) -> Schema {
        base_schema("Provides a VPC resource.")
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_validator(Validator::string_length(1, 60))
                    .with_description("The name of the VPC."),
            )
            .with_attribute(
                "cidr_block",
                Attribute::required_string()
                    .with_force_new()
                    .with_validator(Validator::Cidr)
                    .with_description("A network address block which should be a subnet of the three internal network segments (10.0.0.0/16, 172.16.0.0/12 and 192.168.0.0/16)."),
            )
            .with_attribute(
                "dns_servers",
                Attribute::new(
                    AttributeType::set(AttributeType::String),
                    AttributeFlags::optional_computed(),
                )
                .with_validator(Validator::Ip)
                .with_description("The DNS server list of the VPC."),
            )
            .with_attribute(
                "is_multicast",
                Attribute::optional_bool()
                    .with_default(json!(true))
                    .with_description("Indicates whether VPC multicast is enabled."),
            )
            .with_attribute("tags", tags_attribute())
            .with_attribute(
                "is_default",
                Attribute::computed_bool().with_description("Indicates whether it is the default VPC for this region."),
            )
            .with_attribute("create_time", Attribute::computed_string())
            .with_attribute(
                "default_route_table_id",
                Attribute::computed_string().with_description("Default route table id, created automatically with the VPC."),
            )
    }

    async fn create(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let id = svc
            .create_vpc(
                d.require_str("name")?,
                d.require_str("cidr_block")?,
                d.get_bool("is_multicast").unwrap_or(true),
                &d.get_string_list("dns_servers"),
                &d.get_string_map("tags"),
            )
            .await?;
        d.set_id(id);
        Ok(())
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<bool, ProviderError> {
        let id = d.require_id()?.to_string();
        let Some(vpc) = svc.describe_vpc(&id).await? else {
            warn!(vpc_id = %id, "vpc not found");
            return Ok(false);
        };

        d.set("name", vpc.vpc_name);
        d.set("cidr_block", vpc.cidr_block);
        d.set("dns_servers", vpc.dns_server_set);
        d.set("is_multicast", vpc.enable_multicast);
        d.set("is_default", vpc.is_default);
        d.set("create_time", vpc.created_time);
        d.set_string_map("tags", &tags_to_map(&vpc.tag_set));
        d.set_opt("default_route_table_id", svc.default_route_table_id(&id).await?);
        Ok(true)
    }

    async fn update(
        &self,
        svc: &VpcService,
        prior: &ResourceData,
        d: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        let id = d.require_id()?.to_string();

        if d.has_changes(prior, &["name", "is_multicast"]) || d.has_set_change(prior, "dns_servers") {
            svc.modify_vpc(
                &id,
                d.require_str("name")?,
                d.get_bool("is_multicast").unwrap_or(true),
                &d.get_string_list("dns_servers"),
            )
            .await?;
            info!(vpc_id = %id, "updated vpc attributes");
        }

        update_tags(svc, TAG_SERVICE_VPC, "vpc", prior, d).await
    }

    async fn delete(&self, svc: &VpcService, d: &ResourceData) -> Result<(), ProviderError> {
        svc.delete_vpc(d.require_id()?).await
    }
}
