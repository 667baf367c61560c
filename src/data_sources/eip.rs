use serde_json::json;

use super::{base_schema, finish, DataSource};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};
use crate::service::models::tags_to_map;
use crate::service::{push_filter, push_tag_filters, VpcService};
use crate::state::ResourceData;

pub struct EipsDataSource;

#[async_trait::async_trait]
impl DataSource for EipsDataSource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_eips"
    }

    fn schema(&self) -> Schema {
        base_schema("Use this data source to query EIPs.")
            .with_attribute("eip_id", Attribute::optional_string().with_description("ID of the EIP to be queried."))
            .with_attribute("eip_name", Attribute::optional_string())
            .with_attribute("public_ip", Attribute::optional_string())
            .with_attribute("tags", Attribute::optional_string_map())
            .with_attribute(
                "eip_list",
                Attribute::computed_object_list([
                    ("eip_id", AttributeType::String),
                    ("eip_name", AttributeType::String),
                    ("eip_type", AttributeType::String),
                    ("status", AttributeType::String),
                    ("public_ip", AttributeType::String),
                    ("instance_id", AttributeType::String),
                    ("eni_id", AttributeType::String),
                    ("tags", AttributeType::map(AttributeType::String)),
                    ("create_time", AttributeType::String),
                ]),
            )
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let mut filters = Vec::new();
        push_filter(&mut filters, "address-id", d.get_str("eip_id"));
        push_filter(&mut filters, "address-name", d.get_str("eip_name"));
        push_filter(&mut filters, "public-ip", d.get_str("public_ip"));
        push_tag_filters(&mut filters, &d.get_string_map("tags"));

        let eips = svc.describe_eips(filters).await?;

        let ids: Vec<String> = eips.iter().map(|e| e.address_id.clone()).collect();
        let items = eips
            .into_iter()
            .map(|eip| {
                let mut item = ResourceData::new();
                item.set("eip_id", eip.address_id);
                item.set("eip_name", eip.address_name);
                item.set("eip_type", eip.address_type);
                item.set("status", eip.address_status);
                item.set("public_ip", eip.address_ip);
                item.set("instance_id", eip.instance_id);
                item.set("eni_id", eip.network_interface_id);
                item.set("tags", json!(tags_to_map(&eip.tag_set)));
                item.set("create_time", eip.created_time);
                item
            })
            .collect();

        finish(d, "eip_list", &ids, items).await
    }
}
