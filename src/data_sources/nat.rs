use serde_json::json;

use super::{base_schema, finish, DataSource};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};
use crate::service::models::tags_to_map;
use crate::service::{push_filter, VpcService};
use crate::state::ResourceData;

pub struct NatGatewaysDataSource;

#[async_trait::async_trait]
impl DataSource for NatGatewaysDataSource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_nat_gateways"
    }

    fn schema(&self) -> Schema {
        base_schema("Use this data source to query NAT gateways.")
            .with_attribute(
                "nat_gateway_id",
                Attribute::optional_string().with_description("ID of the NAT gateway."),
            )
            .with_attribute("name", Attribute::optional_string())
            .with_attribute("vpc_id", Attribute::optional_string())
            .with_attribute(
                "nats",
                Attribute::computed_object_list([
                    ("id", AttributeType::String),
                    ("name", AttributeType::String),
                    ("vpc_id", AttributeType::String),
                    ("state", AttributeType::String),
                    ("max_concurrent", AttributeType::Int64),
                    ("bandwidth", AttributeType::Int64),
                    ("assigned_eip_set", AttributeType::list(AttributeType::String)),
                    ("zone", AttributeType::String),
                    ("tags", AttributeType::map(AttributeType::String)),
                    ("create_time", AttributeType::String),
                ]),
            )
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let mut filters = Vec::new();
        push_filter(&mut filters, "nat-gateway-id", d.get_str("nat_gateway_id"));
        push_filter(&mut filters, "nat-gateway-name", d.get_str("name"));
        push_filter(&mut filters, "vpc-id", d.get_str("vpc_id"));

        let nats = svc.describe_nat_gateways(filters).await?;

        let ids: Vec<String> = nats.iter().map(|n| n.nat_gateway_id.clone()).collect();
        let items = nats
            .into_iter()
            .map(|nat| {
                let eips: Vec<String> = nat
                    .public_ip_address_set
                    .iter()
                    .map(|a| a.public_ip_address.clone())
                    .collect();

                let mut item = ResourceData::new();
                item.set("id", nat.nat_gateway_id);
                item.set("name", nat.nat_gateway_name);
                item.set("vpc_id", nat.vpc_id);
                item.set("state", nat.state);
                item.set("max_concurrent", nat.max_concurrent_connection);
                item.set("bandwidth", nat.internet_max_bandwidth_out);
                item.set("assigned_eip_set", eips);
                item.set("zone", nat.zone);
                item.set("tags", json!(tags_to_map(&nat.tag_set)));
                item.set("create_time", nat.created_time);
                item
            })
            .collect();

        finish(d, "nats", &ids, items).await
    }
}
