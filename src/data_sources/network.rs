use super::{base_schema, finish, DataSource};
use crate::error::ProviderError;
use crate::helper::{join_id, ROUTE_SEP};
use crate::schema::{Attribute, AttributeType, Schema};
use crate::service::models::{tags_to_map, Filter};
use crate::service::{push_filter, push_tag_filters, VpcService};
use crate::state::ResourceData;

fn tags_value(tags: &[crate::service::models::Tag]) -> serde_json::Value {
    serde_json::json!(tags_to_map(tags))
}

pub struct VpcInstancesDataSource;

#[async_trait::async_trait]
impl DataSource for VpcInstancesDataSource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_vpc_instances"
    }

    fn schema(&self) -> Schema {
        base_schema("Use this data source to query VPC instances.")
            .with_attribute("vpc_id", Attribute::optional_string().with_description("ID of the VPC to be queried."))
            .with_attribute("name", Attribute::optional_string().with_description("Name of the VPC to be queried."))
            .with_attribute("is_default", Attribute::optional_bool())
            .with_attribute("cidr_block", Attribute::optional_string())
            .with_attribute("tag_key", Attribute::optional_string().with_description("Filter VPCs that have this tag key."))
            .with_attribute("tags", Attribute::optional_string_map())
            .with_attribute(
                "instance_list",
                Attribute::computed_object_list([
                    ("vpc_id", AttributeType::String),
                    ("name", AttributeType::String),
                    ("cidr_block", AttributeType::String),
                    ("is_default", AttributeType::Bool),
                    ("is_multicast", AttributeType::Bool),
                    ("dns_servers", AttributeType::list(AttributeType::String)),
                    ("subnet_ids", AttributeType::list(AttributeType::String)),
                    ("tags", AttributeType::map(AttributeType::String)),
                    ("create_time", AttributeType::String),
                ]),
            )
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let mut filters = Vec::new();
        push_filter(&mut filters, "vpc-id", d.get_str("vpc_id"));
        push_filter(&mut filters, "vpc-name", d.get_str("name"));
        push_filter(&mut filters, "cidr-block", d.get_str("cidr_block"));
        push_filter(&mut filters, "tag-key", d.get_str("tag_key"));
        if let Some(is_default) = d.get_bool("is_default") {
            filters.push(Filter::new("is-default", is_default.to_string()));
        }
        push_tag_filters(&mut filters, &d.get_string_map("tags"));

        let vpcs = svc.describe_vpcs(filters).await?;

        let mut ids = Vec::with_capacity(vpcs.len());
        let mut items = Vec::with_capacity(vpcs.len());
        for vpc in vpcs {
            let subnet_ids: Vec<String> = svc
                .describe_subnets(vec![Filter::new("vpc-id", vpc.vpc_id.clone())])
                .await?
                .into_iter()
                .map(|s| s.subnet_id)
                .collect();

            let mut item = ResourceData::new();
            item.set("vpc_id", vpc.vpc_id.clone());
            item.set("name", vpc.vpc_name);
            item.set("cidr_block", vpc.cidr_block);
            item.set("is_default", vpc.is_default);
            item.set("is_multicast", vpc.enable_multicast);
            item.set("dns_servers", vpc.dns_server_set);
            item.set("subnet_ids", subnet_ids);
            item.set("tags", tags_value(&vpc.tag_set));
            item.set("create_time", vpc.created_time);
            ids.push(vpc.vpc_id);
            items.push(item);
        }

        finish(d, "instance_list", &ids, items).await
    }
}

pub struct VpcSubnetsDataSource;

#[async_trait::async_trait]
impl DataSource for VpcSubnetsDataSource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_vpc_subnets"
    }

    fn schema(&self) -> Schema {
        base_schema("Use this data source to query VPC subnets.")
            .with_attribute("vpc_id", Attribute::optional_string())
            .with_attribute("subnet_id", Attribute::optional_string())
            .with_attribute("name", Attribute::optional_string())
            .with_attribute("availability_zone", Attribute::optional_string())
            .with_attribute("is_default", Attribute::optional_bool())
            .with_attribute("cidr_block", Attribute::optional_string())
            .with_attribute("tag_key", Attribute::optional_string())
            .with_attribute("tags", Attribute::optional_string_map())
            .with_attribute(
                "instance_list",
                Attribute::computed_object_list([
                    ("vpc_id", AttributeType::String),
                    ("subnet_id", AttributeType::String),
                    ("name", AttributeType::String),
                    ("cidr_block", AttributeType::String),
                    ("availability_zone", AttributeType::String),
                    ("route_table_id", AttributeType::String),
                    ("is_default", AttributeType::Bool),
                    ("is_multicast", AttributeType::Bool),
                    ("available_ip_count", AttributeType::Int64),
                    ("tags", AttributeType::map(AttributeType::String)),
                    ("create_time", AttributeType::String),
                ]),
            )
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let mut filters = Vec::new();
        push_filter(&mut filters, "vpc-id", d.get_str("vpc_id"));
        push_filter(&mut filters, "subnet-id", d.get_str("subnet_id"));
        push_filter(&mut filters, "subnet-name", d.get_str("name"));
        push_filter(&mut filters, "zone", d.get_str("availability_zone"));
        push_filter(&mut filters, "cidr-block", d.get_str("cidr_block"));
        push_filter(&mut filters, "tag-key", d.get_str("tag_key"));
        if let Some(is_default) = d.get_bool("is_default") {
            filters.push(Filter::new("is-default", is_default.to_string()));
        }
        push_tag_filters(&mut filters, &d.get_string_map("tags"));

        let subnets = svc.describe_subnets(filters).await?;

        let ids: Vec<String> = subnets.iter().map(|s| s.subnet_id.clone()).collect();
        let items = subnets
            .into_iter()
            .map(|subnet| {
                let mut item = ResourceData::new();
                item.set("vpc_id", subnet.vpc_id);
                item.set("subnet_id", subnet.subnet_id);
                item.set("name", subnet.subnet_name);
                item.set("cidr_block", subnet.cidr_block);
                item.set("availability_zone", subnet.zone);
                item.set("route_table_id", subnet.route_table_id);
                item.set("is_default", subnet.is_default);
                item.set("is_multicast", subnet.enable_broadcast);
                item.set("available_ip_count", subnet.available_ip_address_count);
                item.set("tags", tags_value(&subnet.tag_set));
                item.set("create_time", subnet.created_time);
                item
            })
            .collect();

        finish(d, "instance_list", &ids, items).await
    }
}

pub struct VpcRouteTablesDataSource;

#[async_trait::async_trait]
impl DataSource for VpcRouteTablesDataSource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_vpc_route_tables"
    }

    fn schema(&self) -> Schema {
        let entry = AttributeType::object([
            ("route_entry_id", AttributeType::String),
            ("destination_cidr_block", AttributeType::String),
            ("next_type", AttributeType::String),
            ("next_hub", AttributeType::String),
            ("description", AttributeType::String),
        ]);

        base_schema("Use this data source to query VPC route tables.")
            .with_attribute("vpc_id", Attribute::optional_string())
            .with_attribute("route_table_id", Attribute::optional_string())
            .with_attribute("name", Attribute::optional_string())
            .with_attribute("association_main", Attribute::optional_bool())
            .with_attribute("tag_key", Attribute::optional_string())
            .with_attribute("tags", Attribute::optional_string_map())
            .with_attribute(
                "instance_list",
                Attribute::computed_object_list([
                    ("route_table_id", AttributeType::String),
                    ("name", AttributeType::String),
                    ("vpc_id", AttributeType::String),
                    ("is_default", AttributeType::Bool),
                    ("subnet_ids", AttributeType::list(AttributeType::String)),
                    ("route_entry_infos", AttributeType::list(entry)),
                    ("tags", AttributeType::map(AttributeType::String)),
                    ("create_time", AttributeType::String),
                ]),
            )
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let mut filters = Vec::new();
        push_filter(&mut filters, "vpc-id", d.get_str("vpc_id"));
        push_filter(&mut filters, "route-table-id", d.get_str("route_table_id"));
        push_filter(&mut filters, "route-table-name", d.get_str("name"));
        push_filter(&mut filters, "tag-key", d.get_str("tag_key"));
        if let Some(main) = d.get_bool("association_main") {
            filters.push(Filter::new("association.main", main.to_string()));
        }
        push_tag_filters(&mut filters, &d.get_string_map("tags"));

        let tables = svc.describe_route_tables(filters).await?;

        let ids: Vec<String> = tables.iter().map(|t| t.route_table_id.clone()).collect();
        let items = tables
            .into_iter()
            .map(|table| {
                let entries = table
                    .route_set
                    .iter()
                    .map(|route| {
                        let mut entry = ResourceData::new();
                        entry.set(
                            "route_entry_id",
                            join_id(
                                &[route.route_id.to_string().as_str(), table.route_table_id.as_str()],
                                ROUTE_SEP,
                            ),
                        );
                        entry.set("destination_cidr_block", route.destination_cidr_block.clone());
                        entry.set("next_type", route.gateway_type.clone());
                        entry.set("next_hub", route.gateway_id.clone());
                        entry.set("description", route.route_description.clone());
                        entry
                    })
                    .collect();
                let subnet_ids: Vec<String> = table.association_set.iter().map(|a| a.subnet_id.clone()).collect();

                let mut item = ResourceData::new();
                item.set("route_table_id", table.route_table_id.clone());
                item.set("name", table.route_table_name.clone());
                item.set("vpc_id", table.vpc_id.clone());
                item.set("is_default", table.main);
                item.set("subnet_ids", subnet_ids);
                item.set_list("route_entry_infos", entries);
                item.set("tags", tags_value(&table.tag_set));
                item.set("create_time", table.created_time.clone());
                item
            })
            .collect();

        finish(d, "instance_list", &ids, items).await
    }
}
