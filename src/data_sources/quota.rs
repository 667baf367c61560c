use super::{base_schema, finish, DataSource};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};
use crate::service::VpcService;
use crate::state::ResourceData;

pub struct VpcLimitsDataSource;

#[async_trait::async_trait]
impl DataSource for VpcLimitsDataSource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_vpc_limits"
    }

    fn schema(&self) -> Schema {
        base_schema("Use this data source to query VPC quotas.")
            .with_attribute(
                "limit_types",
                Attribute::optional_string_set()
                    .with_description("Quota names, like `appid-max-vpcs` or `vpc-max-subnets`."),
            )
            .with_attribute(
                "vpc_limit_set",
                Attribute::computed_object_list([
                    ("limit_type", AttributeType::String),
                    ("limit_value", AttributeType::Int64),
                ]),
            )
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let limits = svc.describe_vpc_limits(&d.get_string_list("limit_types")).await?;

        let ids: Vec<String> = limits.iter().map(|l| l.limit_type.clone()).collect();
        let items = limits
            .into_iter()
            .map(|limit| {
                let mut item = ResourceData::new();
                item.set("limit_type", limit.limit_type);
                item.set("limit_value", limit.limit_value);
                item
            })
            .collect();

        finish(d, "vpc_limit_set", &ids, items).await
    }
}

pub struct VpcAccountAttributesDataSource;

#[async_trait::async_trait]
impl DataSource for VpcAccountAttributesDataSource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_vpc_account_attributes"
    }

    fn schema(&self) -> Schema {
        base_schema("Use this data source to query account attributes of the VPC service.").with_attribute(
            "account_attribute_set",
            Attribute::computed_object_list([
                ("attribute_name", AttributeType::String),
                ("attribute_values", AttributeType::list(AttributeType::String)),
            ]),
        )
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let attributes = svc.describe_account_attributes().await?;

        let ids: Vec<String> = attributes.iter().map(|a| a.attribute_name.clone()).collect();
        let items = attributes
            .into_iter()
            .map(|attribute| {
                let mut item = ResourceData::new();
                item.set("attribute_name", attribute.attribute_name);
                item.set("attribute_values", attribute.attribute_values);
                item
            })
            .collect();

        finish(d, "account_attribute_set", &ids, items).await
    }
}
