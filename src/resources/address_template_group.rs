use tracing::warn;

use super::{base_schema, Resource};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema, Validator};
use crate::service::VpcService;
use crate::state::ResourceData;

pub struct AddressTemplateGroupResource;

#[async_trait::async_trait]
impl Resource for AddressTemplateGroupResource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_address_template_group"
    }

    fn schema(&self) -> Schema {
        base_schema("Provides a resource to manage an address template group.")
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_validator(Validator::string_length(1, 60))
                    .with_description("Name of the address template group."),
            )
            .with_attribute(
                "template_ids",
                Attribute::new(AttributeType::set(AttributeType::String), AttributeFlags::required())
                    .with_description("Template ID list."),
            )
    }

    async fn create(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let id = svc
            .create_address_template_group(d.require_str("name")?, &d.get_string_list("template_ids"))
            .await?;
        d.set_id(id);
        Ok(())
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<bool, ProviderError> {
        let id = d.require_id()?.to_string();
        let Some(group) = svc.describe_address_template_group(&id).await? else {
            warn!(address_template_group_id = %id, "address template group not found");
            return Ok(false);
        };

        d.set("name", group.address_template_group_name);
        d.set("template_ids", group.address_template_id_set);
        Ok(true)
    }

    async fn update(
        &self,
        svc: &VpcService,
        prior: &ResourceData,
        d: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        if d.has_change(prior, "name") || d.has_set_change(prior, "template_ids") {
            svc.modify_address_template_group(
                d.require_id()?,
                d.require_str("name")?,
                &d.get_string_list("template_ids"),
            )
            .await?;
        }
        Ok(())
    }

    async fn delete(&self, svc: &VpcService, d: &ResourceData) -> Result<(), ProviderError> {
        svc.delete_address_template_group(d.require_id()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::{ok, service};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer};

    #[tokio::test]
    async fn test_create_and_read() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "CreateAddressTemplateGroup"))
            .and(body_partial_json(json!({
                "AddressTemplateGroupName": "offices",
                "AddressTemplateIds": ["ipm-1", "ipm-2"]
            })))
            .respond_with(ok(json!({"AddressTemplateGroup": {"AddressTemplateGroupId": "ipmg-1"}})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DescribeAddressTemplateGroups"))
            .respond_with(ok(json!({
                "TotalCount": 1,
                "AddressTemplateGroupSet": [{
                    "AddressTemplateGroupId": "ipmg-1",
                    "AddressTemplateGroupName": "offices",
                    "AddressTemplateIdSet": ["ipm-1", "ipm-2"]
                }]
            })))
            .mount(&server)
            .await;

        let svc = service(&server);
        let mut d = ResourceData::from_value(json!({"name": "offices", "template_ids": ["ipm-1", "ipm-2"]})).unwrap();
        AddressTemplateGroupResource.create(&svc, &mut d).await.unwrap();
        assert!(AddressTemplateGroupResource.read(&svc, &mut d).await.unwrap());
        assert_eq!(d.id(), Some("ipmg-1"));
        assert_eq!(d.get_string_list("template_ids"), vec!["ipm-1", "ipm-2"]);
    }

    #[tokio::test]
    async fn test_read_missing_group() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DescribeAddressTemplateGroups"))
            .respond_with(ok(json!({"TotalCount": 0, "AddressTemplateGroupSet": []})))
            .mount(&server)
            .await;

        let svc = service(&server);
        let mut d = ResourceData::from_value(json!({"id": "ipmg-gone"})).unwrap();
        assert!(!AddressTemplateGroupResource.read(&svc, &mut d).await.unwrap());
    }

    #[tokio::test]
    async fn test_rename_and_delete() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "ModifyAddressTemplateGroupAttribute"))
            .and(body_partial_json(json!({
                "AddressTemplateGroupId": "ipmg-1",
                "AddressTemplateGroupName": "branches",
                "AddressTemplateIds": ["ipm-2", "ipm-1"]
            })))
            .respond_with(ok(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DeleteAddressTemplateGroup"))
            .respond_with(ok(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let svc = service(&server);
        let prior =
            ResourceData::from_value(json!({"id": "ipmg-1", "name": "offices", "template_ids": ["ipm-1", "ipm-2"]}))
                .unwrap();
        let mut d =
            ResourceData::from_value(json!({"id": "ipmg-1", "name": "branches", "template_ids": ["ipm-2", "ipm-1"]}))
                .unwrap();
        AddressTemplateGroupResource.update(&svc, &prior, &mut d).await.unwrap();
        AddressTemplateGroupResource.delete(&svc, &d).await.unwrap();
    }
}
