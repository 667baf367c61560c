use tracing::warn;

use super::{base_schema, Resource};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema, Validator};
use crate::service::VpcService;
use crate::state::ResourceData;

pub struct AddressTemplateResource;

#[async_trait::async_trait]
impl Resource for AddressTemplateResource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_address_template"
    }

    fn schema(&self) -> Schema {
        base_schema("Provides a resource to manage an address template.")
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_validator(Validator::string_length(1, 60))
                    .with_description("Name of the address template."),
            )
            .with_attribute(
                "addresses",
                Attribute::new(AttributeType::set(AttributeType::String), AttributeFlags::required())
                    .with_description("Addresses of the template: IPs, CIDR blocks or IP ranges like `1.1.1.1-1.1.1.100`."),
            )
    }

    async fn create(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let id = svc
            .create_address_template(d.require_str("name")?, &d.get_string_list("addresses"))
            .await?;
        d.set_id(id);
        Ok(())
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<bool, ProviderError> {
        let id = d.require_id()?.to_string();
        let Some(template) = svc.describe_address_template(&id).await? else {
            warn!(address_template_id = %id, "address template not found");
            return Ok(false);
        };

        d.set("name", template.address_template_name);
        d.set("addresses", template.address_set);
        Ok(true)
    }

    async fn update(
        &self,
        svc: &VpcService,
        prior: &ResourceData,
        d: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        if d.has_change(prior, "name") || d.has_set_change(prior, "addresses") {
            svc.modify_address_template(
                d.require_id()?,
                d.require_str("name")?,
                &d.get_string_list("addresses"),
            )
            .await?;
        }
        Ok(())
    }

    async fn delete(&self, svc: &VpcService, d: &ResourceData) -> Result<(), ProviderError> {
        svc.delete_address_template(d.require_id()?).await
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
    async fn test_create_read_delete() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "CreateAddressTemplate"))
            .and(body_partial_json(json!({
                "AddressTemplateName": "office",
                "Addresses": ["10.0.0.1", "10.1.0.0/16"]
            })))
            .respond_with(ok(json!({"AddressTemplate": {"AddressTemplateId": "ipm-1"}})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DescribeAddressTemplates"))
            .and(body_partial_json(json!({"Filters": [{"Name": "address-template-id", "Values": ["ipm-1"]}]})))
            .respond_with(ok(json!({
                "TotalCount": 1,
                "AddressTemplateSet": [{
                    "AddressTemplateId": "ipm-1",
                    "AddressTemplateName": "office",
                    "AddressSet": ["10.1.0.0/16", "10.0.0.1"]
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DeleteAddressTemplate"))
            .and(body_partial_json(json!({"AddressTemplateId": "ipm-1"})))
            .respond_with(ok(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let svc = service(&server);
        let mut d =
            ResourceData::from_value(json!({"name": "office", "addresses": ["10.0.0.1", "10.1.0.0/16"]})).unwrap();
        AddressTemplateResource.create(&svc, &mut d).await.unwrap();
        assert!(AddressTemplateResource.read(&svc, &mut d).await.unwrap());
        assert_eq!(d.get_string_list("addresses").len(), 2);
        AddressTemplateResource.delete(&svc, &d).await.unwrap();
    }

    #[tokio::test]
    async fn test_read_missing_template() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DescribeAddressTemplates"))
            .respond_with(ok(json!({"TotalCount": 0, "AddressTemplateSet": []})))
            .mount(&server)
            .await;

        let svc = service(&server);
        let mut d = ResourceData::from_value(json!({"id": "ipm-gone"})).unwrap();
        assert!(!AddressTemplateResource.read(&svc, &mut d).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_ignores_reordered_addresses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "ModifyAddressTemplateAttribute"))
            .and(body_partial_json(json!({"AddressTemplateId": "ipm-1", "Addresses": ["10.0.0.1", "10.2.0.0/16"]})))
            .respond_with(ok(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let svc = service(&server);
        let prior =
            ResourceData::from_value(json!({"id": "ipm-1", "name": "office", "addresses": ["10.1.0.0/16", "10.0.0.1"]}))
                .unwrap();
        let mut reordered =
            ResourceData::from_value(json!({"id": "ipm-1", "name": "office", "addresses": ["10.0.0.1", "10.1.0.0/16"]}))
                .unwrap();
        AddressTemplateResource.update(&svc, &prior, &mut reordered).await.unwrap();

        let mut changed =
            ResourceData::from_value(json!({"id": "ipm-1", "name": "office", "addresses": ["10.0.0.1", "10.2.0.0/16"]}))
                .unwrap();
        AddressTemplateResource.update(&svc, &prior, &mut changed).await.unwrap();
    }
}
