use super::{base_schema, finish, DataSource};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};
use crate::service::{push_filter, VpcService};
use crate::state::ResourceData;

pub struct AddressTemplatesDataSource;

#[async_trait::async_trait]
impl DataSource for AddressTemplatesDataSource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_address_templates"
    }

    fn schema(&self) -> Schema {
        base_schema("Use this data source to query address templates.")
            .with_attribute("name", Attribute::optional_string().with_description("Name of the address template."))
            .with_attribute("template_id", Attribute::optional_string())
            .with_attribute(
                "template_list",
                Attribute::computed_object_list([
                    ("id", AttributeType::String),
                    ("name", AttributeType::String),
                    ("addresses", AttributeType::list(AttributeType::String)),
                    ("create_time", AttributeType::String),
                ]),
            )
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let mut filters = Vec::new();
        push_filter(&mut filters, "address-template-name", d.get_str("name"));
        push_filter(&mut filters, "address-template-id", d.get_str("template_id"));

        let templates = svc.describe_address_templates(filters).await?;

        let ids: Vec<String> = templates.iter().map(|t| t.address_template_id.clone()).collect();
        let items = templates
            .into_iter()
            .map(|template| {
                let mut item = ResourceData::new();
                item.set("id", template.address_template_id);
                item.set("name", template.address_template_name);
                item.set("addresses", template.address_set);
                item.set("create_time", template.created_time);
                item
            })
            .collect();

        finish(d, "template_list", &ids, items).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::{api_error, ok, service};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer};

    #[tokio::test]
    async fn test_lists_templates_by_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DescribeAddressTemplates"))
            .and(body_partial_json(json!({
                "Filters": [{"Name": "address-template-name", "Values": ["office"]}]
            })))
            .respond_with(ok(json!({
                "TotalCount": 2,
                "AddressTemplateSet": [
                    {"AddressTemplateId": "ipm-1", "AddressTemplateName": "office", "AddressSet": ["10.0.0.1"]},
                    {"AddressTemplateId": "ipm-2", "AddressTemplateName": "office", "AddressSet": []}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let svc = service(&server);
        let mut d = ResourceData::from_value(json!({"name": "office"})).unwrap();
        AddressTemplatesDataSource.read(&svc, &mut d).await.unwrap();

        let list = d.get_list("template_list");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].get_string_list("addresses"), vec!["10.0.0.1"]);
        assert_eq!(list[1].get_str("id"), Some("ipm-2"));
    }

    #[tokio::test]
    async fn test_api_error_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DescribeAddressTemplates"))
            .respond_with(api_error("AuthFailure.SecretIdNotFound"))
            .mount(&server)
            .await;

        let svc = service(&server);
        let mut d = ResourceData::new();
        let err = AddressTemplatesDataSource.read(&svc, &mut d).await.unwrap_err();
        assert!(matches!(err, ProviderError::PermissionDenied(_)));
        assert!(d.id().is_none());
    }
}
