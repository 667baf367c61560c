//! Address, address group and protocol (service) templates.

use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::models::{AddressTemplate, AddressTemplateGroup, Filter, ServiceTemplate};
use super::{found, Paging, VpcService};
use crate::error::ProviderError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateAddressTemplateResponse {
    address_template: AddressTemplate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateAddressTemplateGroupResponse {
    address_template_group: AddressTemplateGroup,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateServiceTemplateResponse {
    service_template: ServiceTemplate,
}

fn filtered(filters: Vec<Filter>) -> serde_json::Value {
    if filters.is_empty() {
        json!({})
    } else {
        json!({"Filters": filters})
    }
}

impl VpcService {
    pub async fn create_address_template(&self, name: &str, addresses: &[String]) -> Result<String, ProviderError> {
        let request = json!({"AddressTemplateName": name, "Addresses": addresses});
        let response: CreateAddressTemplateResponse =
            self.write("CreateAddressTemplate", &request).await?;
        let id = response.address_template.address_template_id;
        info!(address_template_id = %id, "created address template");
        Ok(id)
    }

    pub async fn describe_address_template(&self, id: &str) -> Result<Option<AddressTemplate>, ProviderError> {
        let templates = found(
            self.describe_address_templates(vec![Filter::new("address-template-id", id)])
                .await,
        )?;
        Ok(templates.and_then(|t| t.into_iter().find(|tpl| tpl.address_template_id == id)))
    }

    pub async fn describe_address_templates(&self, filters: Vec<Filter>) -> Result<Vec<AddressTemplate>, ProviderError> {
        self.describe_all(
            "DescribeAddressTemplates",
            filtered(filters),
            "AddressTemplateSet",
            Paging::Strings,
        )
        .await
    }

    pub async fn modify_address_template(
        &self,
        id: &str,
        name: &str,
        addresses: &[String],
    ) -> Result<(), ProviderError> {
        let request = json!({
            "AddressTemplateId": id,
            "AddressTemplateName": name,
            "Addresses": addresses,
        });
        let _: IgnoredAny = self.write("ModifyAddressTemplateAttribute", &request).await?;
        Ok(())
    }

    pub async fn delete_address_template(&self, id: &str) -> Result<(), ProviderError> {
        let _: IgnoredAny = self
            .write("DeleteAddressTemplate", &json!({"AddressTemplateId": id}))
            .await?;
        info!(address_template_id = %id, "deleted address template");
        Ok(())
    }

    pub async fn create_address_template_group(
        &self,
        name: &str,
        template_ids: &[String],
    ) -> Result<String, ProviderError> {
        let request = json!({"AddressTemplateGroupName": name, "AddressTemplateIds": template_ids});
        let response: CreateAddressTemplateGroupResponse =
            self.write("CreateAddressTemplateGroup", &request).await?;
        let id = response.address_template_group.address_template_group_id;
        info!(address_template_group_id = %id, "created address template group");
        Ok(id)
    }

    pub async fn describe_address_template_group(
        &self,
        id: &str,
    ) -> Result<Option<AddressTemplateGroup>, ProviderError> {
        let groups: Option<Vec<AddressTemplateGroup>> = found(
            self.describe_all(
                "DescribeAddressTemplateGroups",
                filtered(vec![Filter::new("address-template-group-id", id)]),
                "AddressTemplateGroupSet",
                Paging::Strings,
            )
            .await,
        )?;
        Ok(groups.and_then(|g| g.into_iter().find(|group| group.address_template_group_id == id)))
    }

    pub async fn modify_address_template_group(
        &self,
        id: &str,
        name: &str,
        template_ids: &[String],
    ) -> Result<(), ProviderError> {
        let request = json!({
            "AddressTemplateGroupId": id,
            "AddressTemplateGroupName": name,
            "AddressTemplateIds": template_ids,
        });
        let _: IgnoredAny = self
            .write("ModifyAddressTemplateGroupAttribute", &request)
            .await?;
        Ok(())
    }

    pub async fn delete_address_template_group(&self, id: &str) -> Result<(), ProviderError> {
        let _: IgnoredAny = self
            .write("DeleteAddressTemplateGroup", &json!({"AddressTemplateGroupId": id}))
            .await?;
        info!(address_template_group_id = %id, "deleted address template group");
        Ok(())
    }

    pub async fn create_service_template(&self, name: &str, services: &[String]) -> Result<String, ProviderError> {
        let request = json!({"ServiceTemplateName": name, "Services": services});
        let response: CreateServiceTemplateResponse =
            self.write("CreateServiceTemplate", &request).await?;
        let id = response.service_template.service_template_id;
        info!(service_template_id = %id, "created protocol template");
        Ok(id)
    }

    pub async fn describe_service_template(&self, id: &str) -> Result<Option<ServiceTemplate>, ProviderError> {
        let templates: Option<Vec<ServiceTemplate>> = found(
            self.describe_all(
                "DescribeServiceTemplates",
                filtered(vec![Filter::new("service-template-id", id)]),
                "ServiceTemplateSet",
                Paging::Strings,
            )
            .await,
        )?;
        Ok(templates.and_then(|t| t.into_iter().find(|tpl| tpl.service_template_id == id)))
    }

    pub async fn modify_service_template(
        &self,
        id: &str,
        name: &str,
        services: &[String],
    ) -> Result<(), ProviderError> {
        let request = json!({
            "ServiceTemplateId": id,
            "ServiceTemplateName": name,
            "Services": services,
        });
        let _: IgnoredAny = self.write("ModifyServiceTemplateAttribute", &request).await?;
        Ok(())
    }

    pub async fn delete_service_template(&self, id: &str) -> Result<(), ProviderError> {
        let _: IgnoredAny = self
            .write("DeleteServiceTemplate", &json!({"ServiceTemplateId": id}))
            .await?;
        info!(service_template_id = %id, "deleted protocol template");
        Ok(())
    }
}
