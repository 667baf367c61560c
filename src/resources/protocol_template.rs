use tracing::warn;

use super::{base_schema, Resource};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Diagnostic, Schema, Validator};
use crate::service::VpcService;
use crate::state::ResourceData;

pub struct ProtocolTemplateResource;

/// `tcp:80`, `udp:53,54`, `tcp:8000-8010`, `icmp`, `gre` and the like.
fn check_protocol(value: &str) -> Result<(), String> {
    let (protocol, ports) = match value.split_once(':') {
        Some((protocol, ports)) => (protocol, Some(ports)),
        None => (value, None),
    };
    match (protocol.to_ascii_lowercase().as_str(), ports) {
        ("tcp" | "udp", Some(ports)) if crate::helper::is_port_expression(ports) || ports == "all" => Ok(()),
        ("tcp" | "udp", None) | ("icmp" | "gre" | "all", None) => Ok(()),
        _ => Err(format!("invalid protocol `{}`", value)),
    }
}

#[async_trait::async_trait]
impl Resource for ProtocolTemplateResource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_protocol_template"
    }

    fn schema(&self) -> Schema {
        base_schema("Provides a resource to manage a protocol template.")
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_validator(Validator::string_length(1, 60))
                    .with_description("Name of the protocol template."),
            )
            .with_attribute(
                "protocols",
                Attribute::new(AttributeType::set(AttributeType::String), AttributeFlags::required())
                    .with_description("Protocol list, like `tcp:80`, `udp:53`, `tcp:1000-2000` or `icmp`."),
            )
    }

    fn validate(&self, config: &ResourceData) -> Vec<Diagnostic> {
        config
            .get_string_list("protocols")
            .iter()
            .filter_map(|p| check_protocol(p).err())
            .map(|e| Diagnostic::error(e).with_attribute("protocols"))
            .collect()
    }

    async fn create(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let id = svc
            .create_service_template(d.require_str("name")?, &d.get_string_list("protocols"))
            .await?;
        d.set_id(id);
        Ok(())
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<bool, ProviderError> {
        let id = d.require_id()?.to_string();
        let Some(template) = svc.describe_service_template(&id).await? else {
            warn!(service_template_id = %id, "protocol template not found");
            return Ok(false);
        };

        d.set("name", template.service_template_name);
        d.set("protocols", template.service_set);
        Ok(true)
    }

    async fn update(
        &self,
        svc: &VpcService,
        prior: &ResourceData,
        d: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        if d.has_change(prior, "name") || d.has_set_change(prior, "protocols") {
            svc.modify_service_template(
                d.require_id()?,
                d.require_str("name")?,
                &d.get_string_list("protocols"),
            )
            .await?;
        }
        Ok(())
    }

    async fn delete(&self, svc: &VpcService, d: &ResourceData) -> Result<(), ProviderError> {
        svc.delete_service_template(d.require_id()?).await
    }
}
