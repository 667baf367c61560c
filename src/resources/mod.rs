//! Managed resources.
//!
//! Each resource owns its schema and maps state attributes onto
//! [`VpcService`] calls. Handlers never call each other.

use std::sync::Arc;

use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::service::VpcService;
use crate::state::ResourceData;

mod address_template;
mod address_template_group;
mod eip;
mod eip_association;
mod eni;
mod eni_attachment;
mod nat_gateway;
mod protocol_template;
mod route_table;
mod route_table_entry;
mod security_group;
mod security_group_lite_rule;
mod security_group_rule;
mod subnet;
mod vpc;
mod vpc_peer_connect_manager;
mod vpc_snapshot_policy;

/// Lifecycle handlers of one resource type.
#[async_trait::async_trait]
pub trait Resource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    /// Checks that need more than one attribute; runs after schema validation.
    fn validate(&self, config: &ResourceData) -> Vec<Diagnostic> {
        let _ = config;
        Vec::new()
    }

    /// Create the remote object and set the ID on `d`.
    async fn create(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError>;

    /// Refresh `d` from the API. Returns `false` when the object is gone.
    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<bool, ProviderError>;

    /// Apply in-place changes from `prior` to `d`.
    async fn update(
        &self,
        svc: &VpcService,
        prior: &ResourceData,
        d: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        let _ = (svc, prior, d);
        Err(ProviderError::Unimplemented(format!(
            "{} does not support in-place updates",
            self.type_name()
        )))
    }

    async fn delete(&self, svc: &VpcService, d: &ResourceData) -> Result<(), ProviderError>;
}

/// Every resource the provider registers.
pub fn all() -> Vec<Arc<dyn Resource>> {
    vec![
        Arc::new(vpc::VpcResource),
        Arc::new(subnet::SubnetResource),
        Arc::new(route_table::RouteTableResource),
        Arc::new(route_table_entry::RouteTableEntryResource),
        Arc::new(security_group::SecurityGroupResource),
        Arc::new(security_group_rule::SecurityGroupRuleResource),
        Arc::new(security_group_lite_rule::SecurityGroupLiteRuleResource),
        Arc::new(eni::EniResource),
        Arc::new(eni_attachment::EniAttachmentResource),
        Arc::new(nat_gateway::NatGatewayResource),
        Arc::new(eip::EipResource),
        Arc::new(eip_association::EipAssociationResource),
        Arc::new(vpc_peer_connect_manager::VpcPeerConnectManagerResource),
        Arc::new(address_template::AddressTemplateResource),
        Arc::new(address_template_group::AddressTemplateGroupResource),
        Arc::new(protocol_template::ProtocolTemplateResource),
        Arc::new(vpc_snapshot_policy::VpcSnapshotPolicyResource),
    ]
}

/// Schema with the computed `id` every resource carries.
pub(crate) fn base_schema(description: &str) -> Schema {
    Schema::v0()
        .with_description(description)
        .with_attribute("id", Attribute::computed_string().with_description("Resource ID."))
}

pub(crate) fn tags_attribute() -> Attribute {
    Attribute::optional_string_map().with_description("Tags of the resource.")
}

/// Push tag changes through the tag API when `tags` differs from `prior`.
pub(crate) async fn update_tags(
    svc: &VpcService,
    service: &str,
    resource_type: &str,
    prior: &ResourceData,
    d: &ResourceData,
) -> Result<(), ProviderError> {
    if !d.has_change(prior, "tags") {
        return Ok(());
    }
    let id = d.require_id()?;
    svc.tags()
        .update_tags(
            service,
            resource_type,
            id,
            &prior.get_string_map("tags"),
            &d.get_string_map("tags"),
        )
        .await
}
