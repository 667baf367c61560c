use tracing::warn;

use super::{base_schema, Resource};
use crate::error::ProviderError;
use crate::helper::{join_id, split_id, ENI_ATTACHMENT_SEP};
use crate::schema::{Attribute, Schema};
use crate::service::VpcService;
use crate::state::ResourceData;

pub struct EniAttachmentResource;

#[async_trait::async_trait]
impl Resource for EniAttachmentResource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_eni_attachment"
    }

    fn schema(&self) -> Schema {
        base_schema("Provides a resource to attach an ENI to a CVM instance.")
            .with_attribute(
                "eni_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("ID of the ENI."),
            )
            .with_attribute(
                "instance_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("ID of the instance which bind the ENI."),
            )
    }

    async fn create(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let eni_id = d.require_str("eni_id")?.to_string();
        let instance_id = d.require_str("instance_id")?.to_string();

        svc.attach_eni(&eni_id, &instance_id).await?;
        d.set_id(join_id(&[eni_id.as_str(), instance_id.as_str()], ENI_ATTACHMENT_SEP));
        Ok(())
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<bool, ProviderError> {
        let id = d.require_id()?.to_string();
        let parts = split_id(&id, ENI_ATTACHMENT_SEP, 2)?;
        let (eni_id, instance_id) = (parts[0], parts[1]);

        let attached = svc
            .describe_eni(eni_id)
            .await?
            .is_some_and(|eni| eni.attached_instance() == Some(instance_id));
        if !attached {
            warn!(eni_id, instance_id, "eni attachment not found");
            return Ok(false);
        }

        d.set("eni_id", eni_id);
        d.set("instance_id", instance_id);
        Ok(true)
    }

    async fn delete(&self, svc: &VpcService, d: &ResourceData) -> Result<(), ProviderError> {
        let parts = split_id(d.require_id()?, ENI_ATTACHMENT_SEP, 2)?;
        svc.detach_eni(parts[0], parts[1]).await
    }
}
