use tracing::warn;

use super::{base_schema, Resource};
use crate::error::ProviderError;
use crate::helper::{join_id, EIP_ASSOCIATION_SEP};
use crate::schema::{Attribute, Diagnostic, Schema, Validator};
use crate::service::{EipTarget, VpcService, EIP_STATUS_UNBIND};
use crate::state::ResourceData;

pub struct EipAssociationResource;

/// Split `eip::instance` or `eip::eni::private_ip`.
fn parse_id(id: &str) -> Result<(&str, EipTarget), ProviderError> {
    let parts: Vec<&str> = id.split(EIP_ASSOCIATION_SEP).collect();
    match parts.as_slice() {
        [eip, instance] if !eip.is_empty() && !instance.is_empty() => {
            Ok((*eip, EipTarget::Instance(instance.to_string())))
        },
        [eip, eni, ip] if !eip.is_empty() && !eni.is_empty() && !ip.is_empty() => Ok((
            *eip,
            EipTarget::NetworkInterface {
                eni_id: eni.to_string(),
                private_ip: ip.to_string(),
            },
        )),
        _ => Err(ProviderError::InvalidRequest(format!(
            "eip association id `{}` is broken",
            id
        ))),
    }
}

fn build_id(eip_id: &str, target: &EipTarget) -> String {
    match target {
        EipTarget::Instance(instance_id) => join_id(&[eip_id, instance_id.as_str()], EIP_ASSOCIATION_SEP),
        EipTarget::NetworkInterface { eni_id, private_ip } => {
            join_id(&[eip_id, eni_id.as_str(), private_ip.as_str()], EIP_ASSOCIATION_SEP)
        },
    }
}

fn target_from(d: &ResourceData) -> Result<EipTarget, ProviderError> {
    if let Some(instance_id) = d.get_string("instance_id") {
        return Ok(EipTarget::Instance(instance_id));
    }
    Ok(EipTarget::NetworkInterface {
        eni_id: d.require_str("network_interface_id")?.to_string(),
        private_ip: d.require_str("private_ip")?.to_string(),
    })
}

#[async_trait::async_trait]
impl Resource for EipAssociationResource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_eip_association"
    }

    fn schema(&self) -> Schema {
        base_schema("Provides an EIP association resource.")
            .with_attribute(
                "eip_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("The ID of the EIP."),
            )
            .with_attribute(
                "instance_id",
                Attribute::optional_computed_string()
                    .with_force_new()
                    .with_description("The CVM or CLB instance id going to bind with the EIP."),
            )
            .with_attribute(
                "network_interface_id",
                Attribute::optional_computed_string()
                    .with_force_new()
                    .with_description("Indicates the network interface id like `eni-xxxxxx`."),
            )
            .with_attribute(
                "private_ip",
                Attribute::optional_computed_string()
                    .with_force_new()
                    .with_validator(Validator::Ip)
                    .with_description("Indicates an IP belongs to the `network_interface_id`."),
            )
    }

    fn validate(&self, config: &ResourceData) -> Vec<Diagnostic> {
        let instance = config.is_set("instance_id");
        let eni = config.is_set("network_interface_id");
        let ip = config.is_set("private_ip");

        if instance && (eni || ip) {
            return vec![Diagnostic::error(
                "`instance_id` conflicts with `network_interface_id` and `private_ip`",
            )
            .with_attribute("instance_id")];
        }
        if !instance && !(eni && ip) {
            return vec![Diagnostic::error(
                "either `instance_id` or both `network_interface_id` and `private_ip` must be set",
            )
            .with_attribute("instance_id")];
        }
        Vec::new()
    }

    async fn create(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let eip_id = d.require_str("eip_id")?.to_string();
        let target = target_from(d)?;

        svc.associate_eip(&eip_id, &target).await?;
        d.set_id(build_id(&eip_id, &target));
        Ok(())
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<bool, ProviderError> {
        let id = d.require_id()?.to_string();
        let (eip_id, target) = parse_id(&id)?;

        let bound = match svc.describe_eip(eip_id).await? {
            Some(eip) if eip.address_status != EIP_STATUS_UNBIND => match &target {
                EipTarget::Instance(instance_id) => eip.instance_id == *instance_id,
                EipTarget::NetworkInterface { eni_id, private_ip } => {
                    eip.network_interface_id == *eni_id && eip.private_address_ip == *private_ip
                },
            },
            _ => false,
        };
        if !bound {
            warn!(eip_id, "eip association not found");
            return Ok(false);
        }

        d.set("eip_id", eip_id);
        match target {
            EipTarget::Instance(instance_id) => d.set("instance_id", instance_id),
            EipTarget::NetworkInterface { eni_id, private_ip } => {
                d.set("network_interface_id", eni_id);
                d.set("private_ip", private_ip);
            },
        }
        Ok(true)
    }

    async fn delete(&self, svc: &VpcService, d: &ResourceData) -> Result<(), ProviderError> {
        let (eip_id, _) = parse_id(d.require_id()?)?;
        svc.disassociate_eip(eip_id).await
    }
}
