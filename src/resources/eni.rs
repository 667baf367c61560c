use std::collections::BTreeSet;

use tracing::{info, warn};

use super::{base_schema, tags_attribute, update_tags, Resource};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Block, Diagnostic, NestedBlock, Schema, Validator};
use crate::service::models::{tags_to_map, NetworkInterface, PrivateIpAddressSpecification};
use crate::service::{EniSpec, VpcService, TAG_SERVICE_VPC};
use crate::state::ResourceData;

const MAX_IPV4_COUNT: i64 = 30;

pub struct EniResource;

fn ipv4_block() -> Block {
    Block::new()
        .with_attribute(
            "ip",
            Attribute::required_string()
                .with_validator(Validator::Ip)
                .with_description("Intranet IP."),
        )
        .with_attribute(
            "primary",
            Attribute::required_bool().with_description("Indicates whether the IP is primary."),
        )
        .with_attribute(
            "description",
            Attribute::optional_string()
                .with_validator(Validator::string_length(0, 25))
                .with_description("Description of the IP."),
        )
}

fn configured_ipv4s(d: &ResourceData) -> Vec<PrivateIpAddressSpecification> {
    d.get_list("ipv4s")
        .iter()
        .filter_map(|item| {
            Some(PrivateIpAddressSpecification {
                private_ip_address: item.get_string("ip")?,
                primary: item.get_bool("primary").unwrap_or(false),
                description: item.get_string("description").unwrap_or_default(),
                ..Default::default()
            })
        })
        .collect()
}

fn ipv4_items(eni: &NetworkInterface) -> Vec<ResourceData> {
    eni.private_ip_address_set
        .iter()
        .map(|ip| {
            let mut item = ResourceData::new();
            item.set("ip", ip.private_ip_address.clone());
            item.set("primary", ip.primary);
            item.set("description", ip.description.clone());
            item
        })
        .collect()
}

impl EniResource {
    /// Reconcile explicitly listed addresses. The primary address cannot move.
    async fn update_ipv4s(
        &self,
        svc: &VpcService,
        id: &str,
        prior: &ResourceData,
        d: &ResourceData,
    ) -> Result<(), ProviderError> {
        let old = configured_ipv4s(prior);
        let new = configured_ipv4s(d);

        let old_primary = old.iter().find(|ip| ip.primary).map(|ip| &ip.private_ip_address);
        let new_primary = new.iter().find(|ip| ip.primary).map(|ip| &ip.private_ip_address);
        if old_primary != new_primary {
            return Err(ProviderError::InvalidRequest(
                "the primary ip of an eni can't be changed".to_string(),
            ));
        }

        let old_ips: BTreeSet<&str> = old.iter().map(|ip| ip.private_ip_address.as_str()).collect();
        let new_ips: BTreeSet<&str> = new.iter().map(|ip| ip.private_ip_address.as_str()).collect();

        let removed: Vec<String> = old_ips.difference(&new_ips).map(|ip| ip.to_string()).collect();
        svc.unassign_eni_ipv4s(id, &removed).await?;

        let added: Vec<PrivateIpAddressSpecification> = new
            .into_iter()
            .filter(|ip| !old_ips.contains(ip.private_ip_address.as_str()))
            .collect();
        if !added.is_empty() {
            svc.assign_eni_ipv4s(id, &added, None).await?;
        }
        Ok(())
    }

    /// Grow or shrink the number of secondary addresses.
    async fn update_ipv4_count(
        &self,
        svc: &VpcService,
        id: &str,
        prior: &ResourceData,
        d: &ResourceData,
    ) -> Result<(), ProviderError> {
        let old = prior.get_i64("ipv4_count").unwrap_or(1);
        let new = d.get_i64("ipv4_count").unwrap_or(1);

        if new > old {
            return svc.assign_eni_ipv4s(id, &[], Some(new - old)).await;
        }

        let eni = svc
            .describe_eni(id)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("eni {}", id)))?;
        let surplus: Vec<String> = eni
            .private_ip_address_set
            .iter()
            .filter(|ip| !ip.primary)
            .take((old - new).max(0) as usize)
            .map(|ip| ip.private_ip_address.clone())
            .collect();
        svc.unassign_eni_ipv4s(id, &surplus).await
    }
}

#[async_trait::async_trait]
impl Resource for EniResource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_eni"
    }

    fn schema(&self) -> Schema {
        base_schema("Provides a resource to create an elastic network interface.")
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_validator(Validator::string_length(1, 60))
                    .with_description("Name of the ENI."),
            )
            .with_attribute("vpc_id", Attribute::required_string().with_force_new())
            .with_attribute("subnet_id", Attribute::required_string().with_force_new())
            .with_attribute(
                "description",
                Attribute::optional_string().with_validator(Validator::string_length(0, 60)),
            )
            .with_attribute(
                "security_groups",
                Attribute::optional_string_set().with_description("A set of security group IDs."),
            )
            .with_block(
                "ipv4s",
                NestedBlock::set(ipv4_block()).with_max_items(MAX_IPV4_COUNT as u32),
            )
            .with_attribute(
                "ipv4_count",
                Attribute::optional_int64()
                    .with_validator(Validator::int_range(1, MAX_IPV4_COUNT))
                    .with_description("The number of intranet IPv4s, conflicts with `ipv4s`."),
            )
            .with_attribute("tags", tags_attribute())
            .with_attribute("mac", Attribute::computed_string())
            .with_attribute("state", Attribute::computed_string())
            .with_attribute(
                "primary",
                Attribute::computed_bool().with_description("Indicates whether the IP is primary."),
            )
            .with_attribute(
                "ipv4_info",
                Attribute::computed_object_list([
                    ("ip", AttributeType::String),
                    ("primary", AttributeType::Bool),
                    ("description", AttributeType::String),
                ]),
            )
            .with_attribute("create_time", Attribute::computed_string())
    }

    fn validate(&self, config: &ResourceData) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let ipv4s = configured_ipv4s(config);

        match (ipv4s.is_empty(), config.is_set("ipv4_count")) {
            (false, true) => diagnostics.push(
                Diagnostic::error("`ipv4s` conflicts with `ipv4_count`").with_attribute("ipv4_count"),
            ),
            (true, false) => diagnostics.push(
                Diagnostic::error("one of `ipv4s` or `ipv4_count` must be set").with_attribute("ipv4s"),
            ),
            _ => {},
        }

        if !ipv4s.is_empty() && ipv4s.iter().filter(|ip| ip.primary).count() != 1 {
            diagnostics.push(
                Diagnostic::error("exactly one of `ipv4s` must be primary").with_attribute("ipv4s"),
            );
        }
        diagnostics
    }

    async fn create(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let spec = EniSpec {
            name: d.require_str("name")?.to_string(),
            vpc_id: d.require_str("vpc_id")?.to_string(),
            subnet_id: d.require_str("subnet_id")?.to_string(),
            description: d.get_string("description").unwrap_or_default(),
            security_groups: d.get_string_list("security_groups"),
            ipv4_count: d.get_i64("ipv4_count"),
            ipv4s: configured_ipv4s(d),
            tags: d.get_string_map("tags"),
        };

        let id = svc.create_eni(&spec).await?;
        d.set_id(id);
        Ok(())
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<bool, ProviderError> {
        let id = d.require_id()?.to_string();
        let Some(eni) = svc.describe_eni(&id).await? else {
            warn!(eni_id = %id, "eni not found");
            return Ok(false);
        };

        let items = ipv4_items(&eni);
        if d.is_set("ipv4s") {
            d.set_list("ipv4s", items.clone());
        } else {
            d.set("ipv4_count", eni.private_ip_address_set.len() as i64);
        }
        d.set_list("ipv4_info", items);

        d.set("name", eni.network_interface_name);
        d.set("vpc_id", eni.vpc_id);
        d.set("subnet_id", eni.subnet_id);
        d.set("description", eni.network_interface_description);
        d.set("security_groups", eni.group_set);
        d.set("mac", eni.mac_address);
        d.set("state", eni.state);
        d.set("primary", eni.primary);
        d.set("create_time", eni.created_time);
        d.set_string_map("tags", &tags_to_map(&eni.tag_set));
        Ok(true)
    }

    async fn update(
        &self,
        svc: &VpcService,
        prior: &ResourceData,
        d: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        let id = d.require_id()?.to_string();

        if d.has_changes(prior, &["name", "description"]) || d.has_set_change(prior, "security_groups") {
            svc.modify_eni(
                &id,
                d.require_str("name")?,
                d.get_str("description").unwrap_or_default(),
                &d.get_string_list("security_groups"),
            )
            .await?;
            info!(eni_id = %id, "updated eni attributes");
        }

        if d.has_set_change(prior, "ipv4s") {
            self.update_ipv4s(svc, &id, prior, d).await?;
        } else if d.has_change(prior, "ipv4_count") {
            self.update_ipv4_count(svc, &id, prior, d).await?;
        }

        update_tags(svc, TAG_SERVICE_VPC, "eni", prior, d).await
    }

    async fn delete(&self, svc: &VpcService, d: &ResourceData) -> Result<(), ProviderError> {
        svc.delete_eni(d.require_id()?).await
    }
}
