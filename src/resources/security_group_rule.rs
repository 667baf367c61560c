use tracing::warn;

use super::{base_schema, Resource};
use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema, Validator};
use crate::service::{RuleDirection, SecurityGroupRuleInfo, VpcService};
use crate::state::ResourceData;

const PROTOCOLS: &[&str] = &["ALL", "TCP", "UDP", "ICMP"];

pub struct SecurityGroupRuleResource;

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[async_trait::async_trait]
impl Resource for SecurityGroupRuleResource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_security_group_rule"
    }

    fn schema(&self) -> Schema {
        base_schema("Provides a resource to create a single security group policy.")
            .with_attribute(
                "security_group_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("ID of the security group to be queried."),
            )
            .with_attribute(
                "type",
                Attribute::required_string()
                    .with_force_new()
                    .with_validator(Validator::allowed_strings(["ingress", "egress"]))
                    .with_description("Type of the security group rule. Valid values: `ingress` and `egress`."),
            )
            .with_attribute(
                "cidr_ip",
                Attribute::optional_string()
                    .with_force_new()
                    .with_validator(Validator::IpOrCidr)
                    .with_description("An IP address network or segment, conflicts with `source_sgid`."),
            )
            .with_attribute(
                "ip_protocol",
                Attribute::optional_string()
                    .with_force_new()
                    .with_description("Type of IP protocol. Valid values: `TCP`, `UDP`, `ICMP` and `ALL`."),
            )
            .with_attribute(
                "port_range",
                Attribute::optional_string()
                    .with_force_new()
                    .with_validator(Validator::PortRange)
                    .with_description("Range of the port. Like `53`, `80,443` or `80-90`; `ALL` by default."),
            )
            .with_attribute(
                "policy",
                Attribute::required_string()
                    .with_force_new()
                    .with_validator(Validator::allowed_strings(["ACCEPT", "DROP", "accept", "drop"]))
                    .with_description("Rule policy of security group. Valid values: `ACCEPT` and `DROP`."),
            )
            .with_attribute(
                "source_sgid",
                Attribute::optional_string()
                    .with_force_new()
                    .with_description("ID of the nested security group, conflicts with `cidr_ip`."),
            )
            .with_attribute(
                "description",
                Attribute::optional_string().with_force_new(),
            )
    }

    fn validate(&self, config: &ResourceData) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        match (config.is_set("cidr_ip"), config.is_set("source_sgid")) {
            (true, true) => diagnostics.push(
                Diagnostic::error("`cidr_ip` conflicts with `source_sgid`").with_attribute("cidr_ip"),
            ),
            (false, false) => diagnostics.push(
                Diagnostic::error("one of `cidr_ip` or `source_sgid` must be set").with_attribute("cidr_ip"),
            ),
            _ => {},
        }

        if let Some(protocol) = config.get_str("ip_protocol") {
            let upper = protocol.to_ascii_uppercase();
            if !PROTOCOLS.contains(&upper.as_str()) {
                diagnostics.push(
                    Diagnostic::error(format!("invalid ip_protocol {}", protocol))
                        .with_detail("expected one of TCP, UDP, ICMP or ALL")
                        .with_attribute("ip_protocol"),
                );
            } else if matches!(upper.as_str(), "ALL" | "ICMP") {
                if let Some(port) = config.get_str("port_range").filter(|p| *p != "ALL") {
                    diagnostics.push(
                        Diagnostic::error(format!("when ip_protocol is {}, port_range must be ALL", upper))
                            .with_detail(format!("got port_range {}", port))
                            .with_attribute("port_range"),
                    );
                }
            }
        }

        diagnostics
    }

    async fn create(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let policy_type = RuleDirection::parse(d.require_str("type")?)?;
        let info = SecurityGroupRuleInfo {
            sg_id: d.require_str("security_group_id")?.to_string(),
            policy_type: policy_type.as_str().to_string(),
            cidr_ip: d.get_string("cidr_ip"),
            protocol: d.get_string("ip_protocol"),
            port_range: d.get_string("port_range"),
            action: d.require_str("policy")?.to_string(),
            source_sg_id: d.get_string("source_sgid"),
            description: d.get_string("description"),
        };

        let id = svc.create_security_group_policy(info).await?;
        d.set_id(id);
        Ok(())
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<bool, ProviderError> {
        let id = d.require_id()?.to_string();
        let Some((info, _)) = svc.describe_security_group_policy(&id).await? else {
            warn!(rule_id = %id, "security group rule not found");
            return Ok(false);
        };

        // Attributes come from the ID, the API normalizes protocol and port.
        if !d.is_set("security_group_id") {
            d.set("security_group_id", info.sg_id);
            d.set("type", info.policy_type);
            d.set("policy", info.action);
            d.set_opt("cidr_ip", non_empty(info.cidr_ip));
            d.set_opt("ip_protocol", non_empty(info.protocol));
            d.set_opt("port_range", non_empty(info.port_range));
            d.set_opt("source_sgid", non_empty(info.source_sg_id));
            d.set_opt("description", non_empty(info.description));
        }
        Ok(true)
    }

    async fn delete(&self, svc: &VpcService, d: &ResourceData) -> Result<(), ProviderError> {
        svc.delete_security_group_policy(d.require_id()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: serde_json::Value) -> ResourceData {
        ResourceData::from_value(value).unwrap()
    }

    #[test]
    fn test_validate_source_exclusive() {
        let rule = SecurityGroupRuleResource;
        let both = config(json!({
            "security_group_id": "sg-1",
            "type": "ingress",
            "policy": "ACCEPT",
            "cidr_ip": "10.0.0.0/8",
            "source_sgid": "sg-2",
        }));
        assert_eq!(rule.validate(&both).len(), 1);

        let neither = config(json!({"security_group_id": "sg-1", "type": "ingress", "policy": "ACCEPT"}));
        assert_eq!(rule.validate(&neither).len(), 1);
    }

    #[test]
    fn test_validate_port_for_icmp() {
        let rule = SecurityGroupRuleResource;
        let icmp = config(json!({
            "security_group_id": "sg-1",
            "type": "ingress",
            "policy": "ACCEPT",
            "cidr_ip": "10.0.0.0/8",
            "ip_protocol": "icmp",
            "port_range": "80",
        }));
        let diagnostics = rule.validate(&icmp);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("port_range"));

        let tcp = config(json!({
            "security_group_id": "sg-1",
            "type": "ingress",
            "policy": "ACCEPT",
            "cidr_ip": "10.0.0.0/8",
            "ip_protocol": "tcp",
            "port_range": "80-90",
        }));
        assert!(rule.validate(&tcp).is_empty());
    }
}
