//! Security groups, their policies, and the two rule encodings handlers use.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::models::{map_to_tags, Filter, SecurityGroup, SecurityGroupPolicy, SecurityGroupPolicySet};
use super::{found, Paging, VpcService};
use crate::error::ProviderError;
use crate::helper::{is_ip_or_cidr, is_port_expression};

/// Direction of a security group policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleDirection {
    Ingress,
    Egress,
}

impl RuleDirection {
    pub fn parse(value: &str) -> Result<Self, ProviderError> {
        match value.to_ascii_lowercase().as_str() {
            "ingress" => Ok(Self::Ingress),
            "egress" => Ok(Self::Egress),
            other => Err(ProviderError::InvalidRequest(format!(
                "invalid policy type {}, expected `ingress` or `egress`",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ingress => "ingress",
            Self::Egress => "egress",
        }
    }

    fn policy_set(self, policy: SecurityGroupPolicy) -> SecurityGroupPolicySet {
        match self {
            Self::Ingress => SecurityGroupPolicySet {
                ingress: vec![policy],
                ..Default::default()
            },
            Self::Egress => SecurityGroupPolicySet {
                egress: vec![policy],
                ..Default::default()
            },
        }
    }

    fn select(self, set: SecurityGroupPolicySet) -> Vec<SecurityGroupPolicy> {
        match self {
            Self::Ingress => set.ingress,
            Self::Egress => set.egress,
        }
    }
}

/// Everything that identifies one `tencentcloud_security_group_rule`.
///
/// Serialized as JSON and base64-encoded to form the resource ID, so field
/// names and their order are part of the ID format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupRuleInfo {
    pub sg_id: String,
    pub policy_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr_ip: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub port_range: Option<String>,
    pub action: String,
    #[serde(default)]
    pub source_sg_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SecurityGroupRuleInfo {
    fn cidr_ip_or_empty(&self) -> &str {
        self.cidr_ip.as_deref().unwrap_or_default()
    }

    fn protocol_or_all(&self) -> &str {
        self.protocol.as_deref().unwrap_or("ALL")
    }

    fn port_range_or_all(&self) -> &str {
        self.port_range.as_deref().unwrap_or("ALL")
    }

    fn source_sg_id_or_empty(&self) -> &str {
        self.source_sg_id.as_deref().unwrap_or_default()
    }

    /// Fill the fields the API reports with defaults once the rule exists.
    fn normalized(mut self) -> Self {
        self.cidr_ip.get_or_insert_with(String::new);
        self.protocol.get_or_insert_with(|| "ALL".to_string());
        self.port_range.get_or_insert_with(|| "ALL".to_string());
        self.source_sg_id.get_or_insert_with(String::new);
        self
    }

    /// Whether a policy returned by the API is this rule.
    pub fn matches(&self, policy: &SecurityGroupPolicy) -> bool {
        policy.cidr_block == self.cidr_ip_or_empty()
            && policy.port == self.port_range_or_all()
            && policy.protocol.eq_ignore_ascii_case(self.protocol_or_all())
            && policy.security_group_id == self.source_sg_id_or_empty()
            && policy.action.eq_ignore_ascii_case(&self.action)
    }

    fn create_policy(&self) -> SecurityGroupPolicy {
        SecurityGroupPolicy {
            protocol: self.protocol.as_deref().map(str::to_ascii_uppercase).unwrap_or_default(),
            port: self.port_range.clone().unwrap_or_default(),
            cidr_block: self.cidr_ip.clone().unwrap_or_default(),
            security_group_id: self.source_sg_id.clone().unwrap_or_default(),
            action: self.action.to_ascii_uppercase(),
            policy_description: self.description.clone().unwrap_or_default(),
            policy_index: None,
        }
    }

    fn delete_policy(&self) -> SecurityGroupPolicy {
        let protocol = self.protocol_or_all();
        let port = self.port_range_or_all();
        SecurityGroupPolicy {
            action: self.action.to_ascii_uppercase(),
            cidr_block: self.cidr_ip_or_empty().to_string(),
            protocol: if protocol == "ALL" { String::new() } else { protocol.to_ascii_uppercase() },
            port: if port == "ALL" { String::new() } else { port.to_string() },
            security_group_id: self.source_sg_id_or_empty().to_string(),
            ..Default::default()
        }
    }
}

/// Encode a rule as its resource ID.
pub fn build_security_group_rule_id(info: &SecurityGroupRuleInfo) -> Result<String, ProviderError> {
    let raw = serde_json::to_vec(info)?;
    Ok(STANDARD.encode(raw))
}

/// Decode a rule ID, accepting both the base64 JSON form and the older
/// `sgId=..&direction=..&...` form.
pub fn parse_security_group_rule_id(rule_id: &str) -> Result<SecurityGroupRuleInfo, ProviderError> {
    if let Ok(raw) = STANDARD.decode(rule_id) {
        return serde_json::from_slice(&raw).map_err(|e| {
            ProviderError::InvalidRequest(format!("security group rule id `{}` is invalid: {}", rule_id, e))
        });
    }

    let mut fields = HashMap::new();
    for pair in rule_id.split('&') {
        let mut parts = pair.split('=');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(value), None) => {
                fields.insert(key, value);
            },
            _ => {
                return Err(ProviderError::InvalidRequest(format!(
                    "security group rule id `{}` is invalid",
                    rule_id
                )))
            },
        }
    }

    let field = |key: &str| fields.get(key).copied().unwrap_or_default().to_string();
    let source_sg_id = field("sourceSgid");
    let cidr_ip = if source_sg_id.is_empty() { field("cidrIp") } else { String::new() };

    Ok(SecurityGroupRuleInfo {
        sg_id: field("sgId"),
        policy_type: field("direction"),
        cidr_ip: Some(cidr_ip),
        protocol: Some(field("ipProtocol")),
        port_range: Some(field("portRange")),
        action: field("action"),
        source_sg_id: Some(source_sg_id),
        description: Some(field("description")),
    })
}

/// A rule in the compact `ACTION#CIDR#PORT#PROTOCOL` form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LiteRule {
    pub action: String,
    pub cidr_ip: String,
    /// Empty when the protocol is `ALL` or `ICMP`.
    pub port: String,
    pub protocol: String,
    /// Set for rules that reference another security group.
    pub nested_security_group_id: String,
}

impl fmt::Display for LiteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.nested_security_group_id.is_empty() {
            return f.write_str(&self.nested_security_group_id);
        }
        let port = if self.port.is_empty() { "ALL" } else { self.port.as_str() };
        write!(f, "{}#{}#{}#{}", self.action, self.cidr_ip, port, self.protocol)
    }
}

impl LiteRule {
    fn from_policy(policy: &SecurityGroupPolicy) -> Self {
        Self {
            action: policy.action.clone(),
            cidr_ip: policy.cidr_block.clone(),
            port: policy.port.clone(),
            protocol: policy.protocol.to_ascii_uppercase(),
            nested_security_group_id: policy.security_group_id.clone(),
        }
    }

    fn to_policy(&self) -> SecurityGroupPolicy {
        SecurityGroupPolicy {
            protocol: self.protocol.clone(),
            cidr_block: self.cidr_ip.clone(),
            action: self.action.clone(),
            port: self.port.clone(),
            ..Default::default()
        }
    }
}

/// Parse an `ACTION#CIDR#PORT#PROTOCOL` rule.
pub fn parse_lite_rule(rule: &str) -> Result<LiteRule, ProviderError> {
    let parts: Vec<&str> = rule.split('#').collect();
    let [action, cidr_ip, port, protocol] = parts.as_slice() else {
        return Err(ProviderError::Validation(format!("invalid security group rule {}", rule)));
    };

    if !matches!(*action, "ACCEPT" | "DROP") {
        return Err(ProviderError::Validation(format!(
            "invalid action {}, allow action is `ACCEPT` or `DROP`",
            action
        )));
    }

    if !is_ip_or_cidr(cidr_ip) {
        return Err(ProviderError::Validation(format!(
            "invalid cidr_ip {}, allow cidr_ip format is `8.8.8.8` or `10.0.1.0/24`",
            cidr_ip
        )));
    }

    if *port != "ALL" && !is_port_expression(port) {
        return Err(ProviderError::Validation(format!(
            "invalid port {}, allow port format is `ALL`, `53`, `80,443` or `80-90`",
            port
        )));
    }

    let port = match *protocol {
        "ALL" | "ICMP" => {
            if *port != "ALL" {
                return Err(ProviderError::Validation(format!(
                    "when protocol is {}, port must be ALL",
                    protocol
                )));
            }
            String::new()
        },
        "TCP" | "UDP" => port.to_string(),
        other => {
            return Err(ProviderError::Validation(format!(
                "invalid protocol {}, allow protocol is `ALL`, `TCP`, `UDP` or `ICMP`",
                other
            )))
        },
    };

    Ok(LiteRule {
        action: action.to_string(),
        cidr_ip: cidr_ip.to_string(),
        port,
        protocol: protocol.to_string(),
        nested_security_group_id: String::new(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateSecurityGroupResponse {
    security_group: SecurityGroup,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribePoliciesResponse {
    #[serde(default)]
    security_group_policy_set: Option<SecurityGroupPolicySet>,
}

impl VpcService {
    pub async fn create_security_group(
        &self,
        name: &str,
        description: &str,
        project_id: Option<i64>,
        tags: &BTreeMap<String, String>,
    ) -> Result<String, ProviderError> {
        let mut request = json!({
            "GroupName": name,
            "GroupDescription": description,
        });
        if let Some(project_id) = project_id {
            request["ProjectId"] = json!(project_id.to_string());
        }
        if !tags.is_empty() {
            request["Tags"] = json!(map_to_tags(tags));
        }

        let response: CreateSecurityGroupResponse =
            self.write("CreateSecurityGroup", &request).await?;
        let id = response.security_group.security_group_id;
        info!(security_group_id = %id, "created security group");
        Ok(id)
    }

    pub async fn describe_security_group(&self, id: &str) -> Result<Option<SecurityGroup>, ProviderError> {
        let groups: Vec<SecurityGroup> = match found(
            self.describe_all(
                "DescribeSecurityGroups",
                json!({"SecurityGroupIds": [id]}),
                "SecurityGroupSet",
                Paging::Strings,
            )
            .await,
        )? {
            Some(groups) => groups,
            None => return Ok(None),
        };
        Ok(groups.into_iter().find(|g| g.security_group_id == id))
    }

    pub async fn describe_security_groups(&self, filters: Vec<Filter>) -> Result<Vec<SecurityGroup>, ProviderError> {
        let request = if filters.is_empty() { json!({}) } else { json!({"Filters": filters}) };
        self.describe_all("DescribeSecurityGroups", request, "SecurityGroupSet", Paging::Strings)
            .await
    }

    pub async fn modify_security_group(
        &self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<(), ProviderError> {
        let mut request = json!({"SecurityGroupId": id});
        if let Some(name) = name {
            request["GroupName"] = json!(name);
        }
        if let Some(description) = description {
            request["GroupDescription"] = json!(description);
        }
        let _: serde::de::IgnoredAny = self.write("ModifySecurityGroupAttribute", &request).await?;
        Ok(())
    }

    pub async fn delete_security_group(&self, id: &str) -> Result<(), ProviderError> {
        let _: serde::de::IgnoredAny = self
            .write("DeleteSecurityGroup", &json!({"SecurityGroupId": id}))
            .await?;
        info!(security_group_id = %id, "deleted security group");
        Ok(())
    }

    /// Policy set of a security group, `None` if the group is gone.
    pub async fn describe_security_group_policies(
        &self,
        sg_id: &str,
    ) -> Result<Option<SecurityGroupPolicySet>, ProviderError> {
        let response = found(
            self.read::<DescribePoliciesResponse>(
                "DescribeSecurityGroupPolicies",
                &json!({"SecurityGroupId": sg_id}),
            )
            .await,
        )?;
        Ok(response.map(|r| r.security_group_policy_set.unwrap_or_default()))
    }

    /// Create one policy and return the ID encoding it.
    pub async fn create_security_group_policy(
        &self,
        info: SecurityGroupRuleInfo,
    ) -> Result<String, ProviderError> {
        let direction = RuleDirection::parse(&info.policy_type)?;
        let request = json!({
            "SecurityGroupId": info.sg_id,
            "SecurityGroupPolicySet": direction.policy_set(info.create_policy()),
        });
        let _: serde::de::IgnoredAny = self.write("CreateSecurityGroupPolicies", &request).await?;
        build_security_group_rule_id(&info.normalized())
    }

    /// Find the policy a rule ID refers to.
    pub async fn describe_security_group_policy(
        &self,
        rule_id: &str,
    ) -> Result<Option<(SecurityGroupRuleInfo, SecurityGroupPolicy)>, ProviderError> {
        let info = parse_security_group_rule_id(rule_id)?;
        let direction = RuleDirection::parse(&info.policy_type)?;
        let Some(set) = self.describe_security_group_policies(&info.sg_id).await? else {
            return Ok(None);
        };

        let policy = direction.select(set).into_iter().find(|p| info.matches(p));
        if policy.is_none() {
            debug!(sg_id = %info.sg_id, "security group rule not found, it may have been changed outside");
        }
        Ok(policy.map(|p| (info, p)))
    }

    pub async fn delete_security_group_policy(&self, rule_id: &str) -> Result<(), ProviderError> {
        let info = parse_security_group_rule_id(rule_id)?.normalized();
        let direction = RuleDirection::parse(&info.policy_type)?;
        let request = json!({
            "SecurityGroupId": info.sg_id,
            "SecurityGroupPolicySet": direction.policy_set(info.delete_policy()),
        });
        let _: serde::de::IgnoredAny = self.write("DeleteSecurityGroupPolicies", &request).await?;
        Ok(())
    }

    /// Replace every policy of a security group with the given lite rules.
    pub async fn set_lite_rules(
        &self,
        sg_id: &str,
        ingress: &[LiteRule],
        egress: &[LiteRule],
    ) -> Result<(), ProviderError> {
        let set = SecurityGroupPolicySet {
            version: String::new(),
            ingress: ingress.iter().map(LiteRule::to_policy).collect(),
            egress: egress.iter().map(LiteRule::to_policy).collect(),
        };
        let request = json!({"SecurityGroupId": sg_id, "SecurityGroupPolicySet": set});
        let _: serde::de::IgnoredAny = self.write("ModifySecurityGroupPolicies", &request).await?;
        Ok(())
    }

    /// Current lite rules of a security group, `None` if the group is gone.
    pub async fn describe_lite_rules(
        &self,
        sg_id: &str,
    ) -> Result<Option<(Vec<LiteRule>, Vec<LiteRule>)>, ProviderError> {
        Ok(self.describe_security_group_policies(sg_id).await?.map(|set| {
            (
                set.ingress.iter().map(LiteRule::from_policy).collect(),
                set.egress.iter().map(LiteRule::from_policy).collect(),
            )
        }))
    }

    /// Remove every policy from a security group.
    pub async fn clear_lite_rules(&self, sg_id: &str) -> Result<(), ProviderError> {
        let request: Value = json!({
            "SecurityGroupId": sg_id,
            "SecurityGroupPolicySet": {"Version": "0"},
        });
        let _: serde::de::IgnoredAny = self.write("ModifySecurityGroupPolicies", &request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn info() -> SecurityGroupRuleInfo {
        SecurityGroupRuleInfo {
            sg_id: "sg-1".to_string(),
            policy_type: "ingress".to_string(),
            cidr_ip: Some("10.0.0.0/8".to_string()),
            protocol: Some("tcp".to_string()),
            port_range: Some("80".to_string()),
            action: "accept".to_string(),
            source_sg_id: None,
            description: None,
        }
    }

    #[test]
    fn test_rule_id_encodes_json() {
        let id = build_security_group_rule_id(&info().normalized()).unwrap();
        let raw = STANDARD.decode(&id).unwrap();
        assert_eq!(
            String::from_utf8(raw).unwrap(),
            r#"{"sg_id":"sg-1","policy_type":"ingress","cidr_ip":"10.0.0.0/8","protocol":"tcp","port_range":"80","action":"accept","source_sg_id":""}"#
        );
        assert_eq!(parse_security_group_rule_id(&id).unwrap(), info().normalized());
    }

    #[test]
    fn test_rule_id_defaults_missing_fields() {
        let rule = SecurityGroupRuleInfo {
            cidr_ip: None,
            protocol: None,
            port_range: None,
            source_sg_id: Some("sg-2".to_string()),
            ..info()
        }
        .normalized();
        assert_eq!(rule.cidr_ip.as_deref(), Some(""));
        assert_eq!(rule.protocol.as_deref(), Some("ALL"));
        assert_eq!(rule.port_range.as_deref(), Some("ALL"));
    }

    #[test]
    fn test_legacy_rule_id() {
        let parsed = parse_security_group_rule_id(
            "sgId=sg-1&direction=egress&action=DROP&cidrIp=1.1.1.1&sourceSgid=&ipProtocol=UDP&portRange=53&description=dns",
        )
        .unwrap();
        assert_eq!(parsed.sg_id, "sg-1");
        assert_eq!(parsed.policy_type, "egress");
        assert_eq!(parsed.cidr_ip.as_deref(), Some("1.1.1.1"));
        assert_eq!(parsed.port_range.as_deref(), Some("53"));
        assert_eq!(parsed.description.as_deref(), Some("dns"));

        let nested = parse_security_group_rule_id(
            "sgId=sg-1&direction=ingress&action=ACCEPT&cidrIp=1.1.1.1&sourceSgid=sg-9&ipProtocol=ALL&portRange=ALL&description=",
        )
        .unwrap();
        assert_eq!(nested.cidr_ip.as_deref(), Some(""));
        assert_eq!(nested.source_sg_id.as_deref(), Some("sg-9"));
    }

    #[test]
    fn test_invalid_rule_id() {
        assert!(parse_security_group_rule_id("sgId=sg-1&broken").is_err());
        assert!(parse_security_group_rule_id("a=b=c").is_err());
    }

    #[test]
    fn test_matches_policy() {
        let rule = info().normalized();
        let policy = SecurityGroupPolicy {
            protocol: "TCP".to_string(),
            port: "80".to_string(),
            cidr_block: "10.0.0.0/8".to_string(),
            action: "ACCEPT".to_string(),
            ..Default::default()
        };
        assert!(rule.matches(&policy));
        assert!(!rule.matches(&SecurityGroupPolicy {
            port: "443".to_string(),
            ..policy
        }));
    }

    #[test]
    fn test_parse_lite_rule_accepts_documented_forms() {
        let rule = parse_lite_rule("ACCEPT#192.168.1.0/24#80,443#TCP").unwrap();
        assert_eq!(rule.port, "80,443");
        assert_eq!(rule.to_string(), "ACCEPT#192.168.1.0/24#80,443#TCP");

        let rule = parse_lite_rule("DROP#8.8.8.8#ALL#ICMP").unwrap();
        assert_eq!(rule.port, "");
        assert_eq!(rule.to_string(), "DROP#8.8.8.8#ALL#ICMP");

        assert!(parse_lite_rule("ACCEPT#10.0.0.1#80-90#UDP").is_ok());
        assert!(parse_lite_rule("ACCEPT#0.0.0.0/0#ALL#ALL").is_ok());
    }

    #[test]
    fn test_parse_lite_rule_rejects_bad_input() {
        let cases = [
            ("ACCEPT#10.0.0.0/8#80", "invalid security group rule"),
            ("ALLOW#10.0.0.0/8#80#TCP", "invalid action ALLOW"),
            ("ACCEPT#10.0.0.300#80#TCP", "invalid cidr_ip"),
            ("ACCEPT#10.0.0.0/8#80:90#TCP", "invalid port"),
            ("ACCEPT#10.0.0.0/8#80#ICMP", "port must be ALL"),
            ("ACCEPT#10.0.0.0/8#80#GRE", "invalid protocol GRE"),
        ];
        for (rule, expected) in cases {
            let err = parse_lite_rule(rule).unwrap_err();
            assert!(err.to_string().contains(expected), "{}: {}", rule, err);
        }
    }

    #[tokio::test]
    async fn test_describe_policy_of_missing_group() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-tc-action", "DescribeSecurityGroupPolicies"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Response": {"Error": {"Code": "ResourceNotFound", "Message": "gone"}, "RequestId": "r"}
            })))
            .mount(&server)
            .await;

        let svc = test_support::service(&server);
        let id = build_security_group_rule_id(&info().normalized()).unwrap();
        assert!(svc.describe_security_group_policy(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_policy_uppercases_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-tc-action", "CreateSecurityGroupPolicies"))
            .and(body_partial_json(json!({
                "SecurityGroupId": "sg-1",
                "SecurityGroupPolicySet": {"Ingress": [{"Protocol": "TCP", "Action": "ACCEPT", "Port": "80"}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Response": {"RequestId": "r"}})))
            .expect(1)
            .mount(&server)
            .await;

        let svc = test_support::service(&server);
        let id = svc.create_security_group_policy(info()).await.unwrap();
        assert_eq!(parse_security_group_rule_id(&id).unwrap().source_sg_id.as_deref(), Some(""));
    }
}
