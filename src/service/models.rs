//! Response structures of the VPC API (version 2017-03-12).
//!
//! Only the fields the handlers map are declared; everything defaults so a
//! sparse response still decodes.

use serde::{Deserialize, Serialize};

/// Objects that carry a unique ID in list responses.
pub trait HasId {
    fn id(&self) -> &str;
}

macro_rules! has_id {
    ($($ty:ty => $field:ident),* $(,)?) => {
        $(impl HasId for $ty {
            fn id(&self) -> &str {
                &self.$field
            }
        })*
    };
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Filter {
    pub name: String,
    pub values: Vec<String>,
}

impl Filter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: vec![value.into()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Vpc {
    pub vpc_id: String,
    pub vpc_name: String,
    pub cidr_block: String,
    pub is_default: bool,
    pub enable_multicast: bool,
    pub created_time: String,
    pub dns_server_set: Vec<String>,
    pub tag_set: Vec<Tag>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Subnet {
    pub vpc_id: String,
    pub subnet_id: String,
    pub subnet_name: String,
    pub cidr_block: String,
    pub is_default: bool,
    pub enable_broadcast: bool,
    pub zone: String,
    pub route_table_id: String,
    pub created_time: String,
    pub available_ip_address_count: i64,
    pub tag_set: Vec<Tag>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RouteTableAssociation {
    pub subnet_id: String,
    pub route_table_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Route {
    pub route_id: u64,
    pub destination_cidr_block: String,
    pub gateway_type: String,
    pub gateway_id: String,
    pub route_description: String,
    pub route_type: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RouteTable {
    pub vpc_id: String,
    pub route_table_id: String,
    pub route_table_name: String,
    pub association_set: Vec<RouteTableAssociation>,
    pub route_set: Vec<Route>,
    pub main: bool,
    pub created_time: String,
    pub tag_set: Vec<Tag>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SecurityGroup {
    pub security_group_id: String,
    pub security_group_name: String,
    pub security_group_desc: String,
    pub project_id: String,
    pub is_default: bool,
    pub created_time: String,
    pub tag_set: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SecurityGroupPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_index: Option<i64>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub port: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cidr_block: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub security_group_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub action: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub policy_description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SecurityGroupPolicySet {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    pub egress: Vec<SecurityGroupPolicy>,
    pub ingress: Vec<SecurityGroupPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PrivateIpAddressSpecification {
    pub private_ip_address: String,
    pub primary: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing)]
    pub public_ip_address: String,
    #[serde(skip_serializing)]
    pub state: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NetworkInterfaceAttachment {
    pub instance_id: String,
    pub device_index: i64,
    pub attach_time: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NetworkInterface {
    pub network_interface_id: String,
    pub network_interface_name: String,
    pub network_interface_description: String,
    pub subnet_id: String,
    pub vpc_id: String,
    pub group_set: Vec<String>,
    pub primary: bool,
    pub mac_address: String,
    pub state: String,
    pub private_ip_address_set: Vec<PrivateIpAddressSpecification>,
    pub attachment: Option<NetworkInterfaceAttachment>,
    pub zone: String,
    pub created_time: String,
    pub tag_set: Vec<Tag>,
}

impl NetworkInterface {
    pub fn attached_instance(&self) -> Option<&str> {
        self.attachment
            .as_ref()
            .map(|a| a.instance_id.as_str())
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NatGatewayAddress {
    pub address_id: String,
    pub public_ip_address: String,
    pub is_blocked: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NatGateway {
    pub nat_gateway_id: String,
    pub nat_gateway_name: String,
    pub created_time: String,
    pub state: String,
    pub internet_max_bandwidth_out: i64,
    pub max_concurrent_connection: i64,
    pub public_ip_address_set: Vec<NatGatewayAddress>,
    pub vpc_id: String,
    pub zone: String,
    pub subnet_id: String,
    pub tag_set: Vec<Tag>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Address {
    pub address_id: String,
    pub address_name: String,
    pub address_status: String,
    pub address_ip: String,
    pub address_type: String,
    pub instance_id: String,
    pub network_interface_id: String,
    pub private_address_ip: String,
    pub created_time: String,
    pub internet_service_provider: String,
    pub internet_charge_type: String,
    pub bandwidth: Option<i64>,
    pub tag_set: Vec<Tag>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PeerConnection {
    pub peering_connection_id: String,
    pub peering_connection_name: String,
    pub source_vpc_id: String,
    pub peer_vpc_id: String,
    pub state: String,
    pub create_time: String,
    pub bandwidth: i64,
    #[serde(rename = "Type")]
    pub connection_type: String,
    pub charge_type: String,
    pub qos_level: String,
    pub destination_region: String,
    pub uin: String,
    pub destination_uin: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AddressTemplate {
    pub address_template_id: String,
    pub address_template_name: String,
    pub address_set: Vec<String>,
    pub created_time: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AddressTemplateGroup {
    pub address_template_group_id: String,
    pub address_template_group_name: String,
    pub address_template_id_set: Vec<String>,
    pub created_time: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServiceTemplate {
    pub service_template_id: String,
    pub service_template_name: String,
    pub service_set: Vec<String>,
    pub created_time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BackupPolicy {
    pub backup_day: String,
    pub backup_time: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SnapshotPolicy {
    pub snapshot_policy_id: String,
    pub snapshot_policy_name: String,
    pub backup_type: String,
    pub keep_time: i64,
    pub create_new_cos: bool,
    pub cos_region: String,
    pub cos_bucket: String,
    pub backup_policies: Vec<BackupPolicy>,
    pub enable: bool,
    pub create_time: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VpcLimit {
    pub limit_type: String,
    pub limit_value: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AccountAttribute {
    pub attribute_name: String,
    pub attribute_values: Vec<String>,
}

has_id! {
    Vpc => vpc_id,
    Subnet => subnet_id,
    RouteTable => route_table_id,
    SecurityGroup => security_group_id,
    NetworkInterface => network_interface_id,
    NatGateway => nat_gateway_id,
    Address => address_id,
    PeerConnection => peering_connection_id,
    AddressTemplate => address_template_id,
    AddressTemplateGroup => address_template_group_id,
    ServiceTemplate => service_template_id,
    SnapshotPolicy => snapshot_policy_id,
}

/// Tags as a sorted map.
pub fn tags_to_map(tags: &[Tag]) -> std::collections::BTreeMap<String, String> {
    tags.iter()
        .map(|t| (t.key.clone(), t.value.clone()))
        .collect()
}

/// Tags as request entries.
pub fn map_to_tags(map: &std::collections::BTreeMap<String, String>) -> Vec<Tag> {
    map.iter()
        .map(|(k, v)| Tag {
            key: k.clone(),
            value: v.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sparse_vpc_decodes() {
        let vpc: Vpc = serde_json::from_value(json!({
            "VpcId": "vpc-1",
            "VpcName": "main",
            "CidrBlock": "10.0.0.0/16",
            "TagSet": [{"Key": "env", "Value": "dev"}]
        }))
        .unwrap();
        assert_eq!(vpc.id(), "vpc-1");
        assert!(!vpc.enable_multicast);
        assert_eq!(tags_to_map(&vpc.tag_set)["env"], "dev");
    }

    #[test]
    fn test_policy_serializes_only_set_fields() {
        let policy = SecurityGroupPolicy {
            protocol: "TCP".to_string(),
            port: "80".to_string(),
            cidr_block: "10.0.0.0/8".to_string(),
            action: "ACCEPT".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&policy).unwrap();
        assert_eq!(
            value,
            json!({"Protocol": "TCP", "Port": "80", "CidrBlock": "10.0.0.0/8", "Action": "ACCEPT"})
        );
    }

    #[test]
    fn test_eni_attachment() {
        let eni: NetworkInterface = serde_json::from_value(json!({
            "NetworkInterfaceId": "eni-1",
            "Attachment": {"InstanceId": "ins-1"}
        }))
        .unwrap();
        assert_eq!(eni.attached_instance(), Some("ins-1"));

        let eni: NetworkInterface =
            serde_json::from_value(json!({"NetworkInterfaceId": "eni-1", "Attachment": null})).unwrap();
        assert_eq!(eni.attached_instance(), None);
    }
}
