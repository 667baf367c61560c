use serde_json::json;

use super::{base_schema, finish, DataSource};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};
use crate::service::models::{tags_to_map, Filter};
use crate::service::{push_filter, push_tag_filters, VpcService};
use crate::state::ResourceData;

pub struct EnisDataSource;

#[async_trait::async_trait]
impl DataSource for EnisDataSource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_enis"
    }

    fn schema(&self) -> Schema {
        let ipv4 = AttributeType::object([
            ("ip", AttributeType::String),
            ("primary", AttributeType::Bool),
            ("description", AttributeType::String),
        ]);

        base_schema("Use this data source to query elastic network interfaces.")
            .with_attribute("ids", Attribute::optional_string_set().with_description("ID of the ENIs to be queried."))
            .with_attribute("vpc_id", Attribute::optional_string())
            .with_attribute("subnet_id", Attribute::optional_string())
            .with_attribute("instance_id", Attribute::optional_string())
            .with_attribute("security_group", Attribute::optional_string())
            .with_attribute("name", Attribute::optional_string())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("ipv4", Attribute::optional_string())
            .with_attribute("tags", Attribute::optional_string_map())
            .with_attribute(
                "enis",
                Attribute::computed_object_list([
                    ("id", AttributeType::String),
                    ("name", AttributeType::String),
                    ("vpc_id", AttributeType::String),
                    ("subnet_id", AttributeType::String),
                    ("description", AttributeType::String),
                    ("primary", AttributeType::Bool),
                    ("mac", AttributeType::String),
                    ("state", AttributeType::String),
                    ("instance_id", AttributeType::String),
                    ("security_groups", AttributeType::list(AttributeType::String)),
                    ("ipv4s", AttributeType::list(ipv4)),
                    ("tags", AttributeType::map(AttributeType::String)),
                    ("create_time", AttributeType::String),
                ]),
            )
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let mut filters = Vec::new();
        let ids = d.get_string_list("ids");
        if !ids.is_empty() {
            filters.push(Filter {
                name: "network-interface-id".to_string(),
                values: ids,
            });
        }
        push_filter(&mut filters, "vpc-id", d.get_str("vpc_id"));
        push_filter(&mut filters, "subnet-id", d.get_str("subnet_id"));
        push_filter(&mut filters, "attachment.instance-id", d.get_str("instance_id"));
        push_filter(&mut filters, "groups.security-group-id", d.get_str("security_group"));
        push_filter(&mut filters, "network-interface-name", d.get_str("name"));
        push_filter(&mut filters, "network-interface-description", d.get_str("description"));
        push_filter(&mut filters, "address-ip", d.get_str("ipv4"));
        push_tag_filters(&mut filters, &d.get_string_map("tags"));

        let enis = svc.describe_enis(filters).await?;

        let ids: Vec<String> = enis.iter().map(|e| e.network_interface_id.clone()).collect();
        let items = enis
            .into_iter()
            .map(|eni| {
                let ipv4s = eni
                    .private_ip_address_set
                    .iter()
                    .map(|ip| {
                        json!({
                            "ip": ip.private_ip_address,
                            "primary": ip.primary,
                            "description": ip.description,
                        })
                    })
                    .collect::<Vec<_>>();

                let mut item = ResourceData::new();
                item.set("instance_id", eni.attached_instance().unwrap_or_default().to_string());
                item.set("id", eni.network_interface_id);
                item.set("name", eni.network_interface_name);
                item.set("vpc_id", eni.vpc_id);
                item.set("subnet_id", eni.subnet_id);
                item.set("description", eni.network_interface_description);
                item.set("primary", eni.primary);
                item.set("mac", eni.mac_address);
                item.set("state", eni.state);
                item.set("security_groups", eni.group_set);
                item.set("ipv4s", ipv4s);
                item.set("tags", json!(tags_to_map(&eni.tag_set)));
                item.set("create_time", eni.created_time);
                item
            })
            .collect();

        finish(d, "enis", &ids, items).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::data_resource_ids_hash;
    use crate::service::test_support::{ok, service};
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer};

    #[tokio::test]
    async fn test_filters_and_flattens_enis() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DescribeNetworkInterfaces"))
            .and(body_partial_json(json!({
                "Filters": [
                    {"Name": "network-interface-id", "Values": ["eni-1", "eni-2"]},
                    {"Name": "vpc-id", "Values": ["vpc-1"]},
                    {"Name": "tag:env", "Values": ["prod"]}
                ],
                "Offset": 0,
                "Limit": 100
            })))
            .respond_with(ok(json!({
                "TotalCount": 2,
                "NetworkInterfaceSet": [
                    {
                        "NetworkInterfaceId": "eni-1",
                        "VpcId": "vpc-1",
                        "State": "AVAILABLE",
                        "GroupSet": ["sg-1"],
                        "Attachment": {"InstanceId": "ins-1"},
                        "PrivateIpAddressSet": [{"PrivateIpAddress": "10.0.0.5", "Primary": true}],
                        "TagSet": [{"Key": "env", "Value": "prod"}]
                    },
                    {"NetworkInterfaceId": "eni-2", "VpcId": "vpc-1", "State": "AVAILABLE"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let svc = service(&server);
        let mut d = ResourceData::from_value(json!({
            "ids": ["eni-1", "eni-2"],
            "vpc_id": "vpc-1",
            "tags": {"env": "prod"},
        }))
        .unwrap();
        EnisDataSource.read(&svc, &mut d).await.unwrap();

        let enis = d.get_list("enis");
        assert_eq!(enis.len(), 2);
        assert_eq!(enis[0].get_str("instance_id"), Some("ins-1"));
        assert_eq!(enis[0].get_string_list("security_groups"), vec!["sg-1"]);
        assert_eq!(enis[0].get("ipv4s").unwrap()[0]["ip"], "10.0.0.5");
        assert_eq!(enis[1].get_str("instance_id"), Some(""));
        assert_eq!(d.id(), Some(data_resource_ids_hash(&["eni-1", "eni-2"]).as_str()));
    }

    #[tokio::test]
    async fn test_no_match_is_an_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DescribeNetworkInterfaces"))
            .respond_with(ok(json!({"TotalCount": 0, "NetworkInterfaceSet": []})))
            .mount(&server)
            .await;

        let svc = service(&server);
        let mut d = ResourceData::from_value(json!({"name": "nothing"})).unwrap();
        EnisDataSource.read(&svc, &mut d).await.unwrap();
        assert!(d.get_list("enis").is_empty());
        assert_eq!(d.id(), Some(data_resource_ids_hash::<String>(&[]).as_str()));
    }
}
