use super::{base_schema, finish, DataSource};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};
use crate::service::models::tags_to_map;
use crate::service::{push_filter, push_tag_filters, VpcService};
use crate::state::ResourceData;

pub struct SecurityGroupsDataSource;

#[async_trait::async_trait]
impl DataSource for SecurityGroupsDataSource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_security_groups"
    }

    fn schema(&self) -> Schema {
        base_schema("Use this data source to query security groups.")
            .with_attribute(
                "security_group_id",
                Attribute::optional_string().with_description("ID of the security group to be queried."),
            )
            .with_attribute("name", Attribute::optional_string())
            .with_attribute("project_id", Attribute::optional_int64())
            .with_attribute("tags", Attribute::optional_string_map())
            .with_attribute(
                "security_groups",
                Attribute::computed_object_list([
                    ("security_group_id", AttributeType::String),
                    ("name", AttributeType::String),
                    ("description", AttributeType::String),
                    ("project_id", AttributeType::Int64),
                    ("is_default", AttributeType::Bool),
                    ("create_time", AttributeType::String),
                    ("tags", AttributeType::map(AttributeType::String)),
                ]),
            )
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let mut filters = Vec::new();
        push_filter(&mut filters, "security-group-id", d.get_str("security_group_id"));
        push_filter(&mut filters, "security-group-name", d.get_str("name"));
        let project_id = d.get_i64("project_id").map(|p| p.to_string());
        push_filter(&mut filters, "project-id", project_id.as_deref());
        push_tag_filters(&mut filters, &d.get_string_map("tags"));

        let groups = svc.describe_security_groups(filters).await?;

        let ids: Vec<String> = groups.iter().map(|g| g.security_group_id.clone()).collect();
        let items = groups
            .into_iter()
            .map(|sg| {
                let mut item = ResourceData::new();
                item.set("security_group_id", sg.security_group_id);
                item.set("name", sg.security_group_name);
                item.set("description", sg.security_group_desc);
                item.set("project_id", sg.project_id.parse::<i64>().unwrap_or_default());
                item.set("is_default", sg.is_default);
                item.set("create_time", sg.created_time);
                item.set("tags", serde_json::json!(tags_to_map(&sg.tag_set)));
                item
            })
            .collect();

        finish(d, "security_groups", &ids, items).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::{ok, service};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer};

    #[tokio::test]
    async fn test_project_filter_and_output_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DescribeSecurityGroups"))
            .and(body_partial_json(json!({
                "Filters": [
                    {"Name": "security-group-name", "Values": ["web"]},
                    {"Name": "project-id", "Values": ["0"]}
                ],
                "Offset": "0",
                "Limit": "100"
            })))
            .respond_with(ok(json!({
                "TotalCount": 1,
                "SecurityGroupSet": [{
                    "SecurityGroupId": "sg-1",
                    "SecurityGroupName": "web",
                    "ProjectId": "0",
                    "IsDefault": false,
                    "TagSet": [{"Key": "team", "Value": "net"}]
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("groups.json");
        let svc = service(&server);
        let mut d = ResourceData::from_value(json!({
            "name": "web",
            "project_id": 0,
            "result_output_file": path.to_string_lossy(),
        }))
        .unwrap();
        SecurityGroupsDataSource.read(&svc, &mut d).await.unwrap();

        let groups = d.get_list("security_groups");
        assert_eq!(groups[0].get_i64("project_id"), Some(0));
        assert_eq!(groups[0].get_string_map("tags").len(), 1);

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written[0]["security_group_id"], "sg-1");
    }
}
