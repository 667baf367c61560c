use serde_json::json;
use tracing::warn;

use super::{base_schema, tags_attribute, update_tags, Resource};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema, Validator};
use crate::service::models::tags_to_map;
use crate::service::{VpcService, TAG_SERVICE_CVM};
use crate::state::ResourceData;

pub struct SecurityGroupResource;

#[async_trait::async_trait]
impl Resource for SecurityGroupResource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_security_group"
    }

    fn schema(&self) -> Schema {
        base_schema("Provides a resource to create a security group.")
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_validator(Validator::string_length(1, 60))
                    .with_description("Name of the security group to be queried."),
            )
            .with_attribute(
                "description",
                Attribute::optional_string()
                    .with_validator(Validator::string_length(0, 100))
                    .with_description("Description of the security group."),
            )
            .with_attribute(
                "project_id",
                Attribute::optional_computed_int64()
                    .with_force_new()
                    .with_default(json!(0))
                    .with_description("Project ID of the security group."),
            )
            .with_attribute("tags", tags_attribute())
    }

    async fn create(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let id = svc
            .create_security_group(
                d.require_str("name")?,
                d.get_str("description").unwrap_or_default(),
                d.get_i64("project_id"),
                &d.get_string_map("tags"),
            )
            .await?;
        d.set_id(id);
        Ok(())
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<bool, ProviderError> {
        let id = d.require_id()?.to_string();
        let Some(sg) = svc.describe_security_group(&id).await? else {
            warn!(security_group_id = %id, "security group not found");
            return Ok(false);
        };

        d.set("name", sg.security_group_name);
        d.set("description", sg.security_group_desc);
        d.set("project_id", sg.project_id.parse::<i64>().unwrap_or_default());
        d.set_string_map("tags", &tags_to_map(&sg.tag_set));
        Ok(true)
    }

    async fn update(
        &self,
        svc: &VpcService,
        prior: &ResourceData,
        d: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        let id = d.require_id()?.to_string();
        let name = d.has_change(prior, "name").then(|| d.get_str("name")).flatten();
        let description = d
            .has_change(prior, "description")
            .then(|| d.get_str("description").unwrap_or_default());

        if name.is_some() || description.is_some() {
            svc.modify_security_group(&id, name, description).await?;
        }
        update_tags(svc, TAG_SERVICE_CVM, "sg", prior, d).await
    }

    async fn delete(&self, svc: &VpcService, d: &ResourceData) -> Result<(), ProviderError> {
        svc.delete_security_group(d.require_id()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::{ok, service};
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer};

    #[tokio::test]
    async fn test_create_sends_project_as_string_and_reads_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "CreateSecurityGroup"))
            .and(body_partial_json(json!({"GroupName": "web", "GroupDescription": "", "ProjectId": "0"})))
            .respond_with(ok(json!({"SecurityGroup": {"SecurityGroupId": "sg-1"}})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DescribeSecurityGroups"))
            .and(body_partial_json(json!({"SecurityGroupIds": ["sg-1"]})))
            .respond_with(ok(json!({
                "TotalCount": 1,
                "SecurityGroupSet": [{
                    "SecurityGroupId": "sg-1",
                    "SecurityGroupName": "web",
                    "SecurityGroupDesc": "",
                    "ProjectId": "0",
                    "TagSet": [{"Key": "team", "Value": "net"}]
                }]
            })))
            .mount(&server)
            .await;

        let svc = service(&server);
        let mut d = ResourceData::from_value(json!({"name": "web", "project_id": 0})).unwrap();
        SecurityGroupResource.create(&svc, &mut d).await.unwrap();
        assert!(SecurityGroupResource.read(&svc, &mut d).await.unwrap());
        assert_eq!(d.id(), Some("sg-1"));
        assert_eq!(d.get_i64("project_id"), Some(0));
        assert_eq!(d.get_string_map("tags").get("team").map(String::as_str), Some("net"));
    }

    #[tokio::test]
    async fn test_read_missing_group() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DescribeSecurityGroups"))
            .respond_with(ok(json!({"TotalCount": 0, "SecurityGroupSet": []})))
            .mount(&server)
            .await;

        let svc = service(&server);
        let mut d = ResourceData::from_value(json!({"id": "sg-gone"})).unwrap();
        assert!(!SecurityGroupResource.read(&svc, &mut d).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_sends_only_changed_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "ModifySecurityGroupAttribute"))
            .and(body_partial_json(json!({"SecurityGroupId": "sg-1", "GroupDescription": "public web"})))
            .respond_with(ok(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DeleteSecurityGroup"))
            .respond_with(ok(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let svc = service(&server);
        let prior = ResourceData::from_value(json!({"id": "sg-1", "name": "web", "description": ""})).unwrap();
        let mut d =
            ResourceData::from_value(json!({"id": "sg-1", "name": "web", "description": "public web"})).unwrap();
        SecurityGroupResource.update(&svc, &prior, &mut d).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body.get("GroupName").is_none());

        // an empty description equals an unset one
        let unchanged = ResourceData::from_value(json!({"id": "sg-1", "name": "web"})).unwrap();
        SecurityGroupResource.update(&svc, &prior, &mut unchanged.clone()).await.unwrap();

        SecurityGroupResource.delete(&svc, &d).await.unwrap();
    }
}
