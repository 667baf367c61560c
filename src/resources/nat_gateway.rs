use std::collections::BTreeSet;

use serde_json::json;
use tracing::{info, warn};

use super::{base_schema, tags_attribute, update_tags, Resource};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Diagnostic, Schema, Validator};
use crate::service::models::tags_to_map;
use crate::service::{NatGatewaySpec, VpcService, TAG_SERVICE_VPC};
use crate::state::ResourceData;

const MAX_CONCURRENT: &[i64] = &[1_000_000, 3_000_000, 10_000_000];
const BANDWIDTHS: &[i64] = &[20, 50, 100, 200, 500, 1000, 2000, 5000];
const MAX_EIPS: usize = 10;

pub struct NatGatewayResource;

#[async_trait::async_trait]
impl Resource for NatGatewayResource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_nat_gateway"
    }

    fn schema(&self) -> Schema {
        base_schema("Provides a resource to create a NAT gateway.")
            .with_attribute(
                "vpc_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("ID of the vpc."),
            )
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_validator(Validator::string_length(1, 60))
                    .with_description("Name of the NAT gateway."),
            )
            .with_attribute(
                "max_concurrent",
                Attribute::optional_int64()
                    .with_default(json!(1_000_000))
                    .with_validator(Validator::allowed_ints(MAX_CONCURRENT))
                    .with_description("The upper limit of concurrent connection of NAT gateway."),
            )
            .with_attribute(
                "bandwidth",
                Attribute::optional_int64()
                    .with_default(json!(100))
                    .with_validator(Validator::allowed_ints(BANDWIDTHS))
                    .with_description("The maximum public network output bandwidth of NAT gateway (unit: Mbps)."),
            )
            .with_attribute(
                "assigned_eip_set",
                Attribute::new(AttributeType::set(AttributeType::String), AttributeFlags::required())
                    .with_description("EIP IP address set bound to the gateway. The value of at least 1 and at most 10."),
            )
            .with_attribute(
                "zone",
                Attribute::optional_computed_string()
                    .with_force_new()
                    .with_description("The availability zone, such as `ap-guangzhou-3`."),
            )
            .with_attribute("tags", tags_attribute())
            .with_attribute("created_time", Attribute::computed_string())
    }

    fn validate(&self, config: &ResourceData) -> Vec<Diagnostic> {
        let eips = config.get_string_list("assigned_eip_set");
        if eips.is_empty() || eips.len() > MAX_EIPS {
            return vec![Diagnostic::error(format!(
                "`assigned_eip_set` must hold between 1 and {} addresses, got {}",
                MAX_EIPS,
                eips.len()
            ))
            .with_attribute("assigned_eip_set")];
        }
        Vec::new()
    }

    async fn create(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let spec = NatGatewaySpec {
            vpc_id: d.require_str("vpc_id")?.to_string(),
            name: d.require_str("name")?.to_string(),
            max_concurrent: d.get_i64("max_concurrent").unwrap_or(MAX_CONCURRENT[0]),
            bandwidth: d.get_i64("bandwidth").unwrap_or(100),
            assigned_eip_set: d.get_string_list("assigned_eip_set"),
            zone: d.get_string("zone"),
            tags: d.get_string_map("tags"),
        };

        let id = svc.create_nat_gateway(&spec).await?;
        d.set_id(id);
        Ok(())
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<bool, ProviderError> {
        let id = d.require_id()?.to_string();
        let Some(nat) = svc.describe_nat_gateway(&id).await? else {
            warn!(nat_gateway_id = %id, "nat gateway not found");
            return Ok(false);
        };

        let eips: Vec<String> = nat
            .public_ip_address_set
            .iter()
            .map(|a| a.public_ip_address.clone())
            .collect();

        d.set("vpc_id", nat.vpc_id);
        d.set("name", nat.nat_gateway_name);
        d.set("max_concurrent", nat.max_concurrent_connection);
        d.set("bandwidth", nat.internet_max_bandwidth_out);
        d.set("assigned_eip_set", eips);
        d.set("zone", nat.zone);
        d.set("created_time", nat.created_time);
        d.set_string_map("tags", &tags_to_map(&nat.tag_set));
        Ok(true)
    }

    async fn update(
        &self,
        svc: &VpcService,
        prior: &ResourceData,
        d: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        let id = d.require_id()?.to_string();

        if d.has_changes(prior, &["name", "bandwidth"]) {
            svc.modify_nat_gateway(
                &id,
                d.require_str("name")?,
                d.get_i64("bandwidth").unwrap_or(100),
            )
            .await?;
        }

        if d.has_change(prior, "max_concurrent") {
            let old = prior.get_i64("max_concurrent").unwrap_or(MAX_CONCURRENT[0]);
            let new = d.get_i64("max_concurrent").unwrap_or(MAX_CONCURRENT[0]);
            if new < old {
                return Err(ProviderError::InvalidRequest(format!(
                    "max_concurrent can only be increased, got {} -> {}",
                    old, new
                )));
            }
            svc.reset_nat_gateway_connection(&id, new).await?;
        }

        if d.has_set_change(prior, "assigned_eip_set") {
            let old: BTreeSet<String> = prior.get_string_list("assigned_eip_set").into_iter().collect();
            let new: BTreeSet<String> = d.get_string_list("assigned_eip_set").into_iter().collect();
            let added: Vec<String> = new.difference(&old).cloned().collect();
            let removed: Vec<String> = old.difference(&new).cloned().collect();

            // associate first so the gateway never ends up without an address
            svc.associate_nat_gateway_addresses(&id, &added).await?;
            svc.disassociate_nat_gateway_addresses(&id, &removed).await?;
            info!(nat_gateway_id = %id, added = added.len(), removed = removed.len(), "updated nat gateway addresses");
        }

        update_tags(svc, TAG_SERVICE_VPC, "nat", prior, d).await
    }

    async fn delete(&self, svc: &VpcService, d: &ResourceData) -> Result<(), ProviderError> {
        svc.delete_nat_gateway(d.require_id()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::{actions, ok, service};
    use serde_json::Value;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer};

    fn nat_state(max_concurrent: i64, eips: &[&str]) -> ResourceData {
        ResourceData::from_value(json!({
            "id": "nat-1",
            "vpc_id": "vpc-1",
            "name": "egress",
            "bandwidth": 100,
            "max_concurrent": max_concurrent,
            "assigned_eip_set": eips,
        }))
        .unwrap()
    }

    async fn mount_available(server: &MockServer) {
        let body: Value = json!({
            "TotalCount": 1,
            "NatGatewaySet": [{"NatGatewayId": "nat-1", "State": "AVAILABLE"}]
        });
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DescribeNatGateways"))
            .respond_with(ok(body))
            .mount(server)
            .await;
    }

    #[test]
    fn test_validate_eip_count() {
        let nat = NatGatewayResource;
        let empty = ResourceData::from_value(json!({"assigned_eip_set": []})).unwrap();
        assert_eq!(nat.validate(&empty).len(), 1);

        let eips: Vec<String> = (0..11).map(|i| format!("1.1.1.{}", i)).collect();
        let many = ResourceData::from_value(json!({ "assigned_eip_set": eips })).unwrap();
        assert_eq!(nat.validate(&many).len(), 1);

        let ok = ResourceData::from_value(json!({"assigned_eip_set": ["1.1.1.1"]})).unwrap();
        assert!(nat.validate(&ok).is_empty());
    }

    #[test]
    fn test_schema_defaults() {
        let schema = NatGatewayResource.schema();
        assert_eq!(schema.attribute("bandwidth").unwrap().default, Some(json!(100)));
        assert_eq!(schema.attribute("max_concurrent").unwrap().default, Some(json!(1_000_000)));
    }

    #[tokio::test]
    async fn test_update_associates_before_disassociating() {
        let server = MockServer::start().await;
        mount_available(&server).await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "AssociateNatGatewayAddress"))
            .and(body_partial_json(json!({"NatGatewayId": "nat-1", "PublicIpAddresses": ["2.2.2.2"]})))
            .respond_with(ok(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DisassociateNatGatewayAddress"))
            .and(body_partial_json(json!({"NatGatewayId": "nat-1", "PublicIpAddresses": ["1.1.1.1"]})))
            .respond_with(ok(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let svc = service(&server);
        let prior = nat_state(1_000_000, &["1.1.1.1", "3.3.3.3"]);
        let mut d = nat_state(1_000_000, &["3.3.3.3", "2.2.2.2"]);
        NatGatewayResource.update(&svc, &prior, &mut d).await.unwrap();

        let calls = actions(&server).await;
        let associate = calls.iter().position(|a| a == "AssociateNatGatewayAddress").unwrap();
        let disassociate = calls.iter().position(|a| a == "DisassociateNatGatewayAddress").unwrap();
        assert!(associate < disassociate);
    }

    #[tokio::test]
    async fn test_update_ignores_reordered_eips() {
        let server = MockServer::start().await;
        let svc = service(&server);
        let prior = nat_state(1_000_000, &["1.1.1.1", "3.3.3.3"]);
        let mut d = nat_state(1_000_000, &["3.3.3.3", "1.1.1.1"]);
        NatGatewayResource.update(&svc, &prior, &mut d).await.unwrap();
        assert!(actions(&server).await.is_empty());
    }

    #[tokio::test]
    async fn test_max_concurrent_only_increases() {
        let server = MockServer::start().await;
        mount_available(&server).await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "ResetNatGatewayConnection"))
            .and(body_partial_json(json!({"NatGatewayId": "nat-1", "MaxConcurrentConnection": 3_000_000})))
            .respond_with(ok(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let svc = service(&server);
        let prior = nat_state(1_000_000, &["1.1.1.1"]);
        let mut grown = nat_state(3_000_000, &["1.1.1.1"]);
        NatGatewayResource.update(&svc, &prior, &mut grown).await.unwrap();

        let mut shrunk = nat_state(1_000_000, &["1.1.1.1"]);
        let err = NatGatewayResource.update(&svc, &grown, &mut shrunk).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
        assert!(err.to_string().contains("only be increased"));
    }

    #[tokio::test]
    async fn test_read_missing_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DescribeNatGateways"))
            .respond_with(ok(json!({"TotalCount": 0, "NatGatewaySet": []})))
            .mount(&server)
            .await;

        let svc = service(&server);
        let mut d = nat_state(1_000_000, &["1.1.1.1"]);
        assert!(!NatGatewayResource.read(&svc, &mut d).await.unwrap());
    }
}
