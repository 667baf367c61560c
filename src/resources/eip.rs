use serde_json::json;
use tracing::warn;

use super::{base_schema, tags_attribute, update_tags, Resource};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema, Validator};
use crate::service::models::tags_to_map;
use crate::service::{EipSpec, VpcService, TAG_SERVICE_CVM};
use crate::state::ResourceData;

pub struct EipResource;

#[async_trait::async_trait]
impl Resource for EipResource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_eip"
    }

    fn schema(&self) -> Schema {
        base_schema("Provides an EIP resource.")
            .with_attribute(
                "name",
                Attribute::optional_computed_string()
                    .with_validator(Validator::string_length(1, 20))
                    .with_description("The name of eip."),
            )
            .with_attribute(
                "type",
                Attribute::optional_string()
                    .with_force_new()
                    .with_default(json!("EIP"))
                    .with_validator(Validator::allowed_strings(["EIP", "AnycastEIP", "HighQualityEIP"]))
                    .with_description("The type of eip."),
            )
            .with_attribute(
                "internet_service_provider",
                Attribute::optional_computed_string()
                    .with_force_new()
                    .with_description("Internet service provider of eip, like `BGP`, `CMCC` or `CTCC`."),
            )
            .with_attribute(
                "internet_charge_type",
                Attribute::optional_computed_string()
                    .with_force_new()
                    .with_validator(Validator::allowed_strings([
                        "BANDWIDTH_PACKAGE",
                        "BANDWIDTH_POSTPAID_BY_HOUR",
                        "TRAFFIC_POSTPAID_BY_HOUR",
                    ]))
                    .with_description("The charge type of eip."),
            )
            .with_attribute(
                "internet_max_bandwidth_out",
                Attribute::optional_computed_int64()
                    .with_validator(Validator::int_range(1, 1000))
                    .with_description("The bandwidth limit of EIP, unit is Mbps."),
            )
            .with_attribute("tags", tags_attribute())
            .with_attribute(
                "public_ip",
                Attribute::computed_string().with_description("The elastic IP address."),
            )
            .with_attribute(
                "status",
                Attribute::computed_string().with_description("The EIP current status."),
            )
    }

    async fn create(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let spec = EipSpec {
            name: d.get_string("name"),
            address_type: d.get_string("type"),
            internet_service_provider: d.get_string("internet_service_provider"),
            internet_charge_type: d.get_string("internet_charge_type"),
            bandwidth: d.get_i64("internet_max_bandwidth_out"),
            tags: d.get_string_map("tags"),
        };

        let id = svc.create_eip(&spec).await?;
        d.set_id(id);
        Ok(())
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<bool, ProviderError> {
        let id = d.require_id()?.to_string();
        let Some(eip) = svc.describe_eip(&id).await? else {
            warn!(eip_id = %id, "eip not found");
            return Ok(false);
        };

        d.set("name", eip.address_name);
        d.set("type", eip.address_type);
        d.set("public_ip", eip.address_ip);
        d.set("status", eip.address_status);
        d.set("internet_service_provider", eip.internet_service_provider);
        d.set("internet_charge_type", eip.internet_charge_type);
        d.set_opt("internet_max_bandwidth_out", eip.bandwidth);
        d.set_string_map("tags", &tags_to_map(&eip.tag_set));
        Ok(true)
    }

    async fn update(
        &self,
        svc: &VpcService,
        prior: &ResourceData,
        d: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        let id = d.require_id()?.to_string();

        if d.has_change(prior, "name") {
            svc.modify_eip_name(&id, d.get_str("name").unwrap_or_default())
                .await?;
        }
        if d.has_change(prior, "internet_max_bandwidth_out") {
            if let Some(bandwidth) = d.get_i64("internet_max_bandwidth_out") {
                svc.modify_eip_bandwidth(&id, bandwidth).await?;
            }
        }

        update_tags(svc, TAG_SERVICE_CVM, "eip", prior, d).await
    }

    async fn delete(&self, svc: &VpcService, d: &ResourceData) -> Result<(), ProviderError> {
        let id = d.require_id()?;
        svc.disassociate_eip(id).await?;
        svc.delete_eip(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::{actions, ok, service};
    use serde_json::Value;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer};

    fn address(status: &str) -> Value {
        json!({
            "AddressId": "eip-1",
            "AddressName": "egress",
            "AddressIp": "43.1.1.1",
            "AddressStatus": status,
            "AddressType": "EIP",
            "InternetServiceProvider": "BGP",
            "InternetChargeType": "TRAFFIC_POSTPAID_BY_HOUR",
            "Bandwidth": 10
        })
    }

    async fn mount_address(server: &MockServer, status: &str) {
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DescribeAddresses"))
            .and(body_partial_json(json!({"AddressIds": ["eip-1"]})))
            .respond_with(ok(json!({"TotalCount": 1, "AddressSet": [address(status)]})))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_create_waits_until_unbound_and_reads() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "AllocateAddresses"))
            .and(body_partial_json(json!({"AddressCount": 1, "AddressName": "egress", "AddressType": "EIP"})))
            .respond_with(ok(json!({"AddressSet": ["eip-1"]})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DescribeAddresses"))
            .respond_with(ok(json!({"TotalCount": 1, "AddressSet": [address("CREATING")]})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_address(&server, "UNBIND").await;

        let svc = service(&server);
        let mut d = ResourceData::from_value(json!({"name": "egress", "type": "EIP"})).unwrap();
        EipResource.create(&svc, &mut d).await.unwrap();
        assert!(EipResource.read(&svc, &mut d).await.unwrap());

        assert_eq!(d.id(), Some("eip-1"));
        assert_eq!(d.get_str("public_ip"), Some("43.1.1.1"));
        assert_eq!(d.get_i64("internet_max_bandwidth_out"), Some(10));
        assert_eq!(d.get_str("status"), Some("UNBIND"));
    }

    #[tokio::test]
    async fn test_read_missing_address() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DescribeAddresses"))
            .respond_with(ok(json!({"TotalCount": 0, "AddressSet": []})))
            .mount(&server)
            .await;

        let svc = service(&server);
        let mut d = ResourceData::from_value(json!({"id": "eip-gone"})).unwrap();
        assert!(!EipResource.read(&svc, &mut d).await.unwrap());
    }

    #[tokio::test]
    async fn test_bandwidth_update_waits_for_task() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "ModifyAddressesBandwidth"))
            .and(body_partial_json(json!({"AddressIds": ["eip-1"], "InternetMaxBandwidthOut": 50})))
            .respond_with(ok(json!({"TaskId": "42"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DescribeTaskResult"))
            .and(body_partial_json(json!({"TaskId": 42})))
            .respond_with(ok(json!({"Result": "SUCCESS"})))
            .expect(1)
            .mount(&server)
            .await;

        let svc = service(&server);
        let prior = ResourceData::from_value(json!({"id": "eip-1", "name": "egress", "internet_max_bandwidth_out": 10}))
            .unwrap();
        let mut d = ResourceData::from_value(json!({"id": "eip-1", "name": "egress", "internet_max_bandwidth_out": 50}))
            .unwrap();
        EipResource.update(&svc, &prior, &mut d).await.unwrap();
        assert_eq!(actions(&server).await, vec!["ModifyAddressesBandwidth", "DescribeTaskResult"]);
    }

    #[tokio::test]
    async fn test_delete_unbinds_before_release() {
        let server = MockServer::start().await;
        mount_address(&server, "BIND").await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DisassociateAddress"))
            .respond_with(ok(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "ReleaseAddresses"))
            .and(body_partial_json(json!({"AddressIds": ["eip-1"]})))
            .respond_with(ok(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let svc = service(&server);
        let d = ResourceData::from_value(json!({"id": "eip-1"})).unwrap();
        EipResource.delete(&svc, &d).await.unwrap();
        assert_eq!(
            actions(&server).await,
            vec!["DescribeAddresses", "DisassociateAddress", "ReleaseAddresses"]
        );
    }
}
