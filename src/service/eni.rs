//! Elastic network interfaces and their attachment to instances.

use std::collections::BTreeMap;

use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::models::{map_to_tags, Filter, NetworkInterface, PrivateIpAddressSpecification};
use super::{found, Paging, VpcService};
use crate::error::ProviderError;

/// State of an ENI that can be modified, attached or deleted.
pub const ENI_STATE_AVAILABLE: &str = "AVAILABLE";

/// Parameters of a new ENI.
#[derive(Debug, Clone, Default)]
pub struct EniSpec {
    pub name: String,
    pub vpc_id: String,
    pub subnet_id: String,
    pub description: String,
    pub security_groups: Vec<String>,
    /// Total number of IPv4 addresses when `ipv4s` is empty.
    pub ipv4_count: Option<i64>,
    pub ipv4s: Vec<PrivateIpAddressSpecification>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateNetworkInterfaceResponse {
    network_interface: NetworkInterface,
}

fn has_ips(eni: &NetworkInterface, want: &[String], drop: &[String]) -> bool {
    let current: Vec<&str> = eni
        .private_ip_address_set
        .iter()
        .map(|ip| ip.private_ip_address.as_str())
        .collect();
    want.iter().all(|ip| current.contains(&ip.as_str()))
        && drop.iter().all(|ip| !current.contains(&ip.as_str()))
}

impl VpcService {
    /// Create an ENI and wait until it is available with the requested addresses.
    pub async fn create_eni(&self, spec: &EniSpec) -> Result<String, ProviderError> {
        let mut request = json!({
            "NetworkInterfaceName": spec.name,
            "VpcId": spec.vpc_id,
            "SubnetId": spec.subnet_id,
            "NetworkInterfaceDescription": spec.description,
        });
        if !spec.security_groups.is_empty() {
            request["SecurityGroupIds"] = json!(spec.security_groups);
        }
        if !spec.ipv4s.is_empty() {
            request["PrivateIpAddresses"] = json!(spec.ipv4s);
        } else if let Some(count) = spec.ipv4_count {
            // the primary address is always assigned
            request["SecondaryPrivateIpAddressCount"] = json!(count - 1);
        }
        if !spec.tags.is_empty() {
            request["Tags"] = json!(map_to_tags(&spec.tags));
        }

        let response: CreateNetworkInterfaceResponse =
            self.write("CreateNetworkInterface", &request).await?;
        let eni = response.network_interface;
        let id = eni.network_interface_id.clone();
        info!(eni_id = %id, "created eni");

        let settled = async {
            let want: Vec<String> = if spec.ipv4s.is_empty() {
                eni.private_ip_address_set
                    .iter()
                    .map(|ip| ip.private_ip_address.clone())
                    .collect()
            } else {
                let want: Vec<String> = spec.ipv4s.iter().map(|ip| ip.private_ip_address.clone()).collect();
                if !has_ips(&eni, &want, &[]) {
                    return Err(ProviderError::Sdk(format!(
                        "CreateNetworkInterface did not assign all requested addresses to {}",
                        id
                    )));
                }
                want
            };
            if let Some(count) = spec.ipv4_count.filter(|_| spec.ipv4s.is_empty()) {
                if want.len() as i64 != count {
                    return Err(ProviderError::Sdk(format!(
                        "CreateNetworkInterface assigned {} addresses, expected {}",
                        want.len(),
                        count
                    )));
                }
            }
            self.wait_eni_ready(&id, &want, &[]).await
        };
        settled
            .await
            .map_err(|e| e.with_partial_state(json!({ "id": id })))?;
        Ok(id)
    }

    pub async fn describe_eni(&self, id: &str) -> Result<Option<NetworkInterface>, ProviderError> {
        let enis: Option<Vec<NetworkInterface>> = found(
            self.describe_all(
                "DescribeNetworkInterfaces",
                json!({"NetworkInterfaceIds": [id]}),
                "NetworkInterfaceSet",
                Paging::Integers,
            )
            .await,
        )?;
        Ok(enis.and_then(|e| e.into_iter().find(|eni| eni.network_interface_id == id)))
    }

    pub async fn describe_enis(&self, filters: Vec<Filter>) -> Result<Vec<NetworkInterface>, ProviderError> {
        let request = if filters.is_empty() { json!({}) } else { json!({"Filters": filters}) };
        self.describe_all("DescribeNetworkInterfaces", request, "NetworkInterfaceSet", Paging::Integers)
            .await
    }

    /// Wait until the ENI is `AVAILABLE`, holds `want` and none of `drop`.
    pub async fn wait_eni_ready(&self, id: &str, want: &[String], drop: &[String]) -> Result<(), ProviderError> {
        let what = format!("eni {} to become {}", id, ENI_STATE_AVAILABLE);
        self.wait_until(self.policy().read_timeout, &what, || async move {
            let eni = self
                .describe_eni(id)
                .await?
                .ok_or_else(|| ProviderError::NotFound(format!("eni {}", id)))?;
            Ok(eni.state == ENI_STATE_AVAILABLE && has_ips(&eni, want, drop))
        })
        .await
    }

    pub async fn modify_eni(
        &self,
        id: &str,
        name: &str,
        description: &str,
        security_groups: &[String],
    ) -> Result<(), ProviderError> {
        let request = json!({
            "NetworkInterfaceId": id,
            "NetworkInterfaceName": name,
            "NetworkInterfaceDescription": description,
            "SecurityGroupIds": security_groups,
        });
        let _: IgnoredAny = self.write("ModifyNetworkInterfaceAttribute", &request).await?;
        Ok(())
    }

    /// Assign specific secondary addresses, or `count` new ones.
    pub async fn assign_eni_ipv4s(
        &self,
        id: &str,
        ipv4s: &[PrivateIpAddressSpecification],
        count: Option<i64>,
    ) -> Result<(), ProviderError> {
        let mut request = json!({"NetworkInterfaceId": id});
        if !ipv4s.is_empty() {
            request["PrivateIpAddresses"] = json!(ipv4s);
        }
        if let Some(count) = count.filter(|c| *c > 0) {
            request["SecondaryPrivateIpAddressCount"] = json!(count);
        }
        let _: IgnoredAny = self.write("AssignPrivateIpAddresses", &request).await?;

        let want: Vec<String> = ipv4s.iter().map(|ip| ip.private_ip_address.clone()).collect();
        self.wait_eni_ready(id, &want, &[]).await
    }

    pub async fn unassign_eni_ipv4s(&self, id: &str, ipv4s: &[String]) -> Result<(), ProviderError> {
        if ipv4s.is_empty() {
            return Ok(());
        }
        let addresses: Vec<_> = ipv4s.iter().map(|ip| json!({"PrivateIpAddress": ip})).collect();
        let request = json!({"NetworkInterfaceId": id, "PrivateIpAddresses": addresses});
        let _: IgnoredAny = self.write("UnassignPrivateIpAddresses", &request).await?;
        self.wait_eni_ready(id, &[], ipv4s).await
    }

    /// Delete an ENI and wait until it no longer shows up.
    pub async fn delete_eni(&self, id: &str) -> Result<(), ProviderError> {
        let _: IgnoredAny = self
            .write("DeleteNetworkInterface", &json!({"NetworkInterfaceId": id}))
            .await?;
        let what = format!("eni {} to be deleted", id);
        self.wait_until(self.policy().read_timeout, &what, || async move {
            Ok(self.describe_eni(id).await?.is_none())
        })
        .await?;
        info!(eni_id = %id, "deleted eni");
        Ok(())
    }

    /// Attach an ENI and wait until the instance shows up on it.
    pub async fn attach_eni(&self, eni_id: &str, instance_id: &str) -> Result<(), ProviderError> {
        let request = json!({"NetworkInterfaceId": eni_id, "InstanceId": instance_id});
        let _: IgnoredAny = self.write("AttachNetworkInterface", &request).await?;

        let what = format!("eni {} to attach to {}", eni_id, instance_id);
        self.wait_until(self.policy().write_timeout, &what, || async move {
            let eni = self
                .describe_eni(eni_id)
                .await?
                .ok_or_else(|| ProviderError::NotFound(format!("eni {}", eni_id)))?;
            Ok(eni.state == ENI_STATE_AVAILABLE && eni.attached_instance() == Some(instance_id))
        })
        .await?;
        info!(eni_id, instance_id, "attached eni");
        Ok(())
    }

    /// Detach an ENI, retrying while the instance still holds it.
    pub async fn detach_eni(&self, eni_id: &str, instance_id: &str) -> Result<(), ProviderError> {
        let request = json!({"NetworkInterfaceId": eni_id, "InstanceId": instance_id});
        let _: IgnoredAny = self
            .write_retrying(
                "DetachNetworkInterface",
                &request,
                &["UnsupportedOperation.InvalidState"],
            )
            .await?;

        let what = format!("eni {} to detach from {}", eni_id, instance_id);
        self.wait_until(self.policy().write_timeout, &what, || async move {
            Ok(match self.describe_eni(eni_id).await? {
                Some(eni) => eni.attached_instance().is_none(),
                None => true,
            })
        })
        .await?;
        info!(eni_id, instance_id, "detached eni");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support;
    use serde_json::Value;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ok(mut body: Value) -> ResponseTemplate {
        body["RequestId"] = json!("req-1");
        ResponseTemplate::new(200).set_body_json(json!({"Response": body}))
    }

    fn eni(state: &str, ips: &[&str]) -> Value {
        let ips: Vec<Value> = ips
            .iter()
            .enumerate()
            .map(|(i, ip)| json!({"PrivateIpAddress": ip, "Primary": i == 0}))
            .collect();
        json!({"NetworkInterfaceId": "eni-1", "State": state, "PrivateIpAddressSet": ips})
    }

    #[tokio::test]
    async fn test_create_eni_with_count_waits_for_available() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-tc-action", "CreateNetworkInterface"))
            .and(body_partial_json(json!({"SecondaryPrivateIpAddressCount": 1})))
            .respond_with(ok(json!({"NetworkInterface": eni("PENDING", &["10.0.0.2", "10.0.0.3"])})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("x-tc-action", "DescribeNetworkInterfaces"))
            .respond_with(ok(json!({"TotalCount": 1, "NetworkInterfaceSet": [eni("PENDING", &["10.0.0.2", "10.0.0.3"])]})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("x-tc-action", "DescribeNetworkInterfaces"))
            .respond_with(ok(json!({"TotalCount": 1, "NetworkInterfaceSet": [eni("AVAILABLE", &["10.0.0.2", "10.0.0.3"])]})))
            .mount(&server)
            .await;

        let svc = test_support::service(&server);
        let spec = EniSpec {
            name: "eni".to_string(),
            vpc_id: "vpc-1".to_string(),
            subnet_id: "subnet-1".to_string(),
            ipv4_count: Some(2),
            ..Default::default()
        };
        assert_eq!(svc.create_eni(&spec).await.unwrap(), "eni-1");
    }

    #[tokio::test]
    async fn test_create_eni_rejects_short_assignment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-tc-action", "CreateNetworkInterface"))
            .respond_with(ok(json!({"NetworkInterface": eni("PENDING", &["10.0.0.2"])})))
            .mount(&server)
            .await;

        let svc = test_support::service(&server);
        let spec = EniSpec {
            ipv4_count: Some(3),
            ..Default::default()
        };
        let err = svc.create_eni(&spec).await.unwrap_err();
        assert!(err.to_string().contains("expected 3"));
        assert!(matches!(&err, ProviderError::Partial { state, .. } if state["id"] == "eni-1"));
    }

    #[test]
    fn test_has_ips() {
        let eni: NetworkInterface = serde_json::from_value(eni("AVAILABLE", &["10.0.0.2", "10.0.0.3"])).unwrap();
        assert!(has_ips(&eni, &["10.0.0.3".to_string()], &[]));
        assert!(!has_ips(&eni, &[], &["10.0.0.3".to_string()]));
        assert!(!has_ips(&eni, &["10.0.0.4".to_string()], &[]));
    }
}
