//! Elastic IPs and their association to instances or ENIs.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::models::{map_to_tags, Address, Filter};
use super::{found, Paging, VpcService};
use crate::error::ProviderError;

pub const EIP_STATUS_BIND: &str = "BIND";
pub const EIP_STATUS_UNBIND: &str = "UNBIND";
pub const EIP_STATUS_BIND_ENI: &str = "BIND_ENI";

const EIP_TASK_STATUS_RUNNING: &str = "RUNNING";
const EIP_TASK_STATUS_FAILED: &str = "FAILED";

// DisassociateAddress calls running in parallel fail with ResourceInUse.
static EIP_UNBIND_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Parameters of a new EIP.
#[derive(Debug, Clone, Default)]
pub struct EipSpec {
    pub name: Option<String>,
    pub address_type: Option<String>,
    pub internet_service_provider: Option<String>,
    pub internet_charge_type: Option<String>,
    pub bandwidth: Option<i64>,
    pub tags: BTreeMap<String, String>,
}

/// What an EIP is associated with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EipTarget {
    Instance(String),
    NetworkInterface { eni_id: String, private_ip: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AllocateAddressesResponse {
    #[serde(default)]
    address_set: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TaskResponse {
    #[serde(default)]
    task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TaskResultResponse {
    #[serde(default)]
    result: String,
}

impl VpcService {
    /// Allocate one EIP and wait until it is unbound and usable.
    pub async fn create_eip(&self, spec: &EipSpec) -> Result<String, ProviderError> {
        let mut request = json!({"AddressCount": 1});
        if let Some(name) = &spec.name {
            request["AddressName"] = json!(name);
        }
        if let Some(address_type) = &spec.address_type {
            request["AddressType"] = json!(address_type);
        }
        if let Some(isp) = &spec.internet_service_provider {
            request["InternetServiceProvider"] = json!(isp);
        }
        if let Some(charge_type) = &spec.internet_charge_type {
            request["InternetChargeType"] = json!(charge_type);
        }
        if let Some(bandwidth) = spec.bandwidth {
            request["InternetMaxBandwidthOut"] = json!(bandwidth);
        }
        if !spec.tags.is_empty() {
            request["Tags"] = json!(map_to_tags(&spec.tags));
        }

        let response: AllocateAddressesResponse = self.write("AllocateAddresses", &request).await?;
        let id = response
            .address_set
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Sdk("AllocateAddresses returned no address".to_string()))?;
        info!(eip_id = %id, "allocated eip");

        self.wait_eip_status(&id, EIP_STATUS_UNBIND)
            .await
            .map_err(|e| e.with_partial_state(json!({ "id": id })))?;
        Ok(id)
    }

    pub async fn describe_eip(&self, id: &str) -> Result<Option<Address>, ProviderError> {
        let eips: Option<Vec<Address>> = found(
            self.describe_all(
                "DescribeAddresses",
                json!({"AddressIds": [id]}),
                "AddressSet",
                Paging::Integers,
            )
            .await,
        )?;
        Ok(eips.and_then(|e| e.into_iter().find(|eip| eip.address_id == id)))
    }

    pub async fn describe_eips(&self, filters: Vec<Filter>) -> Result<Vec<Address>, ProviderError> {
        let request = if filters.is_empty() { json!({}) } else { json!({"Filters": filters}) };
        self.describe_all("DescribeAddresses", request, "AddressSet", Paging::Integers)
            .await
    }

    pub async fn wait_eip_status(&self, id: &str, status: &str) -> Result<(), ProviderError> {
        let what = format!("eip {} to become {}", id, status);
        self.wait_until(self.policy().read_timeout, &what, || async move {
            let eip = self
                .describe_eip(id)
                .await?
                .ok_or_else(|| ProviderError::NotFound(format!("eip {}", id)))?;
            Ok(eip.address_status == status)
        })
        .await
    }

    pub async fn modify_eip_name(&self, id: &str, name: &str) -> Result<(), ProviderError> {
        let request = json!({"AddressId": id, "AddressName": name});
        let _: IgnoredAny = self.write("ModifyAddressAttribute", &request).await?;
        Ok(())
    }

    pub async fn modify_eip_bandwidth(&self, id: &str, bandwidth: i64) -> Result<(), ProviderError> {
        let request = json!({"AddressIds": [id], "InternetMaxBandwidthOut": bandwidth});
        let response: TaskResponse = self.write("ModifyAddressesBandwidth", &request).await?;
        self.wait_task(response.task_id.as_deref()).await
    }

    pub async fn delete_eip(&self, id: &str) -> Result<(), ProviderError> {
        let response: TaskResponse = self
            .write("ReleaseAddresses", &json!({"AddressIds": [id]}))
            .await?;
        self.wait_task(response.task_id.as_deref()).await?;
        info!(eip_id = %id, "released eip");
        Ok(())
    }

    pub async fn associate_eip(&self, eip_id: &str, target: &EipTarget) -> Result<(), ProviderError> {
        let request = match target {
            EipTarget::Instance(instance_id) => json!({"AddressId": eip_id, "InstanceId": instance_id}),
            EipTarget::NetworkInterface { eni_id, private_ip } => json!({
                "AddressId": eip_id,
                "NetworkInterfaceId": eni_id,
                "PrivateIpAddress": private_ip,
            }),
        };
        let response: TaskResponse = self.write("AssociateAddress", &request).await?;
        self.wait_task(response.task_id.as_deref()).await?;
        info!(eip_id, ?target, "associated eip");
        Ok(())
    }

    /// Unbind an EIP; nothing happens if it is already unbound or gone.
    pub async fn disassociate_eip(&self, eip_id: &str) -> Result<(), ProviderError> {
        let _guard = EIP_UNBIND_LOCK.lock().await;

        match self.describe_eip(eip_id).await? {
            None => return Ok(()),
            Some(eip) if eip.address_status == EIP_STATUS_UNBIND => return Ok(()),
            Some(_) => {},
        }

        let response: TaskResponse = self
            .write("DisassociateAddress", &json!({"AddressId": eip_id}))
            .await?;
        self.wait_task(response.task_id.as_deref()).await?;
        info!(eip_id, "disassociated eip");
        Ok(())
    }

    /// Wait for an asynchronous EIP task. Non-numeric or missing IDs are not awaited.
    async fn wait_task(&self, task_id: Option<&str>) -> Result<(), ProviderError> {
        let Some(task_id) = task_id.and_then(|id| id.parse::<u64>().ok()) else {
            return Ok(());
        };
        let what = format!("eip task {}", task_id);
        self.wait_until(self.policy().read_timeout, &what, || async move {
            let result: TaskResultResponse = self
                .read("DescribeTaskResult", &json!({"TaskId": task_id}))
                .await?;
            debug!(task_id, result = %result.result, "eip task status");
            if result.result == EIP_TASK_STATUS_FAILED {
                return Err(ProviderError::Sdk(format!("eip task {} failed", task_id)));
            }
            Ok(result.result != EIP_TASK_STATUS_RUNNING)
        })
        .await
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

    #[tokio::test]
    async fn test_disassociate_skips_unbound_eip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-tc-action", "DescribeAddresses"))
            .respond_with(ok(json!({"TotalCount": 1, "AddressSet": [{"AddressId": "eip-1", "AddressStatus": "UNBIND"}]})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("x-tc-action", "DisassociateAddress"))
            .respond_with(ok(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let svc = test_support::service(&server);
        svc.disassociate_eip("eip-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_associate_eni_waits_for_task() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-tc-action", "AssociateAddress"))
            .and(body_partial_json(json!({"NetworkInterfaceId": "eni-1", "PrivateIpAddress": "10.0.0.2"})))
            .respond_with(ok(json!({"TaskId": "42"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("x-tc-action", "DescribeTaskResult"))
            .respond_with(ok(json!({"TaskId": 42, "Result": "RUNNING"})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("x-tc-action", "DescribeTaskResult"))
            .respond_with(ok(json!({"TaskId": 42, "Result": "SUCCESS"})))
            .expect(1)
            .mount(&server)
            .await;

        let svc = test_support::service(&server);
        let target = EipTarget::NetworkInterface {
            eni_id: "eni-1".to_string(),
            private_ip: "10.0.0.2".to_string(),
        };
        svc.associate_eip("eip-1", &target).await.unwrap();
    }
}
