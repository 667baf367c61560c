//! Snapshot policies for VPC configuration backups.

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::models::{BackupPolicy, SnapshotPolicy};
use super::{found, Paging, VpcService};
use crate::error::ProviderError;

/// Writable fields of a snapshot policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SnapshotPolicySpec {
    pub snapshot_policy_name: String,
    pub backup_type: String,
    pub keep_time: i64,
    pub create_new_cos: bool,
    pub cos_region: String,
    pub cos_bucket: String,
    pub backup_policies: Vec<BackupPolicy>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateSnapshotPoliciesResponse {
    #[serde(default)]
    snapshot_policies: Vec<SnapshotPolicy>,
}

impl VpcService {
    pub async fn create_snapshot_policy(&self, spec: &SnapshotPolicySpec) -> Result<String, ProviderError> {
        let request = json!({"SnapshotPolicies": [spec]});
        let response: CreateSnapshotPoliciesResponse =
            self.write("CreateSnapshotPolicies", &request).await?;
        let id = response
            .snapshot_policies
            .into_iter()
            .next()
            .map(|p| p.snapshot_policy_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::Sdk("CreateSnapshotPolicies returned no policy".to_string()))?;
        info!(snapshot_policy_id = %id, "created snapshot policy");
        Ok(id)
    }

    pub async fn describe_snapshot_policy(&self, id: &str) -> Result<Option<SnapshotPolicy>, ProviderError> {
        let policies: Option<Vec<SnapshotPolicy>> = found(
            self.describe_all(
                "DescribeSnapshotPolicies",
                json!({"SnapshotPolicyIds": [id]}),
                "SnapshotPolicySet",
                Paging::Integers,
            )
            .await,
        )?;
        Ok(policies.and_then(|p| p.into_iter().find(|policy| policy.snapshot_policy_id == id)))
    }

    /// Update name, backup type, retention and schedule. COS settings are fixed at creation.
    pub async fn modify_snapshot_policy(&self, id: &str, spec: &SnapshotPolicySpec) -> Result<(), ProviderError> {
        let request = json!({
            "SnapshotPoliciesInfo": [{
                "SnapshotPolicyId": id,
                "SnapshotPolicyName": spec.snapshot_policy_name,
                "BackupType": spec.backup_type,
                "KeepTime": spec.keep_time,
                "BackupPolicies": spec.backup_policies,
            }],
        });
        let _: IgnoredAny = self.write("ModifySnapshotPolicies", &request).await?;
        Ok(())
    }

    pub async fn delete_snapshot_policy(&self, id: &str) -> Result<(), ProviderError> {
        let _: IgnoredAny = self
            .write("DeleteSnapshotPolicies", &json!({"SnapshotPolicyIds": [id]}))
            .await?;
        info!(snapshot_policy_id = %id, "deleted snapshot policy");
        Ok(())
    }
}
