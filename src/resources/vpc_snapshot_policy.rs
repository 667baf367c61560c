use tracing::warn;

use super::{base_schema, Resource};
use crate::error::ProviderError;
use crate::schema::{Attribute, Block, NestedBlock, Schema, Validator};
use crate::service::models::BackupPolicy;
use crate::service::{SnapshotPolicySpec, VpcService};
use crate::state::ResourceData;

const BACKUP_DAYS: &[&str] = &[
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

pub struct VpcSnapshotPolicyResource;

fn spec_from(d: &ResourceData) -> Result<SnapshotPolicySpec, ProviderError> {
    let backup_policies = d
        .get_list("backup_policies")
        .iter()
        .map(|p| {
            Ok(BackupPolicy {
                backup_day: p.require_str("backup_day")?.to_string(),
                backup_time: p.require_str("backup_time")?.to_string(),
            })
        })
        .collect::<Result<Vec<_>, ProviderError>>()?;

    Ok(SnapshotPolicySpec {
        snapshot_policy_name: d.require_str("snapshot_policy_name")?.to_string(),
        backup_type: d.require_str("backup_type")?.to_string(),
        keep_time: d.get_i64("keep_time").unwrap_or(1),
        create_new_cos: d.get_bool("create_new_cos").unwrap_or(false),
        cos_region: d.require_str("cos_region")?.to_string(),
        cos_bucket: d.require_str("cos_bucket")?.to_string(),
        backup_policies,
    })
}

#[async_trait::async_trait]
impl Resource for VpcSnapshotPolicyResource {
    fn type_name(&self) -> &'static str {
        "tencentcloud_vpc_snapshot_policy"
    }

    fn schema(&self) -> Schema {
        base_schema("Provides a resource to create a VPC snapshot policy.")
            .with_attribute(
                "snapshot_policy_name",
                Attribute::required_string()
                    .with_validator(Validator::string_length(1, 60))
                    .with_description("Snapshot policy name."),
            )
            .with_attribute(
                "backup_type",
                Attribute::required_string()
                    .with_validator(Validator::allowed_strings(["operate", "time"]))
                    .with_description("Backup strategy type, `operate` for operation backup, `time` for scheduled backup."),
            )
            .with_attribute(
                "keep_time",
                Attribute::required_int64()
                    .with_validator(Validator::int_range(1, 365))
                    .with_description("Retention time in days."),
            )
            .with_attribute(
                "create_new_cos",
                Attribute::required_bool()
                    .with_force_new()
                    .with_description("Whether to create a new COS bucket."),
            )
            .with_attribute("cos_region", Attribute::required_string().with_force_new())
            .with_attribute("cos_bucket", Attribute::required_string().with_force_new())
            .with_block(
                "backup_policies",
                NestedBlock::list(
                    Block::new()
                        .with_attribute(
                            "backup_day",
                            Attribute::required_string()
                                .with_validator(Validator::allowed_strings(BACKUP_DAYS.iter().copied())),
                        )
                        .with_attribute(
                            "backup_time",
                            Attribute::required_string().with_description("Backup time, like `00:00:00`."),
                        ),
                ),
            )
            .with_attribute("enable", Attribute::computed_bool())
            .with_attribute("create_time", Attribute::computed_string())
    }

    async fn create(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError> {
        let id = svc.create_snapshot_policy(&spec_from(d)?).await?;
        d.set_id(id);
        Ok(())
    }

    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<bool, ProviderError> {
        let id = d.require_id()?.to_string();
        let Some(policy) = svc.describe_snapshot_policy(&id).await? else {
            warn!(snapshot_policy_id = %id, "snapshot policy not found");
            return Ok(false);
        };

        let backup_policies = policy
            .backup_policies
            .into_iter()
            .map(|p| {
                let mut item = ResourceData::new();
                item.set("backup_day", p.backup_day);
                item.set("backup_time", p.backup_time);
                item
            })
            .collect();

        d.set("snapshot_policy_name", policy.snapshot_policy_name);
        d.set("backup_type", policy.backup_type);
        d.set("keep_time", policy.keep_time);
        d.set("create_new_cos", policy.create_new_cos);
        d.set("cos_region", policy.cos_region);
        d.set("cos_bucket", policy.cos_bucket);
        d.set_list("backup_policies", backup_policies);
        d.set("enable", policy.enable);
        d.set("create_time", policy.create_time);
        Ok(true)
    }

    async fn update(
        &self,
        svc: &VpcService,
        prior: &ResourceData,
        d: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        if d.has_changes(prior, &["snapshot_policy_name", "backup_type", "keep_time", "backup_policies"]) {
            svc.modify_snapshot_policy(d.require_id()?, &spec_from(d)?).await?;
        }
        Ok(())
    }

    async fn delete(&self, svc: &VpcService, d: &ResourceData) -> Result<(), ProviderError> {
        svc.delete_snapshot_policy(d.require_id()?).await
    }
}
