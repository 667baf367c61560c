//! Read-only data sources.
//!
//! Every data source fills one list attribute, derives its ID from the
//! listed object IDs and optionally dumps the list to `result_output_file`.

use std::sync::Arc;

use crate::error::ProviderError;
use crate::helper::{data_resource_ids_hash, write_to_file};
use crate::schema::{Attribute, Schema};
use crate::service::VpcService;
use crate::state::ResourceData;

mod eip;
mod eni;
mod nat;
mod network;
mod quota;
mod security_group;
mod template;

#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    /// Query the API and fill the computed attributes of `d`.
    async fn read(&self, svc: &VpcService, d: &mut ResourceData) -> Result<(), ProviderError>;
}

/// Every data source the provider registers.
pub fn all() -> Vec<Arc<dyn DataSource>> {
    vec![
        Arc::new(network::VpcInstancesDataSource),
        Arc::new(network::VpcSubnetsDataSource),
        Arc::new(network::VpcRouteTablesDataSource),
        Arc::new(security_group::SecurityGroupsDataSource),
        Arc::new(eni::EnisDataSource),
        Arc::new(nat::NatGatewaysDataSource),
        Arc::new(eip::EipsDataSource),
        Arc::new(template::AddressTemplatesDataSource),
        Arc::new(quota::VpcLimitsDataSource),
        Arc::new(quota::VpcAccountAttributesDataSource),
    ]
}

/// Schema with the computed `id` and `result_output_file`.
pub(crate) fn base_schema(description: &str) -> Schema {
    Schema::v0()
        .with_description(description)
        .with_attribute("id", Attribute::computed_string())
        .with_result_output_file()
}

/// Store `items` under `list_key`, set the ID hash and write the output file.
pub(crate) async fn finish(
    d: &mut ResourceData,
    list_key: &str,
    ids: &[String],
    items: Vec<ResourceData>,
) -> Result<(), ProviderError> {
    d.set_id(data_resource_ids_hash(ids));
    d.set_list(list_key, items);

    if let Some(path) = d.get_string("result_output_file") {
        let list = d.get(list_key).cloned().unwrap_or_default();
        write_to_file(path, &list).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_registry() {
        let sources = all();
        let names: HashSet<_> = sources.iter().map(|s| s.type_name()).collect();
        assert_eq!(names.len(), 10);
        for source in &sources {
            let schema = source.schema();
            assert!(schema.attribute("result_output_file").is_some(), "{}", source.type_name());
            assert!(schema.attribute("id").is_some(), "{}", source.type_name());
        }
    }

    #[tokio::test]
    async fn test_finish_writes_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/result.json");
        let mut d = ResourceData::new();
        d.set("result_output_file", path.to_string_lossy().to_string());

        let mut item = ResourceData::new();
        item.set("vpc_id", "vpc-1");
        finish(&mut d, "instance_list", &["vpc-1".to_string()], vec![item])
            .await
            .unwrap();

        assert_eq!(d.id(), Some(data_resource_ids_hash(&["vpc-1"]).as_str()));
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written[0]["vpc_id"], "vpc-1");
    }
}
