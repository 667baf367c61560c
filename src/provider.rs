//! The Tencent Cloud VPC provider.
//!
//! [`TencentCloudProvider`] owns the resource and data-source registry and
//! the configured [`VpcService`]. Every protocol call is dispatched to the
//! handler registered under the requested type name.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::client::TencentCloudClient;
use crate::config::{self, ProviderConfig};
use crate::data_sources::{self, DataSource};
use crate::error::ProviderError;
use crate::plan;
use crate::resources::{self, Resource};
use crate::retry::RetryPolicy;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::service::VpcService;
use crate::state::ResourceData;
use crate::types::{ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities};
use crate::validation;

pub struct TencentCloudProvider {
    resources: BTreeMap<&'static str, Arc<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Arc<dyn DataSource>>,
    service: RwLock<Option<VpcService>>,
    endpoint: Option<String>,
    retry_policy: RetryPolicy,
}

impl Default for TencentCloudProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TencentCloudProvider {
    pub fn new() -> Self {
        Self {
            resources: resources::all().into_iter().map(|r| (r.type_name(), r)).collect(),
            data_sources: data_sources::all().into_iter().map(|d| (d.type_name(), d)).collect(),
            service: RwLock::new(None),
            endpoint: None,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Send every API call to `url` instead of the public endpoints.
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    fn resource(&self, type_name: &str) -> Result<&Arc<dyn Resource>, ProviderError> {
        self.resources
            .get(type_name)
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    fn data_source(&self, type_name: &str) -> Result<&Arc<dyn DataSource>, ProviderError> {
        self.data_sources
            .get(type_name)
            .ok_or_else(|| ProviderError::UnknownResource(format!("data source {}", type_name)))
    }

    async fn service(&self) -> Result<VpcService, ProviderError> {
        self.service.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration("provider has not been configured".to_string())
        })
    }

    /// Refresh `d` after a write. The object must still exist.
    async fn read_back(
        &self,
        resource: &dyn Resource,
        svc: &VpcService,
        mut d: ResourceData,
    ) -> Result<Value, ProviderError> {
        if resource.read(svc, &mut d).await? {
            return Ok(d.into_value());
        }
        Err(ProviderError::NotFound(format!(
            "{} {} disappeared after apply",
            resource.type_name(),
            d.id().unwrap_or_default()
        )))
    }
}

/// Once the object has an ID, a failure must not lose track of it.
fn keep_created(err: ProviderError, mut d: ResourceData) -> ProviderError {
    if d.id().is_none() {
        if let ProviderError::Partial { state, .. } = &err {
            if let Some(id) = state.get("id").and_then(Value::as_str) {
                d.set_id(id);
            }
        }
    }
    if d.id().is_none() {
        return err;
    }
    warn!(id = d.id().unwrap_or_default(), error = %err, "create failed after the object was created");
    err.with_partial_state(d.into_value())
}

#[async_trait::async_trait]
impl ProviderService for TencentCloudProvider {
    fn schema(&self) -> ProviderSchema {
        let schema = ProviderSchema::new().with_provider_config(config::provider_schema());
        let schema = self
            .resources
            .values()
            .fold(schema, |s, r| s.with_resource(r.type_name(), r.schema()));
        self.data_sources
            .values()
            .fold(schema, |s, d| s.with_data_source(d.type_name(), d.schema()))
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            resources: self.resources.keys().map(|k| k.to_string()).collect(),
            data_sources: self.data_sources.keys().map(|k| k.to_string()).collect(),
            capabilities: ServerCapabilities { plan_destroy: true },
        }
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validation::validate(&config::provider_schema(), &config))
    }

    #[instrument(skip_all)]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = validation::validate(&config::provider_schema(), &config);
        if diagnostics.iter().any(Diagnostic::is_error) {
            return Ok(diagnostics);
        }

        let resolved = match ProviderConfig::from_value(&config)?.resolve() {
            Ok(resolved) => resolved,
            Err(diagnostics) => return Ok(diagnostics),
        };

        let mut options = resolved.options;
        if let Some(endpoint) = &self.endpoint {
            options.base_url = Some(endpoint.clone());
        }
        let region = options.region.clone();
        let client = TencentCloudClient::new(resolved.credential, options)?;

        *self.service.write().await = Some(VpcService::new(client, self.retry_policy));
        info!(region = %region, "provider configured");
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        self.service.write().await.take();
        debug!("provider client released");
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let mut diagnostics = validation::validate(&resource.schema(), &config);
        if !diagnostics.iter().any(Diagnostic::is_error) {
            let d = ResourceData::from_value(config)?;
            diagnostics.extend(resource.validate(&d));
        }
        Ok(diagnostics)
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let _ = config;
        let resource = self.resource(resource_type)?;
        Ok(plan::plan(&resource.schema(), prior_state.as_ref(), &proposed_state))
    }

    #[instrument(skip(self, planned_state))]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let svc = self.service().await?;

        let mut d = ResourceData::from_value(planned_state)?;
        if let Err(e) = resource.create(&svc, &mut d).await {
            return Err(keep_created(e, d));
        }
        info!(id = d.id().unwrap_or_default(), "resource created");

        let created = d.clone();
        self.read_back(resource.as_ref(), &svc, d)
            .await
            .map_err(|e| keep_created(e, created))
    }

    #[instrument(skip(self, current_state))]
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let svc = self.service().await?;

        let mut d = ResourceData::from_value(current_state)?;
        if d.id().is_none() {
            return Ok(Value::Null);
        }
        if resource.read(&svc, &mut d).await? {
            return Ok(d.into_value());
        }
        warn!(id = d.id().unwrap_or_default(), "resource no longer exists, removing from state");
        Ok(Value::Null)
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let svc = self.service().await?;

        let prior = ResourceData::from_value(prior_state)?;
        let mut d = ResourceData::from_value(planned_state)?;
        if d.id().is_none() {
            d.set_id(prior.require_id()?);
        }
        resource.update(&svc, &prior, &mut d).await?;
        info!(id = d.id().unwrap_or_default(), "resource updated");

        self.read_back(resource.as_ref(), &svc, d).await
    }

    #[instrument(skip(self, current_state))]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let svc = self.service().await?;

        let d = ResourceData::from_value(current_state)?;
        resource.delete(&svc, &d).await?;
        info!(id = d.id().unwrap_or_default(), "resource deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let svc = self.service().await?;

        let mut d = ResourceData::new();
        d.set_id(id);
        if !resource.read(&svc, &mut d).await? {
            return Err(ProviderError::NotFound(format!("{} {}", resource_type, id)));
        }
        Ok(vec![ImportedResource::new(resource_type, d.into_value())])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let source = self.data_source(data_source_type)?;
        Ok(validation::validate(&source.schema(), &config))
    }

    #[instrument(skip(self, config))]
    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        let source = self.data_source(data_source_type)?;
        let svc = self.service().await?;

        let mut d = ResourceData::from_value(config)?;
        source.read(&svc, &mut d).await?;
        Ok(d.into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_lists_every_handler() {
        let provider = TencentCloudProvider::new();
        let schema = provider.schema();
        assert_eq!(schema.resources.len(), 17);
        assert_eq!(schema.data_sources.len(), 10);
        assert!(schema.provider.attribute("secret_key").is_some());

        let metadata = provider.metadata();
        assert!(metadata.capabilities.plan_destroy);
        assert!(metadata.resources.contains(&"tencentcloud_vpc".to_string()));
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let provider = TencentCloudProvider::new();
        let err = provider
            .read("tencentcloud_vpc", json!({"id": "vpc-1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_unknown_type() {
        let provider = TencentCloudProvider::new();
        let err = provider
            .plan("tencentcloud_cvm", None, json!({}), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_configure_reports_bad_protocol() {
        let provider = TencentCloudProvider::new();
        let diagnostics = provider
            .configure(json!({
                "secret_id": "AKID",
                "secret_key": "key",
                "region": "ap-guangzhou",
                "protocol": "FTP",
            }))
            .await
            .unwrap();
        assert!(diagnostics.iter().any(|d| d.attribute.as_deref() == Some("protocol")));
    }

    #[tokio::test]
    async fn test_validate_runs_cross_attribute_checks() {
        let provider = TencentCloudProvider::new();
        let diagnostics = provider
            .validate_resource_config(
                "tencentcloud_security_group_rule",
                json!({
                    "security_group_id": "sg-1",
                    "type": "ingress",
                    "cidr_ip": "10.0.0.0/8",
                    "source_sgid": "sg-2",
                    "policy": "ACCEPT",
                }),
            )
            .await
            .unwrap();
        assert!(diagnostics.iter().any(Diagnostic::is_error));
    }
}
