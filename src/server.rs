//! gRPC plugin server.
//!
//! [`ProviderService`] is the provider-facing API in plain Rust types; the
//! private adapter below maps it onto the generated `Provider` service.
//! States and configurations cross the wire as JSON bytes. A payload that
//! fails to decode is answered with an error diagnostic.
//!
//! Startup writes the handshake line (`HEMMER_PROVIDER|1|<addr>`) to
//! stdout. On SIGTERM or SIGINT the server stops accepting connections,
//! drains in-flight calls for at most [`ServeOptions::shutdown_timeout`],
//! then calls [`ProviderService::stop`].

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info, instrument, warn};

use crate::error::ProviderError;
use crate::generated as proto;
use crate::schema::{Block, BlockNestingMode, Diagnostic, DiagnosticSeverity, ProviderSchema, Schema};
use crate::types::{handshake_line, ImportedResource, PlanResult, ProviderMetadata};

/// Operations a provider exposes to the engine.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    fn schema(&self) -> ProviderSchema;

    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        ProviderMetadata {
            resources: schema.resources.keys().cloned().collect(),
            data_sources: schema.data_sources.keys().cloned().collect(),
            capabilities: Default::default(),
        }
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Build clients from the provider block. Error diagnostics leave the
    /// provider unconfigured.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Every schema is still at version 0, so state passes through.
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let _ = (resource_type, version);
        Ok(state)
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError>;

    /// Refresh a resource. `Value::Null` means it no longer exists.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError>;

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let _ = id;
        Err(ProviderError::Unimplemented(format!("import of {}", resource_type)))
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (data_source_type, config);
        Ok(vec![])
    }

    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError>;
}

/// Decode a JSON payload. Empty bytes mean `null`.
fn decode(bytes: &[u8], field: &str) -> Result<Value, ProviderError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes)
        .map_err(|e| ProviderError::InvalidRequest(format!("malformed JSON in `{}`: {}", field, e)))
}

fn encode(value: &Value) -> Result<Vec<u8>, ProviderError> {
    Ok(serde_json::to_vec(value)?)
}

fn diagnostics_to_proto(diagnostics: Vec<Diagnostic>) -> Vec<proto::Diagnostic> {
    diagnostics
        .into_iter()
        .map(|d| proto::Diagnostic {
            severity: match d.severity {
                DiagnosticSeverity::Error => proto::diagnostic::Severity::Error as i32,
                DiagnosticSeverity::Warning => proto::diagnostic::Severity::Warning as i32,
            },
            summary: d.summary,
            detail: d.detail.unwrap_or_default(),
            attribute: d.attribute.unwrap_or_default(),
        })
        .collect()
}

fn error_to_proto(err: ProviderError) -> Vec<proto::Diagnostic> {
    let detail = match &err {
        ProviderError::NotFound(_) => "The object was not found in the cloud API.",
        ProviderError::PermissionDenied(_) => "Check the credentials and the CAM policy of the key.",
        ProviderError::Configuration(_) => "Check the provider block and TENCENTCLOUD_* variables.",
        _ => "",
    };
    let mut diagnostic = Diagnostic::error(err.to_string());
    if !detail.is_empty() {
        diagnostic = diagnostic.with_detail(detail);
    }
    diagnostics_to_proto(vec![diagnostic])
}

/// Log and convert the outcome of a validation-style call.
fn diagnostics_outcome(
    call: &str,
    result: Result<Vec<Diagnostic>, ProviderError>,
) -> Vec<proto::Diagnostic> {
    match result {
        Ok(diagnostics) => {
            let errors = diagnostics.iter().filter(|d| d.is_error()).count();
            if errors > 0 {
                warn!(errors, "{} reported errors", call);
            } else {
                debug!("{} ok", call);
            }
            diagnostics_to_proto(diagnostics)
        },
        Err(e) => {
            error!(error = %e, "{} failed", call);
            error_to_proto(e)
        },
    }
}

fn schema_to_proto(schema: &Schema) -> proto::Schema {
    proto::Schema {
        version: schema.version as i64,
        block: Some(block_to_proto(&schema.block)),
    }
}

fn schemas_to_proto(schemas: &BTreeMap<String, Schema>) -> HashMap<String, proto::Schema> {
    schemas
        .iter()
        .map(|(name, schema)| (name.clone(), schema_to_proto(schema)))
        .collect()
}

fn block_to_proto(block: &Block) -> proto::Block {
    let attributes = block
        .attributes
        .iter()
        .map(|(name, attr)| proto::Attribute {
            name: name.clone(),
            r#type: serde_json::to_vec(&attr.attr_type).unwrap_or_default(),
            required: attr.flags.required,
            optional: attr.flags.optional,
            computed: attr.flags.computed,
            sensitive: attr.flags.sensitive,
            description: attr.description.clone().unwrap_or_default(),
            force_new: attr.force_new,
            default_value: attr
                .default
                .as_ref()
                .and_then(|v| serde_json::to_vec(v).ok())
                .unwrap_or_default(),
        })
        .collect();

    let block_types = block
        .blocks
        .iter()
        .map(|(name, nested)| {
            let nesting_mode = match nested.nesting_mode {
                BlockNestingMode::Single => proto::nested_block::NestingMode::Single,
                BlockNestingMode::List => proto::nested_block::NestingMode::List,
                BlockNestingMode::Set => proto::nested_block::NestingMode::Set,
                BlockNestingMode::Map => proto::nested_block::NestingMode::Map,
            };
            proto::NestedBlock {
                type_name: name.clone(),
                block: Some(block_to_proto(&nested.block)),
                nesting_mode: nesting_mode as i32,
                min_items: nested.min_items as i32,
                max_items: nested.max_items as i32,
            }
        })
        .collect();

    proto::Block {
        attributes,
        block_types,
        description: block.description.clone().unwrap_or_default(),
    }
}

struct GrpcAdapter<P: ProviderService> {
    provider: Arc<P>,
}

#[tonic::async_trait]
impl<P: ProviderService> proto::provider_server::Provider for GrpcAdapter<P> {
    #[instrument(skip_all, name = "grpc.get_metadata")]
    async fn get_metadata(
        &self,
        _request: Request<proto::GetMetadataRequest>,
    ) -> Result<Response<proto::GetMetadataResponse>, Status> {
        let metadata = self.provider.metadata();
        debug!(
            resources = metadata.resources.len(),
            data_sources = metadata.data_sources.len(),
            "metadata"
        );
        Ok(Response::new(proto::GetMetadataResponse {
            server_capabilities: Some(proto::ServerCapabilities {
                plan_destroy: metadata.capabilities.plan_destroy,
            }),
            resources: metadata.resources,
            data_sources: metadata.data_sources,
            diagnostics: vec![],
        }))
    }

    #[instrument(skip_all, name = "grpc.get_schema")]
    async fn get_schema(
        &self,
        _request: Request<proto::GetSchemaRequest>,
    ) -> Result<Response<proto::GetSchemaResponse>, Status> {
        let schema = self.provider.schema();
        Ok(Response::new(proto::GetSchemaResponse {
            provider: Some(schema_to_proto(&schema.provider)),
            resources: schemas_to_proto(&schema.resources),
            data_sources: schemas_to_proto(&schema.data_sources),
            diagnostics: vec![],
        }))
    }

    #[instrument(skip_all, name = "grpc.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        request: Request<proto::ValidateProviderConfigRequest>,
    ) -> Result<Response<proto::ValidateProviderConfigResponse>, Status> {
        let req = request.into_inner();
        let result = match decode(&req.config, "config") {
            Ok(config) => self.provider.validate_provider_config(config).await,
            Err(e) => Err(e),
        };
        Ok(Response::new(proto::ValidateProviderConfigResponse {
            diagnostics: diagnostics_outcome("ValidateProviderConfig", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.configure")]
    async fn configure(
        &self,
        request: Request<proto::ConfigureRequest>,
    ) -> Result<Response<proto::ConfigureResponse>, Status> {
        let req = request.into_inner();
        let result = match decode(&req.config, "config") {
            Ok(config) => self.provider.configure(config).await,
            Err(e) => Err(e),
        };
        Ok(Response::new(proto::ConfigureResponse {
            diagnostics: diagnostics_outcome("Configure", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.stop")]
    async fn stop(&self, _request: Request<proto::StopRequest>) -> Result<Response<proto::StopResponse>, Status> {
        let error = match self.provider.stop().await {
            Ok(()) => String::new(),
            Err(e) => {
                error!(error = %e, "Stop failed");
                e.to_string()
            },
        };
        Ok(Response::new(proto::StopResponse { error }))
    }

    #[instrument(skip_all, name = "grpc.validate_resource_config", fields(resource_type = %request.get_ref().resource_type))]
    async fn validate_resource_config(
        &self,
        request: Request<proto::ValidateResourceConfigRequest>,
    ) -> Result<Response<proto::ValidateResourceConfigResponse>, Status> {
        let req = request.into_inner();
        let result = match decode(&req.config, "config") {
            Ok(config) => self.provider.validate_resource_config(&req.resource_type, config).await,
            Err(e) => Err(e),
        };
        Ok(Response::new(proto::ValidateResourceConfigResponse {
            diagnostics: diagnostics_outcome("ValidateResourceConfig", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.upgrade_resource_state", fields(resource_type = %request.get_ref().resource_type))]
    async fn upgrade_resource_state(
        &self,
        request: Request<proto::UpgradeResourceStateRequest>,
    ) -> Result<Response<proto::UpgradeResourceStateResponse>, Status> {
        let req = request.into_inner();
        let result = async {
            let state = decode(&req.raw_state, "raw_state")?;
            let upgraded = self
                .provider
                .upgrade_resource_state(&req.resource_type, req.version, state)
                .await?;
            encode(&upgraded)
        }
        .await;

        Ok(Response::new(match result {
            Ok(upgraded_state) => proto::UpgradeResourceStateResponse {
                upgraded_state,
                diagnostics: vec![],
            },
            Err(e) => {
                error!(version = req.version, error = %e, "UpgradeResourceState failed");
                proto::UpgradeResourceStateResponse {
                    upgraded_state: vec![],
                    diagnostics: error_to_proto(e),
                }
            },
        }))
    }

    #[instrument(skip_all, name = "grpc.plan", fields(resource_type = %request.get_ref().resource_type))]
    async fn plan(&self, request: Request<proto::PlanRequest>) -> Result<Response<proto::PlanResponse>, Status> {
        let req = request.into_inner();
        let result = async {
            let prior = decode(&req.prior_state, "prior_state")?;
            let prior = (!prior.is_null()).then_some(prior);
            let proposed = decode(&req.proposed_state, "proposed_state")?;
            let config = decode(&req.config, "config")?;
            let plan = self.provider.plan(&req.resource_type, prior, proposed, config).await?;
            let planned_state = encode(&plan.planned_state)?;
            Ok::<_, ProviderError>((plan, planned_state))
        }
        .await;

        Ok(Response::new(match result {
            Ok((plan, planned_state)) => {
                info!(
                    changes = plan.changes.len(),
                    requires_replace = plan.requires_replace,
                    "Plan completed"
                );
                proto::PlanResponse {
                    planned_state,
                    changes: plan.changes.into_iter().map(Into::into).collect(),
                    requires_replace: plan.requires_replace,
                    diagnostics: vec![],
                }
            },
            Err(e) => {
                error!(error = %e, "Plan failed");
                proto::PlanResponse {
                    planned_state: vec![],
                    changes: vec![],
                    requires_replace: false,
                    diagnostics: error_to_proto(e),
                }
            },
        }))
    }

    #[instrument(skip_all, name = "grpc.create", fields(resource_type = %request.get_ref().resource_type))]
    async fn create(
        &self,
        request: Request<proto::CreateRequest>,
    ) -> Result<Response<proto::CreateResponse>, Status> {
        let req = request.into_inner();
        let result = async {
            let planned = decode(&req.planned_state, "planned_state")?;
            encode(&self.provider.create(&req.resource_type, planned).await?)
        }
        .await;

        Ok(Response::new(match result {
            Ok(state) => proto::CreateResponse {
                state,
                diagnostics: vec![],
            },
            Err(ProviderError::Partial { state, source }) => {
                error!(error = %source, "Create failed, returning partial state");
                proto::CreateResponse {
                    state: encode(&state).unwrap_or_default(),
                    diagnostics: error_to_proto(*source),
                }
            },
            Err(e) => {
                error!(error = %e, "Create failed");
                proto::CreateResponse {
                    state: vec![],
                    diagnostics: error_to_proto(e),
                }
            },
        }))
    }

    #[instrument(skip_all, name = "grpc.read", fields(resource_type = %request.get_ref().resource_type))]
    async fn read(&self, request: Request<proto::ReadRequest>) -> Result<Response<proto::ReadResponse>, Status> {
        let req = request.into_inner();
        let result = async {
            let current = decode(&req.current_state, "current_state")?;
            encode(&self.provider.read(&req.resource_type, current).await?)
        }
        .await;

        Ok(Response::new(match result {
            Ok(state) => proto::ReadResponse {
                state,
                diagnostics: vec![],
            },
            Err(e) => {
                error!(error = %e, "Read failed");
                proto::ReadResponse {
                    state: vec![],
                    diagnostics: error_to_proto(e),
                }
            },
        }))
    }

    #[instrument(skip_all, name = "grpc.update", fields(resource_type = %request.get_ref().resource_type))]
    async fn update(
        &self,
        request: Request<proto::UpdateRequest>,
    ) -> Result<Response<proto::UpdateResponse>, Status> {
        let req = request.into_inner();
        let result = async {
            let prior = decode(&req.prior_state, "prior_state")?;
            let planned = decode(&req.planned_state, "planned_state")?;
            encode(&self.provider.update(&req.resource_type, prior, planned).await?)
        }
        .await;

        Ok(Response::new(match result {
            Ok(state) => proto::UpdateResponse {
                state,
                diagnostics: vec![],
            },
            Err(e) => {
                error!(error = %e, "Update failed");
                proto::UpdateResponse {
                    state: vec![],
                    diagnostics: error_to_proto(e),
                }
            },
        }))
    }

    #[instrument(skip_all, name = "grpc.delete", fields(resource_type = %request.get_ref().resource_type))]
    async fn delete(
        &self,
        request: Request<proto::DeleteRequest>,
    ) -> Result<Response<proto::DeleteResponse>, Status> {
        let req = request.into_inner();
        let result = match decode(&req.current_state, "current_state") {
            Ok(current) => self.provider.delete(&req.resource_type, current).await,
            Err(e) => Err(e),
        };

        let diagnostics = match result {
            Ok(()) => vec![],
            Err(e) => {
                error!(error = %e, "Delete failed");
                error_to_proto(e)
            },
        };
        Ok(Response::new(proto::DeleteResponse { diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.import_resource_state", fields(resource_type = %request.get_ref().resource_type, id = %request.get_ref().id))]
    async fn import_resource_state(
        &self,
        request: Request<proto::ImportResourceStateRequest>,
    ) -> Result<Response<proto::ImportResourceStateResponse>, Status> {
        let req = request.into_inner();
        let result = async {
            let imported = self.provider.import_resource(&req.resource_type, &req.id).await?;
            imported
                .into_iter()
                .map(|r| -> Result<proto::ImportedResource, ProviderError> {
                    Ok(proto::ImportedResource {
                        state: encode(&r.state)?,
                        resource_type: r.resource_type,
                    })
                })
                .collect::<Result<Vec<_>, ProviderError>>()
        }
        .await;

        Ok(Response::new(match result {
            Ok(imported) => {
                info!(count = imported.len(), "ImportResourceState completed");
                proto::ImportResourceStateResponse {
                    imported,
                    diagnostics: vec![],
                }
            },
            Err(e) => {
                error!(error = %e, "ImportResourceState failed");
                proto::ImportResourceStateResponse {
                    imported: vec![],
                    diagnostics: error_to_proto(e),
                }
            },
        }))
    }

    #[instrument(skip_all, name = "grpc.validate_data_source_config", fields(data_source_type = %request.get_ref().data_source_type))]
    async fn validate_data_source_config(
        &self,
        request: Request<proto::ValidateDataSourceConfigRequest>,
    ) -> Result<Response<proto::ValidateDataSourceConfigResponse>, Status> {
        let req = request.into_inner();
        let result = match decode(&req.config, "config") {
            Ok(config) => {
                self.provider
                    .validate_data_source_config(&req.data_source_type, config)
                    .await
            },
            Err(e) => Err(e),
        };
        Ok(Response::new(proto::ValidateDataSourceConfigResponse {
            diagnostics: diagnostics_outcome("ValidateDataSourceConfig", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.read_data_source", fields(data_source_type = %request.get_ref().data_source_type))]
    async fn read_data_source(
        &self,
        request: Request<proto::ReadDataSourceRequest>,
    ) -> Result<Response<proto::ReadDataSourceResponse>, Status> {
        let req = request.into_inner();
        let result = async {
            let config = decode(&req.config, "config")?;
            encode(&self.provider.read_data_source(&req.data_source_type, config).await?)
        }
        .await;

        Ok(Response::new(match result {
            Ok(state) => proto::ReadDataSourceResponse {
                state,
                diagnostics: vec![],
            },
            Err(e) => {
                error!(error = %e, "ReadDataSource failed");
                proto::ReadDataSourceResponse {
                    state: vec![],
                    diagnostics: error_to_proto(e),
                }
            },
        }))
    }
}

/// Listener address and shutdown behaviour of the plugin server.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// Port 0 picks a free port; the handshake reports the real one.
    pub address: SocketAddr,
    /// How long in-flight calls may run after a shutdown signal.
    pub shutdown_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            address: SocketAddr::from(([127, 0, 0, 1], 0)),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(mut self, address: SocketAddr) -> Self {
        self.address = address;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Resolve when SIGTERM or SIGINT (CTRL+C elsewhere) arrives.
pub async fn shutdown_signal() -> Result<(), ProviderError> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigint.recv() => info!("received SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("received CTRL+C");
    }

    Ok(())
}

/// Serve `provider` on a free loopback port until a shutdown signal.
pub async fn serve<P: ProviderService>(provider: P) -> Result<(), ProviderError> {
    serve_with_options(provider, ServeOptions::default()).await
}

pub async fn serve_with_options<P: ProviderService>(
    provider: P,
    options: ServeOptions,
) -> Result<(), ProviderError> {
    let listener = TcpListener::bind(options.address).await?;
    serve_listener(provider, listener, options.shutdown_timeout, shutdown_signal()).await
}

/// Serve on a bound listener until `shutdown` resolves.
///
/// Writes the handshake line, then runs until `shutdown` completes. The
/// drain that follows is bounded by `shutdown_timeout`; the provider is
/// stopped either way.
pub async fn serve_listener<P, F>(
    provider: P,
    listener: TcpListener,
    shutdown_timeout: Duration,
    shutdown: F,
) -> Result<(), ProviderError>
where
    P: ProviderService,
    F: Future<Output = Result<(), ProviderError>>,
{
    let addr = listener.local_addr()?;
    println!("{}", handshake_line(&addr));
    info!(address = %addr, "provider server listening");

    let provider = Arc::new(provider);
    let service = proto::provider_server::ProviderServer::new(GrpcAdapter {
        provider: Arc::clone(&provider),
    });

    let (drain_tx, drain_rx) = oneshot::channel::<()>();
    let server = Server::builder().add_service(service).serve_with_incoming_shutdown(
        tokio_stream::wrappers::TcpListenerStream::new(listener),
        async {
            let _ = drain_rx.await;
        },
    );
    tokio::pin!(server);
    tokio::pin!(shutdown);

    let outcome = tokio::select! {
        result = &mut server => result.map_err(ProviderError::from),
        signal = &mut shutdown => match signal {
            Ok(()) => {
                info!(timeout = ?shutdown_timeout, "draining in-flight requests");
                let _ = drain_tx.send(());
                match tokio::time::timeout(shutdown_timeout, &mut server).await {
                    Ok(result) => result.map_err(ProviderError::from),
                    Err(_) => {
                        warn!(timeout = ?shutdown_timeout, "shutdown timeout exceeded, abandoning requests");
                        Ok(())
                    },
                }
            },
            Err(e) => Err(e),
        },
    };

    if let Err(e) = provider.stop().await {
        warn!(error = %e, "provider stop failed");
    }
    info!("provider server stopped");
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_decode_rejects_malformed_json() {
        assert_eq!(decode(b"", "config").unwrap(), Value::Null);
        assert_eq!(decode(br#"{"a":1}"#, "config").unwrap()["a"], 1);

        let err = decode(b"{not json", "planned_state").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
        assert!(err.to_string().contains("planned_state"));
    }

    #[test]
    fn test_error_to_proto() {
        let diagnostics = error_to_proto(ProviderError::Sdk("boom".to_string()));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, proto::diagnostic::Severity::Error as i32);
        assert_eq!(diagnostics[0].summary, "SDK error: boom");
        assert!(diagnostics[0].detail.is_empty());

        let diagnostics = error_to_proto(ProviderError::NotFound("vpc-1".to_string()));
        assert!(!diagnostics[0].detail.is_empty());
    }

    #[test]
    fn test_block_to_proto_keeps_nesting() {
        let schema = crate::schema::Schema::v0()
            .with_attribute("name", crate::schema::Attribute::required_string().with_force_new())
            .with_block(
                "ipv4s",
                crate::schema::NestedBlock::set(
                    Block::new().with_attribute("ip", crate::schema::Attribute::required_string()),
                )
                .with_max_items(30),
            );
        let block = schema_to_proto(&schema).block.unwrap();
        assert!(block.attributes[0].force_new);
        assert_eq!(block.block_types[0].type_name, "ipv4s");
        assert_eq!(block.block_types[0].max_items, 30);
        assert_eq!(
            block.block_types[0].nesting_mode,
            proto::nested_block::NestingMode::Set as i32
        );
    }

    struct Stub {
        stopped: Arc<AtomicBool>,
    }

    #[async_trait::async_trait]
    impl ProviderService for Stub {
        fn schema(&self) -> ProviderSchema {
            ProviderSchema::new()
        }

        async fn configure(&self, _config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
            Ok(vec![])
        }

        async fn stop(&self) -> Result<(), ProviderError> {
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn plan(
            &self,
            _resource_type: &str,
            _prior_state: Option<Value>,
            proposed_state: Value,
            _config: Value,
        ) -> Result<PlanResult, ProviderError> {
            Ok(PlanResult::no_change(proposed_state))
        }

        async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
            if resource_type == "tencentcloud_subnet" {
                return Err(ProviderError::InvalidRequest("route table is gone".into())
                    .with_partial_state(serde_json::json!({"id": "subnet-1"})));
            }
            Ok(planned_state)
        }

        async fn read(&self, _resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
            Ok(current_state)
        }

        async fn update(
            &self,
            _resource_type: &str,
            _prior_state: Value,
            planned_state: Value,
        ) -> Result<Value, ProviderError> {
            Ok(planned_state)
        }

        async fn delete(&self, _resource_type: &str, _current_state: Value) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn read_data_source(&self, _data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
            Ok(config)
        }
    }

    #[tokio::test]
    async fn test_adapter_reports_malformed_state() {
        use proto::provider_server::Provider;

        let adapter = GrpcAdapter {
            provider: Arc::new(Stub {
                stopped: Arc::new(AtomicBool::new(false)),
            }),
        };
        let response = adapter
            .create(Request::new(proto::CreateRequest {
                resource_type: "tencentcloud_vpc".to_string(),
                planned_state: b"{".to_vec(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(response.state.is_empty());
        assert_eq!(response.diagnostics.len(), 1);
    }

    #[tokio::test]
    async fn test_adapter_returns_state_of_half_created_object() {
        use proto::provider_server::Provider;

        let adapter = GrpcAdapter {
            provider: Arc::new(Stub {
                stopped: Arc::new(AtomicBool::new(false)),
            }),
        };
        let response = adapter
            .create(Request::new(proto::CreateRequest {
                resource_type: "tencentcloud_subnet".to_string(),
                planned_state: br#"{"name":"a"}"#.to_vec(),
            }))
            .await
            .unwrap()
            .into_inner();
        let state: Value = serde_json::from_slice(&response.state).unwrap();
        assert_eq!(state["id"], "subnet-1");
        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].summary.contains("route table is gone"));
    }

    #[tokio::test]
    async fn test_serve_stops_provider_on_shutdown() {
        let stopped = Arc::new(AtomicBool::new(false));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let server = tokio::spawn(serve_listener(
            Stub {
                stopped: Arc::clone(&stopped),
            },
            listener,
            Duration::from_secs(1),
            async move {
                let _ = rx.await;
                Ok(())
            },
        ));

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
        assert!(stopped.load(Ordering::SeqCst));
    }
}
