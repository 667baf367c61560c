//! Tencent Cloud VPC provider
//!
//! A provider plugin that manages Tencent Cloud VPC networking: VPCs,
//! subnets, route tables, security groups, ENIs, NAT gateways, EIPs,
//! peering connections, parameter templates and snapshot policies, plus
//! read-only data sources over the same objects.
//!
//! # Layout
//!
//! - [`client`]: signed JSON transport for API 3.0 (TC3-HMAC-SHA256)
//! - [`service`]: typed VPC and tag API calls with pagination and retries
//! - [`resources`] / [`data_sources`]: one handler per type name
//! - [`provider`]: registry, configuration, planning and dispatch
//! - [`server`]: the gRPC plugin protocol and handshake
//!
//! # Handshake
//!
//! The binary prints one line to stdout and then serves gRPC on that
//! address until SIGTERM or SIGINT:
//!
//! ```text
//! HEMMER_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! # Embedding
//!
//! ```no_run
//! use tencentcloud_vpc_provider::{serve, TencentCloudProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tencentcloud_vpc_provider::ProviderError> {
//!     tencentcloud_vpc_provider::init_logging();
//!     serve(TencentCloudProvider::new()).await
//! }
//! ```

#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod data_sources;
pub mod error;
pub mod helper;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod ratelimit;
pub mod resources;
pub mod retry;
pub mod schema;
pub mod server;
pub mod service;
pub mod state;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::TencentCloudProvider;
pub use schema::ProviderSchema;
pub use server::{serve, serve_listener, serve_with_options, shutdown_signal, ProviderService, ServeOptions};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::{is_valid, validate, validate_result};
