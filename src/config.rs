//! Provider configuration with environment fallbacks.

use std::time::Duration;

use serde::Deserialize;

use crate::client::{ClientOptions, Credential, DEFAULT_DOMAIN};
use crate::schema::{Attribute, Diagnostic, Schema, Validator};

pub const ENV_SECRET_ID: &str = "TENCENTCLOUD_SECRET_ID";
pub const ENV_SECRET_KEY: &str = "TENCENTCLOUD_SECRET_KEY";
pub const ENV_SECURITY_TOKEN: &str = "TENCENTCLOUD_SECURITY_TOKEN";
pub const ENV_REGION: &str = "TENCENTCLOUD_REGION";
pub const ENV_PROTOCOL: &str = "TENCENTCLOUD_PROTOCOL";
pub const ENV_DOMAIN: &str = "TENCENTCLOUD_DOMAIN";

/// Seconds allowed for one HTTP round trip unless configured.
pub const DEFAULT_REQUEST_TIMEOUT: u64 = 60;

/// Provider block as written by the user. Unset fields fall back to env.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub secret_id: Option<String>,
    pub secret_key: Option<String>,
    pub security_token: Option<String>,
    pub region: Option<String>,
    pub protocol: Option<String>,
    pub domain: Option<String>,
    pub request_timeout: Option<u64>,
}

/// Fully resolved settings used to build the API client.
#[derive(Debug, Clone)]
pub struct TencentCloudConfig {
    pub credential: Credential,
    pub options: ClientOptions,
}

/// Schema of the provider block.
pub fn provider_schema() -> Schema {
    Schema::v0()
        .with_description("Tencent Cloud VPC provider")
        .with_attribute(
            "secret_id",
            Attribute::optional_string()
                .with_description(format!("API secret id. Falls back to `{}`.", ENV_SECRET_ID)),
        )
        .with_attribute(
            "secret_key",
            Attribute::optional_string()
                .sensitive()
                .with_description(format!("API secret key. Falls back to `{}`.", ENV_SECRET_KEY)),
        )
        .with_attribute(
            "security_token",
            Attribute::optional_string().sensitive().with_description(format!(
                "STS session token. Falls back to `{}`.",
                ENV_SECURITY_TOKEN
            )),
        )
        .with_attribute(
            "region",
            Attribute::optional_string()
                .with_description(format!("Region, e.g. `ap-guangzhou`. Falls back to `{}`.", ENV_REGION)),
        )
        .with_attribute(
            "protocol",
            Attribute::optional_string()
                .with_validator(Validator::allowed_strings(["HTTPS", "HTTP"]))
                .with_description("`HTTPS` (default) or `HTTP`."),
        )
        .with_attribute(
            "domain",
            Attribute::optional_string()
                .with_description(format!("Root domain of the API. Default `{}`.", DEFAULT_DOMAIN)),
        )
        .with_attribute(
            "request_timeout",
            Attribute::optional_int64()
                .with_validator(Validator::int_range(1, 3600))
                .with_description("Seconds allowed for one API request. Default 60."),
        )
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ProviderConfig {
    /// Parse the provider block from its JSON form.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Self::deserialize(value)
    }

    /// Fill unset fields from the process environment.
    pub fn resolve(self) -> Result<TencentCloudConfig, Vec<Diagnostic>> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Fill unset fields from `env` and check that credentials are present.
    pub fn resolve_with(
        self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<TencentCloudConfig, Vec<Diagnostic>> {
        let pick = |value: Option<String>, key: &str| non_empty(value).or_else(|| non_empty(env(key)));

        let secret_id = pick(self.secret_id, ENV_SECRET_ID);
        let secret_key = pick(self.secret_key, ENV_SECRET_KEY);
        let security_token = pick(self.security_token, ENV_SECURITY_TOKEN);
        let region = pick(self.region, ENV_REGION);
        let protocol = pick(self.protocol, ENV_PROTOCOL).unwrap_or_else(|| "HTTPS".to_string());
        let domain = pick(self.domain, ENV_DOMAIN).unwrap_or_else(|| DEFAULT_DOMAIN.to_string());

        let mut diagnostics = Vec::new();
        let missing = |attr: &str, env_key: &str| {
            Diagnostic::error(format!("Missing `{}`", attr))
                .with_detail(format!("Set `{}` in the provider block or the `{}` environment variable.", attr, env_key))
                .with_attribute(attr)
        };
        if secret_id.is_none() {
            diagnostics.push(missing("secret_id", ENV_SECRET_ID));
        }
        if secret_key.is_none() {
            diagnostics.push(missing("secret_key", ENV_SECRET_KEY));
        }
        if region.is_none() {
            diagnostics.push(missing("region", ENV_REGION));
        }

        let scheme = match protocol.to_ascii_uppercase().as_str() {
            "HTTPS" => "https",
            "HTTP" => "http",
            other => {
                diagnostics.push(
                    Diagnostic::error(format!("Unsupported protocol `{}`", other))
                        .with_detail("Expected `HTTPS` or `HTTP`.")
                        .with_attribute("protocol"),
                );
                "https"
            },
        };

        match (secret_id, secret_key, region) {
            (Some(secret_id), Some(secret_key), Some(region)) if diagnostics.is_empty() => {
                Ok(TencentCloudConfig {
                    credential: Credential {
                        secret_id,
                        secret_key,
                        token: security_token,
                    },
                    options: ClientOptions {
                        region,
                        scheme: scheme.to_string(),
                        domain,
                        timeout: Duration::from_secs(
                            self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
                        ),
                        base_url: None,
                    },
                })
            },
            _ => Err(diagnostics),
        }
    }
}
