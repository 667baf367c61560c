//! Signed JSON transport for Tencent Cloud API 3.0.

mod error;
pub mod sign;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use error::{ApiError, HTTP_STATUS_CODE_ERROR, NETWORK_ERROR, PARSE_ERROR};

use crate::ratelimit::RateLimiter;

/// Default root domain of the public API endpoints.
pub const DEFAULT_DOMAIN: &str = "tencentcloudapi.com";

/// Cloud products called by this provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Product {
    Vpc,
    Tag,
}

impl Product {
    pub fn service(self) -> &'static str {
        match self {
            Self::Vpc => "vpc",
            Self::Tag => "tag",
        }
    }

    pub fn version(self) -> &'static str {
        match self {
            Self::Vpc => "2017-03-12",
            Self::Tag => "2018-08-13",
        }
    }
}

/// Access key pair with an optional STS session token.
#[derive(Clone)]
pub struct Credential {
    pub secret_id: String,
    pub secret_key: String,
    pub token: Option<String>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"<redacted>")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Connection settings for [`TencentCloudClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub region: String,
    /// `https` or `http`.
    pub scheme: String,
    pub domain: String,
    pub timeout: Duration,
    /// Replaces `<scheme>://<service>.<domain>` for every product.
    pub base_url: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            region: String::new(),
            scheme: "https".to_string(),
            domain: DEFAULT_DOMAIN.to_string(),
            timeout: Duration::from_secs(60),
            base_url: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Response")]
    response: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
}

/// Client shared by every handler of one configured provider.
#[derive(Clone)]
pub struct TencentCloudClient {
    http: reqwest::Client,
    credential: Credential,
    options: ClientOptions,
    limiter: Arc<RateLimiter>,
}

impl std::fmt::Debug for TencentCloudClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TencentCloudClient")
            .field("credential", &self.credential)
            .field("options", &self.options)
            .finish()
    }
}

impl TencentCloudClient {
    pub fn new(credential: Credential, options: ClientOptions) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(concat!("tencentcloud-vpc-provider/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            credential,
            options,
            limiter: Arc::new(RateLimiter::default()),
        })
    }

    /// Use a custom limiter, shared with other clients if desired.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn region(&self) -> &str {
        &self.options.region
    }

    fn host(&self, product: Product) -> String {
        format!("{}.{}", product.service(), self.options.domain)
    }

    fn endpoint(&self, product: Product) -> String {
        match &self.options.base_url {
            Some(base) => format!("{}/", base.trim_end_matches('/')),
            None => format!("{}://{}/", self.options.scheme, self.host(product)),
        }
    }

    fn headers(
        &self,
        product: Product,
        action: &str,
        payload: &[u8],
    ) -> Result<HeaderMap, ApiError> {
        let timestamp = chrono::Utc::now().timestamp();
        let host = self.host(product);
        let authorization = sign::authorization(&sign::SigningInput {
            secret_id: &self.credential.secret_id,
            secret_key: &self.credential.secret_key,
            service: product.service(),
            host: &host,
            payload,
            timestamp,
        })?;

        let mut headers = HeaderMap::new();
        let mut insert = |name: &'static str, value: &str| -> Result<(), ApiError> {
            let value = HeaderValue::from_str(value).map_err(|_| {
                ApiError::client(
                    "ClientError.InvalidHeader",
                    format!("invalid value for header {}", name),
                )
            })?;
            headers.insert(name, value);
            Ok(())
        };

        insert("authorization", &authorization)?;
        insert("content-type", sign::CONTENT_TYPE)?;
        insert("x-tc-action", action)?;
        insert("x-tc-version", product.version())?;
        insert("x-tc-timestamp", &timestamp.to_string())?;
        insert("x-tc-language", "en-US")?;
        if !self.options.region.is_empty() {
            insert("x-tc-region", &self.options.region)?;
        }
        if let Some(token) = &self.credential.token {
            insert("x-tc-token", token)?;
        }
        Ok(headers)
    }

    /// Call `action` on `product` and decode the `Response` object.
    pub async fn call<Req, Resp>(
        &self,
        product: Product,
        action: &str,
        request: &Req,
    ) -> Result<Resp, ApiError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        self.limiter.check(action).await;

        let payload = serde_json::to_vec(request)
            .map_err(|e| ApiError::client(PARSE_ERROR, e.to_string()))?;
        let headers = self.headers(product, action, &payload)?;

        debug!(action, service = product.service(), "calling cloud API");

        let response = self
            .http
            .post(self.endpoint(product))
            .headers(headers)
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(action, status = status.as_u16(), "cloud API returned non-2xx status");
            return Err(ApiError::client(
                HTTP_STATUS_CODE_ERROR,
                format!("HTTP status {}: {}", status.as_u16(), truncate(&body, 200)),
            ));
        }

        decode_response(action, &body)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Decode an API 3.0 envelope, surfacing an embedded `Error`.
pub fn decode_response<Resp: DeserializeOwned>(
    action: &str,
    body: &str,
) -> Result<Resp, ApiError> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| ApiError::client(PARSE_ERROR, format!("{}: {}", action, e)))?;

    let request_id = envelope
        .response
        .get("RequestId")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    if let Some(error) = envelope.response.get("Error") {
        let error: ErrorBody = serde_json::from_value(error.clone())
            .map_err(|e| ApiError::client(PARSE_ERROR, format!("{}: {}", action, e)))?;
        warn!(action, code = %error.code, request_id = %request_id, "cloud API error");
        return Err(ApiError::new(error.code, error.message).with_request_id(request_id));
    }

    debug!(action, request_id = %request_id, "cloud API call succeeded");

    serde_json::from_value(envelope.response).map_err(|e| {
        ApiError::client(PARSE_ERROR, format!("{}: {}", action, e)).with_request_id(request_id)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct CreateVpcResponse {
        vpc: serde_json::Value,
        request_id: String,
    }

    fn test_client(base_url: String) -> TencentCloudClient {
        TencentCloudClient::new(
            Credential {
                secret_id: "AKIDtest".to_string(),
                secret_key: "secret".to_string(),
                token: Some("sts-token".to_string()),
            },
            ClientOptions {
                region: "ap-guangzhou".to_string(),
                base_url: Some(base_url),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_decode_success() {
        let body = r#"{"Response":{"Vpc":{"VpcId":"vpc-1"},"RequestId":"r-1"}}"#;
        let resp: CreateVpcResponse = decode_response("CreateVpc", body).unwrap();
        assert_eq!(resp.vpc["VpcId"], "vpc-1");
        assert_eq!(resp.request_id, "r-1");
    }

    #[test]
    fn test_decode_embedded_error() {
        let body = r#"{"Response":{"Error":{"Code":"ResourceNotFound","Message":"gone"},"RequestId":"r-2"}}"#;
        let err = decode_response::<serde_json::Value>("DescribeVpcs", body).unwrap_err();
        assert_eq!(err.code, "ResourceNotFound");
        assert_eq!(err.message, "gone");
        assert_eq!(err.request_id, "r-2");
    }

    #[test]
    fn test_decode_garbage() {
        let err = decode_response::<serde_json::Value>("DescribeVpcs", "not json").unwrap_err();
        assert_eq!(err.code, PARSE_ERROR);
    }

    #[test]
    fn test_credential_debug_redacts_secrets() {
        let cred = Credential {
            secret_id: "AKID".to_string(),
            secret_key: "very-secret".to_string(),
            token: Some("tok".to_string()),
        };
        let out = format!("{:?}", cred);
        assert!(!out.contains("very-secret"));
        assert!(!out.contains("tok\""));
    }

    #[tokio::test]
    async fn test_call_sends_signed_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("x-tc-action", "CreateVpc"))
            .and(header("x-tc-version", "2017-03-12"))
            .and(header("x-tc-region", "ap-guangzhou"))
            .and(header("x-tc-token", "sts-token"))
            .and(header("x-tc-language", "en-US"))
            .and(header_exists("authorization"))
            .and(header_exists("x-tc-timestamp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Response": {"Vpc": {"VpcId": "vpc-abc"}, "RequestId": "req"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(server.uri());
        let resp: CreateVpcResponse = client
            .call(Product::Vpc, "CreateVpc", &json!({"VpcName": "a"}))
            .await
            .unwrap();
        assert_eq!(resp.vpc["VpcId"], "vpc-abc");
    }

    #[tokio::test]
    async fn test_call_maps_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = test_client(server.uri());
        let err = client
            .call::<_, serde_json::Value>(Product::Tag, "ModifyResourceTags", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.code, HTTP_STATUS_CODE_ERROR);
    }

    #[tokio::test]
    async fn test_call_maps_network_error() {
        let client = test_client("http://127.0.0.1:1".to_string());
        let err = client
            .call::<_, serde_json::Value>(Product::Vpc, "DescribeVpcs", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.code, NETWORK_ERROR);
    }
}
