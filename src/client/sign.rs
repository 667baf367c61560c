//! TC3-HMAC-SHA256 request signing for Tencent Cloud API 3.0.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use super::ApiError;

type HmacSha256 = Hmac<Sha256>;

/// Signature algorithm name placed in the `Authorization` header.
pub const ALGORITHM: &str = "TC3-HMAC-SHA256";

/// Content type used for every signed request.
pub const CONTENT_TYPE: &str = "application/json; charset=utf-8";

const SIGNED_HEADERS: &str = "content-type;host";

/// Inputs that determine a request signature.
#[derive(Debug, Clone)]
pub struct SigningInput<'a> {
    pub secret_id: &'a str,
    pub secret_key: &'a str,
    /// Short service name, e.g. `vpc`.
    pub service: &'a str,
    pub host: &'a str,
    pub payload: &'a [u8],
    /// Unix timestamp in seconds, also sent as `X-TC-Timestamp`.
    pub timestamp: i64,
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], msg: &[u8]) -> Result<Vec<u8>, ApiError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| ApiError::client("ClientError.SignatureError", e.to_string()))?;
    mac.update(msg);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// UTC date (`YYYY-MM-DD`) of the timestamp, used in the credential scope.
pub fn scope_date(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .unwrap_or_default()
        .format("%Y-%m-%d")
        .to_string()
}

/// Build the canonical request string.
pub fn canonical_request(host: &str, payload: &[u8]) -> String {
    format!(
        "POST\n/\n\ncontent-type:{}\nhost:{}\n\n{}\n{}",
        CONTENT_TYPE,
        host,
        SIGNED_HEADERS,
        sha256_hex(payload)
    )
}

/// Compute the value of the `Authorization` header.
pub fn authorization(input: &SigningInput<'_>) -> Result<String, ApiError> {
    let date = scope_date(input.timestamp);
    let scope = format!("{}/{}/tc3_request", date, input.service);

    let canonical = canonical_request(input.host, input.payload);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        input.timestamp,
        scope,
        sha256_hex(canonical.as_bytes())
    );

    let secret_date = hmac_sha256(
        format!("TC3{}", input.secret_key).as_bytes(),
        date.as_bytes(),
    )?;
    let secret_service = hmac_sha256(&secret_date, input.service.as_bytes())?;
    let secret_signing = hmac_sha256(&secret_service, b"tc3_request")?;
    let signature = hex::encode(hmac_sha256(&secret_signing, string_to_sign.as_bytes())?);

    Ok(format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, input.secret_id, scope, SIGNED_HEADERS, signature
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(payload: &[u8]) -> SigningInput<'_> {
        SigningInput {
            secret_id: "AKIDz8krbsJ5yKBZQpn74WFkmLPx3EXAMPLE",
            secret_key: "Gu5t9xGARNpq86cd98joQYCN3EXAMPLE",
            service: "vpc",
            host: "vpc.tencentcloudapi.com",
            payload,
            timestamp: 1551113065,
        }
    }

    #[test]
    fn test_scope_date_is_utc() {
        assert_eq!(scope_date(1551113065), "2019-02-25");
        assert_eq!(scope_date(0), "1970-01-01");
    }

    #[test]
    fn test_canonical_request_layout() {
        let canonical = canonical_request("vpc.tencentcloudapi.com", br#"{"Limit":1}"#);
        let lines: Vec<&str> = canonical.split('\n').collect();
        assert_eq!(lines[0], "POST");
        assert_eq!(lines[1], "/");
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "content-type:application/json; charset=utf-8");
        assert_eq!(lines[4], "host:vpc.tencentcloudapi.com");
        assert_eq!(lines[6], "content-type;host");
        assert_eq!(
            lines[7],
            "55522f708dcfebccb7bd3e8d0001a53ecaf2beca9ca801f1e9161e24215faa99"
        );
    }

    #[test]
    fn test_authorization_known_vector() {
        let auth = authorization(&input(br#"{"Limit":1}"#)).unwrap();
        assert_eq!(
            auth,
            "TC3-HMAC-SHA256 \
             Credential=AKIDz8krbsJ5yKBZQpn74WFkmLPx3EXAMPLE/2019-02-25/vpc/tc3_request, \
             SignedHeaders=content-type;host, \
             Signature=9065e361b6183ad064ccf449ec642a21938f3b7f892be3a58968421da37d8813"
        );
    }

    #[test]
    fn test_signature_depends_on_payload() {
        let a = authorization(&input(br#"{"Limit":1}"#)).unwrap();
        let b = authorization(&input(br#"{"Limit":2}"#)).unwrap();
        assert_ne!(a, b);
    }
}
