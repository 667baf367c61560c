use thiserror::Error;

/// Code used when the HTTP request itself fails.
pub const NETWORK_ERROR: &str = "ClientError.NetworkError";

/// Code used when the API answers with a non-2xx status.
pub const HTTP_STATUS_CODE_ERROR: &str = "ClientError.HttpStatusCodeError";

/// Code used when a response body cannot be decoded.
pub const PARSE_ERROR: &str = "ClientError.ParseJsonError";

/// Error reported by the Tencent Cloud API or by the client on its behalf.
///
/// Never carries credentials: only the vendor code, message and request id.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("[TencentCloudSDKError] Code={code}, Message={message}, RequestId={request_id}")]
pub struct ApiError {
    pub code: String,
    pub message: String,
    pub request_id: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            request_id: String::new(),
        }
    }

    /// Error raised locally, before or without a server response.
    pub fn client(code: &str, message: impl Into<String>) -> Self {
        Self::new(code, message)
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::client(NETWORK_ERROR, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_format() {
        let err = ApiError::new("ResourceNotFound", "vpc not found").with_request_id("abc");
        assert_eq!(
            err.to_string(),
            "[TencentCloudSDKError] Code=ResourceNotFound, Message=vpc not found, RequestId=abc"
        );
    }
}
