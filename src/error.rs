use reqwest::{header::HeaderMap, StatusCode, Url};
use serde_json::Value;

/// Fallback machine-readable code for error bodies without `error.code`.
pub const UNKNOWN_ERROR_CODE: &str = "UNKNOWN_ERROR";

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Response status rejected by the validation predicate.
    #[error(transparent)]
    Http(Box<HttpError>),
    /// Attempt aborted because its timeout elapsed. Never retried.
    #[error("request cancelled after {timeout_ms} ms")]
    Cancelled { timeout_ms: u64 },
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Request could not be built (bad URL, header or body).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Payload could not be converted to the requested type.
    #[error("decode error: {0}")]
    Decode(String),
}

impl FetchError {
    /// The HTTP error, if this failure is a rejected status.
    pub fn as_http(&self) -> Option<&HttpError> {
        match self {
            Self::Http(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Status of a rejected response.
    pub fn status(&self) -> Option<StatusCode> {
        self.as_http().map(|err| err.status)
    }
}

impl From<HttpError> for FetchError {
    fn from(err: HttpError) -> Self {
        Self::Http(Box::new(err))
    }
}

/// A response whose status failed validation.
///
/// Owns the response's status, headers and URL together with the decoded
/// error body.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct HttpError {
    pub status: StatusCode,
    /// `error.code` of the body, or [`UNKNOWN_ERROR_CODE`].
    pub code: String,
    /// `error.errors` of the body.
    pub errors: Option<Value>,
    /// Status text, or `HTTP error! status: <n>` when the status has none.
    pub message: String,
    pub headers: HeaderMap,
    pub url: Url,
    /// Whole decoded body; `{}` when it was not JSON.
    pub body: Value,
}

impl HttpError {
    pub(crate) fn new(status: StatusCode, headers: HeaderMap, url: Url, body: Value) -> Self {
        let error = body.get("error");
        let code = error
            .and_then(|error| error.get("code"))
            .and_then(Value::as_str)
            .filter(|code| !code.is_empty())
            .unwrap_or(UNKNOWN_ERROR_CODE)
            .to_owned();
        let errors = error
            .and_then(|error| error.get("errors"))
            .filter(|errors| !errors.is_null())
            .cloned();
        let message = status
            .canonical_reason()
            .map(str::to_owned)
            .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));

        Self {
            status,
            code,
            errors,
            message,
            headers,
            url,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use reqwest::{header::HeaderMap, StatusCode, Url};
    use serde_json::json;

    use super::{FetchError, HttpError, UNKNOWN_ERROR_CODE};

    fn url() -> Url {
        Url::parse("http://localhost:3000/api/students").expect("static url")
    }

    #[test]
    fn extracts_code_and_errors_from_body() {
        let err = HttpError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            HeaderMap::new(),
            url(),
            json!({"error": {"code": "VALIDATION", "errors": [{"field": "status"}]}}),
        );
        assert_eq!(err.code, "VALIDATION");
        assert_eq!(err.errors, Some(json!([{"field": "status"}])));
        assert_eq!(err.message, "Unprocessable Entity");
    }

    #[test]
    fn missing_code_defaults_to_unknown() {
        let err = HttpError::new(StatusCode::BAD_GATEWAY, HeaderMap::new(), url(), json!({}));
        assert_eq!(err.code, UNKNOWN_ERROR_CODE);
        assert!(err.errors.is_none());
    }

    #[test]
    fn non_standard_status_uses_generic_message() {
        let status = StatusCode::from_u16(599).expect("valid status");
        let err = HttpError::new(status, HeaderMap::new(), url(), json!("oops"));
        assert_eq!(err.message, "HTTP error! status: 599");
        assert_eq!(err.code, UNKNOWN_ERROR_CODE);
    }

    #[test]
    fn fetch_error_exposes_status() {
        let err: FetchError =
            HttpError::new(StatusCode::NOT_FOUND, HeaderMap::new(), url(), json!({})).into();
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.to_string(), "Not Found");
        assert!(!err.is_cancelled());
    }
}
