use std::fmt;
use std::time::Duration;

use reqwest::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    StatusCode, Url,
};
use tokio::time::sleep;

use crate::{
    body::{decode_json_lenient, is_json_content_type},
    ClientOptions, FetchError, FetchResponse, HttpError, Payload, RequestBody, RequestOptions,
    Result,
};

/// Statuses in this inclusive range are never retried.
const NON_RETRYABLE_STATUS: std::ops::RangeInclusive<u16> = 400..=500;

#[derive(Clone)]
/// Resilient HTTP client: timeout, retry, status validation and body decoding
/// over a shared `reqwest::Client`.
pub struct FetchClient {
    http: reqwest::Client,
    base_url: Url,
    options: ClientOptions,
}

impl fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchClient")
            .field("base_url", &self.base_url.as_str())
            .field("options", &self.options)
            .finish()
    }
}

impl FetchClient {
    /// Creates a client that resolves resources against `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_options(ClientOptions::with_base_url(base_url))
    }

    /// Creates a client from explicit options.
    pub fn with_options(options: ClientOptions) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(user_agent) = &options.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let http = builder.build().map_err(FetchError::Transport)?;
        Self::with_http_client(http, options)
    }

    /// Creates a client over an existing transport.
    ///
    /// `options.user_agent` is ignored here; configure it on `http` instead.
    pub fn with_http_client(http: reqwest::Client, options: ClientOptions) -> Result<Self> {
        let base_url = Url::parse(options.base_url.trim()).map_err(|err| {
            FetchError::InvalidRequest(format!("invalid base url '{}': {err}", options.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::InvalidRequest(format!(
                "base url '{base_url}' cannot be joined to"
            )));
        }
        HeaderName::from_bytes(options.tags_header.as_bytes()).map_err(|err| {
            FetchError::InvalidRequest(format!(
                "invalid tags header '{}': {err}",
                options.tags_header
            ))
        })?;

        Ok(Self {
            http,
            base_url,
            options,
        })
    }

    /// Creates a client whose base address comes from `API_URL`.
    ///
    /// See [`ClientOptions::from_env`].
    pub fn from_env() -> Result<Self> {
        Self::with_options(ClientOptions::from_env())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves `resource` against the base address.
    ///
    /// Relative paths are joined to the base; absolute URLs replace it.
    pub fn resolve(&self, resource: &str) -> Result<Url> {
        self.base_url.join(resource).map_err(|err| {
            FetchError::InvalidRequest(format!("invalid resource '{resource}': {err}"))
        })
    }

    /// Executes one logical call, retrying per `options`.
    ///
    /// Returns `Ok` only when a response arrived and `validate_status`
    /// accepted its status. Rejected statuses surface as
    /// [`FetchError::Http`], elapsed timeouts as [`FetchError::Cancelled`].
    pub async fn execute(&self, resource: &str, options: RequestOptions) -> Result<FetchResponse> {
        let url = self.resolve(resource)?;
        let headers = self.build_headers(&options)?;
        let mut attempts_left = options.retries;
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            #[cfg(feature = "tracing")]
            tracing::debug!(method = %options.method, url = %url, attempt = attempts, "sending request");

            match self.attempt(&url, &headers, &options).await {
                Ok(mut response) => {
                    response.attempts = attempts;
                    response.tags = options.tags.clone();
                    return Ok(response);
                }
                Err(err) => {
                    if attempts_left > 0 && is_retryable(&err) {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(
                            url = %url,
                            error = %err,
                            "request failed, retrying... ({} attempts left)",
                            attempts_left
                        );

                        sleep(Duration::from_millis(options.retry_delay_ms)).await;
                        attempts_left -= 1;
                        continue;
                    }

                    #[cfg(feature = "tracing")]
                    log_terminal_error(&err);

                    return Err(err);
                }
            }
        }
    }

    /// Issues a single attempt under its own cancellation window.
    async fn attempt(
        &self,
        url: &Url,
        headers: &HeaderMap,
        options: &RequestOptions,
    ) -> Result<FetchResponse> {
        let timeout_ms = options.timeout_ms;
        let mut request = self
            .http
            .request(options.method.into(), url.clone())
            .headers(headers.clone())
            .timeout(Duration::from_millis(timeout_ms));

        request = match options.wire_body() {
            None => request,
            Some(RequestBody::Json(value)) => request.json(value),
            Some(RequestBody::Form(form)) => request.multipart(form.to_multipart()?),
        };

        let response = request
            .send()
            .await
            .map_err(|err| classify_transport(err, timeout_ms))?;

        let status = response.status();
        let headers = response.headers().clone();
        let final_url = response.url().clone();

        if !(options.validate_status)(status) {
            let body = match response.bytes().await {
                Ok(bytes) => decode_json_lenient(&bytes),
                Err(err) if err.is_timeout() => return Err(FetchError::Cancelled { timeout_ms }),
                Err(_) => serde_json::Value::Object(Default::default()),
            };
            return Err(HttpError::new(status, headers, final_url, body).into());
        }

        let data = if status == StatusCode::NO_CONTENT {
            None
        } else {
            let content_type = headers
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok());
            if is_json_content_type(content_type) {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|err| classify_transport(err, timeout_ms))?;
                Some(Payload::Json(decode_json_lenient(&bytes)))
            } else {
                let text = response
                    .text()
                    .await
                    .map_err(|err| classify_transport(err, timeout_ms))?;
                Some(Payload::Text(text))
            }
        };

        Ok(FetchResponse {
            data,
            status,
            headers,
            url: final_url,
            attempts: 0,
            tags: Vec::new(),
        })
    }

    fn build_headers(&self, options: &RequestOptions) -> Result<HeaderMap> {
        let mut headers = HeaderMap::with_capacity(options.headers.len() + 3);

        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                FetchError::InvalidRequest(format!("invalid header name '{name}': {err}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|err| {
                FetchError::InvalidRequest(format!("invalid value for header '{name}': {err}"))
            })?;
            headers.insert(name, value);
        }

        if matches!(options.wire_body(), Some(RequestBody::Json(_)))
            && !headers.contains_key(header::CONTENT_TYPE)
        {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }

        if !headers.contains_key(header::CACHE_CONTROL) {
            for &(name, value) in options.cache.request_headers() {
                headers
                    .entry(name)
                    .or_insert_with(|| HeaderValue::from_static(value));
            }
        }

        if !options.tags.is_empty() {
            let name = HeaderName::from_bytes(self.options.tags_header.as_bytes()).map_err(
                |err| FetchError::InvalidRequest(format!("invalid tags header: {err}")),
            )?;
            let value = HeaderValue::from_str(&options.tags.join(",")).map_err(|err| {
                FetchError::InvalidRequest(format!("tags are not a valid header value: {err}"))
            })?;
            headers.insert(name, value);
        }

        Ok(headers)
    }
}

/// Maps a `reqwest` failure; an elapsed per-attempt timeout is a cancellation.
fn classify_transport(err: reqwest::Error, timeout_ms: u64) -> FetchError {
    if err.is_timeout() {
        FetchError::Cancelled { timeout_ms }
    } else {
        FetchError::Transport(err)
    }
}

#[cfg(feature = "tracing")]
fn log_terminal_error(err: &FetchError) {
    match err {
        FetchError::Http(http) => tracing::error!(
            status = http.status.as_u16(),
            code = %http.code,
            errors = ?http.errors,
            "HTTP error: {}",
            http.message
        ),
        other => tracing::debug!(error = %other, "request failed"),
    }
}

/// Whether a failed attempt may be reissued.
///
/// Cancellations are final. Rejected statuses in `[400, 500]` are final,
/// everything else that reached the network is retried.
pub(crate) fn is_retryable(err: &FetchError) -> bool {
    match err {
        FetchError::Http(http) => !NON_RETRYABLE_STATUS.contains(&http.status.as_u16()),
        FetchError::Transport(_) => true,
        FetchError::Cancelled { .. } | FetchError::InvalidRequest(_) | FetchError::Decode(_) => {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use reqwest::{
        header::{self, HeaderMap},
        StatusCode, Url,
    };
    use serde_json::json;

    use super::{is_retryable, FetchClient};
    use crate::{CacheMode, ClientOptions, FetchError, FormData, HttpError, RequestOptions};

    fn client() -> FetchClient {
        FetchClient::new("http://localhost:3000/api/").expect("valid base url")
    }

    fn http_error(status: u16) -> FetchError {
        HttpError::new(
            StatusCode::from_u16(status).expect("valid status"),
            HeaderMap::new(),
            Url::parse("http://localhost/").expect("static url"),
            json!({}),
        )
        .into()
    }

    #[test]
    fn client_errors_and_500_are_not_retried() {
        for status in [400, 401, 404, 422, 499, 500] {
            assert!(!is_retryable(&http_error(status)), "status {status}");
        }
    }

    #[test]
    fn other_rejected_statuses_are_retried() {
        for status in [302, 399, 501, 502, 503, 504] {
            assert!(is_retryable(&http_error(status)), "status {status}");
        }
    }

    #[test]
    fn cancellation_is_never_retried() {
        assert!(!is_retryable(&FetchError::Cancelled { timeout_ms: 10 }));
        assert!(!is_retryable(&FetchError::InvalidRequest("x".to_owned())));
    }

    #[test]
    fn resolve_joins_relative_and_keeps_absolute() {
        let client = client();
        assert_eq!(
            client.resolve("students?page=1").expect("joins").as_str(),
            "http://localhost:3000/api/students?page=1"
        );
        assert_eq!(
            client.resolve("/api/students/7").expect("joins").as_str(),
            "http://localhost:3000/api/students/7"
        );
        assert_eq!(
            client
                .resolve("https://crm.example.com/v1/students")
                .expect("absolute")
                .as_str(),
            "https://crm.example.com/v1/students"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            FetchClient::new("not a url"),
            Err(FetchError::InvalidRequest(_))
        ));
        assert!(matches!(
            FetchClient::new("mailto:crm@example.com"),
            Err(FetchError::InvalidRequest(_))
        ));
    }

    #[test]
    fn json_body_gets_implicit_content_type() {
        let opts = RequestOptions::post()
            .json(&json!({"status": "Approved"}))
            .expect("encodes");
        let headers = client().build_headers(&opts).expect("valid headers");
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn explicit_content_type_is_kept() {
        let opts = RequestOptions::post()
            .header("content-type", "application/merge-patch+json")
            .json(&json!({"status": "Approved"}))
            .expect("encodes");
        let headers = client().build_headers(&opts).expect("valid headers");
        assert_eq!(
            headers[header::CONTENT_TYPE],
            "application/merge-patch+json"
        );
    }

    #[test]
    fn null_json_body_has_no_content_type() {
        let opts = RequestOptions::delete()
            .json(&serde_json::Value::Null)
            .expect("encodes");
        let headers = client().build_headers(&opts).expect("valid headers");
        assert!(!headers.contains_key(header::CONTENT_TYPE));
    }

    #[test]
    fn form_body_has_no_json_content_type() {
        let opts = RequestOptions::post().form(FormData::new().text("a", "b"));
        let headers = client().build_headers(&opts).expect("valid headers");
        assert!(!headers.contains_key(header::CONTENT_TYPE));
    }

    #[test]
    fn cache_directive_is_forwarded_unless_overridden() {
        let client = client();

        let headers = client
            .build_headers(&RequestOptions::get().cache(CacheMode::Reload))
            .expect("valid headers");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers[header::PRAGMA], "no-cache");

        let headers = client
            .build_headers(
                &RequestOptions::get()
                    .cache(CacheMode::NoStore)
                    .header("Cache-Control", "max-age=60"),
            )
            .expect("valid headers");
        assert_eq!(headers[header::CACHE_CONTROL], "max-age=60");
    }

    #[test]
    fn tags_are_forwarded_in_configured_header() {
        let client = FetchClient::with_options(ClientOptions {
            tags_header: "x-crm-tags".to_owned(),
            ..ClientOptions::default()
        })
        .expect("valid options");
        let headers = client
            .build_headers(&RequestOptions::get().tags(["students", "list"]))
            .expect("valid headers");
        assert_eq!(headers["x-crm-tags"], "students,list");

        let headers = client
            .build_headers(&RequestOptions::get())
            .expect("valid headers");
        assert!(!headers.contains_key("x-crm-tags"));
    }

    #[test]
    fn invalid_header_is_reported_before_sending() {
        let opts = RequestOptions::get().header("bad header", "x");
        assert!(matches!(
            client().build_headers(&opts),
            Err(FetchError::InvalidRequest(_))
        ));
    }

    #[test]
    fn debug_shows_base_url() {
        let debug = format!("{:?}", client());
        assert!(debug.contains("http://localhost:3000/api/"));
    }
}
