use std::{collections::BTreeMap, fmt, sync::Arc};

use reqwest::StatusCode;

use crate::body::{FormData, RequestBody};

/// Base address used when neither the caller nor `API_URL` provides one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api/";

/// Header that carries request tags to the external invalidation layer.
pub const DEFAULT_TAGS_HEADER: &str = "x-cache-tags";

/// Configures a [`FetchClient`](crate::FetchClient) for its whole lifetime.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Base address every relative resource is joined to.
    pub base_url: String,
    /// Header name used to forward [`RequestOptions::tags`].
    pub tags_header: String,
    /// Optional `User-Agent` for the underlying transport.
    pub user_agent: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            tags_header: DEFAULT_TAGS_HEADER.to_owned(),
            user_agent: None,
        }
    }
}

impl ClientOptions {
    /// Options pointing at `base_url`, everything else default.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Reads the base address from `API_URL`.
    ///
    /// An unset or blank variable falls back to [`DEFAULT_BASE_URL`].
    pub fn from_env() -> Self {
        match std::env::var("API_URL") {
            Ok(url) if !url.trim().is_empty() => Self::with_base_url(url.trim()),
            _ => Self::default(),
        }
    }
}

/// HTTP verbs the client issues.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advisory cache directive. Forwarded as request headers, never enforced here.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum CacheMode {
    NoStore,
    Default,
    Reload,
    #[default]
    NoCache,
    ForceCache,
}

impl CacheMode {
    /// Request headers that express this directive to the transport.
    pub(crate) fn request_headers(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::NoStore => &[("cache-control", "no-store")],
            Self::NoCache => &[("cache-control", "no-cache")],
            Self::Reload => &[("cache-control", "no-cache"), ("pragma", "no-cache")],
            Self::Default | Self::ForceCache => &[],
        }
    }
}

/// Status-validation predicate. Returns `true` for acceptable statuses.
pub type ValidateStatus = Arc<dyn Fn(StatusCode) -> bool + Send + Sync>;

/// Accepts exactly the `[200, 300)` range.
pub fn default_validate_status(status: StatusCode) -> bool {
    status.is_success()
}

/// Configuration for a single [`FetchClient::execute`](crate::FetchClient::execute) call.
///
/// Starts from the defaults `GET`, `no-cache`, 20 s timeout, no retries,
/// 1 s retry delay and 2xx validation; builder methods override them.
#[derive(Clone)]
pub struct RequestOptions {
    pub method: HttpMethod,
    pub body: Option<RequestBody>,
    pub headers: BTreeMap<String, String>,
    pub cache: CacheMode,
    /// Opaque invalidation tags.
    pub tags: Vec<String>,
    /// Cancellation window per attempt, in milliseconds.
    pub timeout_ms: u64,
    /// Retries after the initial attempt.
    pub retries: u32,
    /// Pause before each retry, in milliseconds.
    pub retry_delay_ms: u64,
    pub validate_status: ValidateStatus,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: HttpMethod::Get,
            body: None,
            headers: BTreeMap::new(),
            cache: CacheMode::NoCache,
            tags: Vec::new(),
            timeout_ms: 20_000,
            retries: 0,
            retry_delay_ms: 1_000,
            validate_status: Arc::new(default_validate_status),
        }
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("method", &self.method)
            .field("body", &self.body)
            .field("headers", &self.headers)
            .field("cache", &self.cache)
            .field("tags", &self.tags)
            .field("timeout_ms", &self.timeout_ms)
            .field("retries", &self.retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("validate_status", &"<fn>")
            .finish()
    }
}

impl RequestOptions {
    /// Defaults with the given method.
    pub fn new(method: HttpMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn get() -> Self {
        Self::new(HttpMethod::Get)
    }

    pub fn post() -> Self {
        Self::new(HttpMethod::Post)
    }

    pub fn put() -> Self {
        Self::new(HttpMethod::Put)
    }

    pub fn delete() -> Self {
        Self::new(HttpMethod::Delete)
    }

    pub fn patch() -> Self {
        Self::new(HttpMethod::Patch)
    }

    /// Serializes `body` into a structured JSON body.
    ///
    /// A body that serializes to `null` sends no body at all.
    pub fn json<B: serde::Serialize + ?Sized>(mut self, body: &B) -> crate::Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|err| crate::FetchError::InvalidRequest(format!("unencodable body: {err}")))?;
        self.body = Some(RequestBody::Json(value));
        Ok(self)
    }

    /// The body that goes on the wire; a JSON `null` counts as absent.
    pub(crate) fn wire_body(&self) -> Option<&RequestBody> {
        self.body
            .as_ref()
            .filter(|body| !matches!(body, RequestBody::Json(serde_json::Value::Null)))
    }

    /// Sends `form` as a multipart payload, unmodified.
    pub fn form(mut self, form: FormData) -> Self {
        self.body = Some(RequestBody::Form(form));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn cache(mut self, cache: CacheMode) -> Self {
        self.cache = cache;
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn retry_delay_ms(mut self, retry_delay_ms: u64) -> Self {
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    /// Replaces the status-validation predicate.
    pub fn validate_status<F>(mut self, predicate: F) -> Self
    where
        F: Fn(StatusCode) -> bool + Send + Sync + 'static,
    {
        self.validate_status = Arc::new(predicate);
        self
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::{CacheMode, ClientOptions, HttpMethod, RequestOptions, DEFAULT_BASE_URL};

    #[test]
    fn request_defaults_match_documented_values() {
        let opts = RequestOptions::default();
        assert_eq!(opts.method, HttpMethod::Get);
        assert_eq!(opts.cache, CacheMode::NoCache);
        assert_eq!(opts.timeout_ms, 20_000);
        assert_eq!(opts.retries, 0);
        assert_eq!(opts.retry_delay_ms, 1_000);
        assert!(opts.body.is_none());
        assert!((opts.validate_status)(StatusCode::OK));
        assert!((opts.validate_status)(StatusCode::NO_CONTENT));
        assert!(!(opts.validate_status)(StatusCode::MULTIPLE_CHOICES));
        assert!(!(opts.validate_status)(StatusCode::NOT_FOUND));
    }

    #[test]
    fn builder_overrides_only_what_is_set() {
        let opts = RequestOptions::patch()
            .retries(3)
            .tags(["students", "list"])
            .validate_status(|status| status.as_u16() < 500);

        assert_eq!(opts.method, HttpMethod::Patch);
        assert_eq!(opts.retries, 3);
        assert_eq!(opts.timeout_ms, 20_000);
        assert_eq!(opts.tags, vec!["students".to_owned(), "list".to_owned()]);
        assert!((opts.validate_status)(StatusCode::NOT_FOUND));
    }

    #[test]
    fn null_json_body_is_not_sent() {
        let opts = RequestOptions::post().json(&None::<u32>).expect("encodes");
        assert!(opts.body.is_some());
        assert!(opts.wire_body().is_none());

        let opts = RequestOptions::post().json(&[1, 2]).expect("encodes");
        assert!(opts.wire_body().is_some());
    }

    #[test]
    fn reload_sends_pragma_and_cache_control() {
        assert_eq!(
            CacheMode::Reload.request_headers(),
            &[("cache-control", "no-cache"), ("pragma", "no-cache")]
        );
        assert!(CacheMode::ForceCache.request_headers().is_empty());
    }

    #[test]
    fn client_options_default_to_local_api() {
        let opts = ClientOptions::default();
        assert_eq!(opts.base_url, DEFAULT_BASE_URL);
        assert_eq!(opts.tags_header, "x-cache-tags");
    }
}
