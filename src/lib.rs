//! `resilient-fetch` is the outbound HTTP request layer of the student CRM
//! dashboard.
//!
//! Every call goes through [`FetchClient::execute`], which adds:
//! - a per-attempt timeout surfaced as [`FetchError::Cancelled`]
//! - bounded retry with a fixed delay
//! - status validation through a caller-supplied predicate
//! - content-type aware body decoding into [`Payload`]
//!
//! [`StudentsApi`] is the typed caller used by the dashboard pages.

mod body;
mod client;
mod error;
mod options;
mod types;

pub mod students;

pub use body::{FormData, RequestBody};
pub use client::FetchClient;
pub use error::{FetchError, HttpError, UNKNOWN_ERROR_CODE};
pub use options::{
    default_validate_status, CacheMode, ClientOptions, HttpMethod, RequestOptions,
    ValidateStatus, DEFAULT_BASE_URL, DEFAULT_TAGS_HEADER,
};
pub use students::{Student, StudentPage, StudentQuery, StudentStatus, StudentsApi};
pub use types::{FetchResponse, Payload};

pub use reqwest::{header::HeaderMap, StatusCode, Url};

pub type Result<T> = std::result::Result<T, FetchError>;
