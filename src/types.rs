use reqwest::{header::HeaderMap, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{FetchError, Result};

/// Decoded response body.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// Body of a JSON-typed response (`{}` when it was malformed).
    Json(Value),
    /// Body of any other content type, as text.
    Text(String),
}

impl Payload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Json(_) => None,
        }
    }
}

/// Successful outcome of [`FetchClient::execute`](crate::FetchClient::execute).
#[derive(Clone, Debug)]
pub struct FetchResponse {
    /// `None` for `204 No Content`.
    pub data: Option<Payload>,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub url: Url,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    /// Tags the request was issued with.
    pub tags: Vec<String>,
}

impl FetchResponse {
    /// Deserializes a JSON payload into `T`.
    ///
    /// Returns `Ok(None)` when there is no payload.
    pub fn json<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match &self.data {
            None => Ok(None),
            Some(Payload::Json(value)) => T::deserialize(value)
                .map(Some)
                .map_err(|err| FetchError::Decode(format!("unexpected payload shape: {err}"))),
            Some(Payload::Text(_)) => Err(FetchError::Decode(format!(
                "expected JSON payload from {}, got text",
                self.url
            ))),
        }
    }

    /// Like [`FetchResponse::json`] but requires a payload.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T> {
        self.json()?.ok_or_else(|| {
            FetchError::Decode(format!(
                "empty payload from {} (status {})",
                self.url,
                self.status.as_u16()
            ))
        })
    }
}
