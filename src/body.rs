use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::{FetchError, Result};

/// Outbound request body.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
    /// Structured value encoded as JSON text.
    Json(Value),
    /// Multipart form payload, passed to the transport unmodified.
    Form(FormData),
}

/// Multipart form payload.
///
/// Kept as owned parts so every retry can rebuild an identical form.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FormData {
    parts: Vec<FormPart>,
}

#[derive(Clone, Debug, PartialEq)]
enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: Option<String>,
        bytes: Vec<u8>,
    },
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: Option<&str>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            file_name: file_name.into(),
            mime: mime.map(str::to_owned),
            bytes: bytes.into(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub(crate) fn to_multipart(&self) -> Result<Form> {
        self.parts.iter().try_fold(Form::new(), |form, part| -> Result<Form> {
            match part {
                FormPart::Text { name, value } => Ok(form.text(name.clone(), value.clone())),
                FormPart::File {
                    name,
                    file_name,
                    mime,
                    bytes,
                } => {
                    let mut file = Part::bytes(bytes.clone()).file_name(file_name.clone());
                    if let Some(mime) = mime {
                        file = file.mime_str(mime).map_err(|err| {
                            FetchError::InvalidRequest(format!("invalid mime type '{mime}': {err}"))
                        })?;
                    }
                    Ok(form.part(name.clone(), file))
                }
            }
        })
    }
}

/// Whether a `Content-Type` value declares a JSON payload.
pub(crate) fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|value| value.to_ascii_lowercase().contains("application/json"))
}

/// Parses `bytes` as JSON, substituting an empty object for malformed input.
pub(crate) fn decode_json_lenient(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap_or_else(|_| Value::Object(Default::default()))
}
