//! Request bodies
//!
//! Every body is held fully in memory so the executor can replay it on each
//! scheme probe and after a refresh. Multipart forms are kept as field lists
//! and rebuilt into a fresh form per attempt.

use bytes::Bytes;
use reqwest::header::HeaderValue;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Body as supplied by a caller.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Serialized as JSON with `Content-Type: application/json` unless the
    /// caller set a content type.
    Json(Value),
    /// Sent as `multipart/form-data` with its own boundary.
    Multipart(MultipartBody),
    Raw { content_type: String, bytes: Bytes },
}

impl RequestBody {
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(RequestBody::Json)
            .map_err(|e| Error::InvalidRequest(format!("body is not JSON-serializable: {e}")))
    }

    /// Materialize into a transport payload and the content type it implies.
    pub(crate) fn into_payload(self) -> Result<(Payload, Option<HeaderValue>)> {
        match self {
            RequestBody::Empty => Ok((Payload::Empty, None)),
            RequestBody::Json(value) => {
                let bytes = serde_json::to_vec(&value)
                    .map_err(|e| Error::InvalidRequest(format!("encoding JSON body: {e}")))?;
                Ok((
                    Payload::Bytes(Bytes::from(bytes)),
                    Some(HeaderValue::from_static("application/json")),
                ))
            }
            RequestBody::Multipart(form) => Ok((Payload::Multipart(form), None)),
            RequestBody::Raw {
                content_type,
                bytes,
            } => {
                let content_type = HeaderValue::from_str(&content_type).map_err(|e| {
                    Error::InvalidRequest(format!("invalid content type {content_type:?}: {e}"))
                })?;
                Ok((Payload::Bytes(bytes), Some(content_type)))
            }
        }
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        RequestBody::Json(value)
    }
}

impl From<MultipartBody> for RequestBody {
    fn from(form: MultipartBody) -> Self {
        RequestBody::Multipart(form)
    }
}

/// Body as handed to a `Transport`. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub enum Payload {
    #[default]
    Empty,
    Bytes(Bytes),
    Multipart(MultipartBody),
}

/// Replayable `multipart/form-data` description.
#[derive(Debug, Clone, Default)]
pub struct MultipartBody {
    pub(crate) fields: Vec<MultipartField>,
}

#[derive(Debug, Clone)]
pub(crate) struct MultipartField {
    pub(crate) name: String,
    pub(crate) value: FieldValue,
}

#[derive(Debug, Clone)]
pub(crate) enum FieldValue {
    Text(String),
    File {
        bytes: Bytes,
        file_name: String,
        content_type: String,
    },
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(MultipartField {
            name: name.into(),
            value: FieldValue::Text(value.into()),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        bytes: impl Into<Bytes>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        self.fields.push(MultipartField {
            name: name.into(),
            value: FieldValue::File {
                bytes: bytes.into(),
                file_name: file_name.into(),
                content_type: content_type.into(),
            },
        });
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
