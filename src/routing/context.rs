use std::collections::HashMap;

use axum::{
    body::Body,
    extract::Request,
    http::{Extensions, HeaderMap, Method, Uri},
};
use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::{
    auth::claims::Identity,
    error::{AppError, AppResult},
};

/// JSON bodies are small; uploads go through multipart instead.
const JSON_BODY_LIMIT: usize = 1024 * 1024;

/// A file parsed from a multipart field.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Per-request state threaded through guards to the handler.
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub params: HashMap<String, String>,
    extensions: Extensions,
    body: Option<Body>,
    /// Set by the authentication guard.
    pub identity: Option<Identity>,
    /// Text fields of a parsed multipart body.
    pub form: Option<HashMap<String, String>>,
    /// Set by the upload guard when the named field carried a file.
    pub upload: Option<UploadedFile>,
}

impl RequestContext {
    pub fn new(req: Request, params: HashMap<String, String>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            params,
            extensions: parts.extensions,
            body: Some(body),
            identity: None,
            form: None,
            upload: None,
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Identity attached by the authentication guard.
    pub fn identity(&self) -> AppResult<&Identity> {
        self.identity
            .as_ref()
            .ok_or_else(|| AppError::unauthorized("not logged in"))
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Hands the raw body to whoever consumes it first.
    pub fn take_body(&mut self) -> Option<Body> {
        self.body.take()
    }

    /// Rebuilds the original request around the remaining body, so axum
    /// extractors (and the body limit carried in its extensions) still apply.
    pub(crate) fn take_request(&mut self) -> Option<Request> {
        let body = self.body.take()?;
        let mut req = Request::new(body);
        *req.method_mut() = self.method.clone();
        *req.uri_mut() = self.uri.clone();
        *req.headers_mut() = self.headers.clone();
        *req.extensions_mut() = std::mem::take(&mut self.extensions);
        Some(req)
    }

    /// Request payload: the multipart text fields when the upload guard parsed
    /// them, otherwise the JSON body. An empty body reads as `{}`.
    pub async fn payload<T: DeserializeOwned>(&mut self) -> AppResult<T> {
        if let Some(form) = &self.form {
            let obj: serde_json::Map<String, serde_json::Value> = form
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            return serde_json::from_value(serde_json::Value::Object(obj))
                .map_err(|e| AppError::bad_request(format!("invalid form fields: {}", e)));
        }

        let bytes = match self.take_body() {
            Some(body) => axum::body::to_bytes(body, JSON_BODY_LIMIT)
                .await
                .map_err(|e| AppError::bad_request(format!("unreadable body: {}", e)))?,
            None => Bytes::new(),
        };
        let raw: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            &bytes
        };
        serde_json::from_slice(raw).map_err(|e| AppError::bad_request(format!("invalid JSON body: {}", e)))
    }
}
