//! Stateless HTTP request builder and response parser for the school API.
//!
//! # Design
//! `SchoolClient` holds only a `base_url` and carries no mutable state between
//! calls. Requests are produced by `build*` methods and responses consumed by
//! `parse*` methods; executing the round-trip is the caller's job (see
//! `Transport` and `Api`). Per-call `RequestOptions` override the token and
//! headers for one request without touching the client.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::form_urlencoded;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

const JSON_CONTENT_TYPE: &str = "application/json";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Fallback message when an error payload has neither `detail` nor `message`.
const GENERIC_FAILURE: &str = "Request failed";

/// Per-call overrides for a single request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Use this token instead of whatever the session storage holds.
    pub token: Option<String>,
    /// Extra headers merged over the defaults. Same-named defaults are replaced.
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Body returned by `POST /auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Synchronous, stateless client for the school API.
#[derive(Debug, Clone)]
pub struct SchoolClient {
    base_url: String,
}

impl SchoolClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a JSON request for `path` (relative to the base URL).
    ///
    /// `stored_token` is the token read from session storage; an explicit
    /// `options.token` takes precedence over it.
    pub fn build<B: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
        stored_token: Option<&str>,
        options: &RequestOptions,
    ) -> Result<HttpRequest, ApiError> {
        let body = body
            .map(|b| serde_json::to_string(b).map_err(|e| ApiError::Serialization(e.to_string())))
            .transpose()?;

        let mut headers = vec![("content-type".to_string(), JSON_CONTENT_TYPE.to_string())];
        push_bearer(&mut headers, options.token.as_deref(), stored_token);
        merge_headers(&mut headers, &options.headers);

        Ok(HttpRequest {
            method,
            path: format!("{}{path}", self.base_url),
            headers,
            body,
        })
    }

    /// Build the credential exchange request.
    ///
    /// Credentials go out form-encoded as `username`/`password` with no
    /// authorization header.
    pub fn build_login(&self, username: &str, password: &str) -> HttpRequest {
        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("username", username)
            .append_pair("password", password)
            .finish();
        HttpRequest {
            method: HttpMethod::Post,
            path: format!("{}/auth/login", self.base_url),
            headers: vec![("content-type".to_string(), FORM_CONTENT_TYPE.to_string())],
            body: Some(body),
        }
    }

    /// Build `GET /auth/me`. `token` wins over `stored_token`.
    pub fn build_current_user(&self, token: Option<&str>, stored_token: Option<&str>) -> HttpRequest {
        let mut headers = vec![("content-type".to_string(), JSON_CONTENT_TYPE.to_string())];
        push_bearer(&mut headers, token, stored_token);
        HttpRequest {
            method: HttpMethod::Get,
            path: format!("{}/auth/me", self.base_url),
            headers,
            body: None,
        }
    }

    /// Parse a response into `T`, or fail with the server's error payload.
    pub fn parse<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<T, ApiError> {
        check_status(&response)?;
        let body = if response.body.trim().is_empty() {
            "null"
        } else {
            response.body.as_str()
        };
        serde_json::from_str(body).map_err(|e| ApiError::Deserialization(e.to_string()))
    }

    /// Parse a response body as untyped JSON, returned as-is.
    pub fn parse_value(&self, response: HttpResponse) -> Result<Value, ApiError> {
        self.parse(response)
    }
}

/// Add `authorization` from the first non-blank token, if any.
fn push_bearer(headers: &mut Vec<(String, String)>, token: Option<&str>, stored_token: Option<&str>) {
    let token = non_blank(token).or(non_blank(stored_token));
    if let Some(token) = token {
        headers.push(("authorization".to_string(), format!("Bearer {token}")));
    }
}

/// An empty token counts as no token.
pub(crate) fn non_blank(token: Option<&str>) -> Option<&str> {
    token.filter(|t| !t.is_empty())
}

/// Replace or append each override, matching names case-insensitively.
fn merge_headers(headers: &mut Vec<(String, String)>, overrides: &[(String, String)]) {
    for (name, value) in overrides {
        let name = name.to_ascii_lowercase();
        match headers.iter_mut().find(|(k, _)| *k == name) {
            Some(existing) => existing.1 = value.clone(),
            None => headers.push((name, value.clone())),
        }
    }
}

/// Map a non-2xx response to `ApiError::Http`.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    let body: Value = serde_json::from_str(&response.body)
        .unwrap_or_else(|_| json!({ "detail": format!("HTTP error! status: {}", response.status) }));
    let message = error_message(&body);
    Err(ApiError::Http {
        status: response.status,
        message,
        body,
    })
}

fn error_message(body: &Value) -> String {
    ["detail", "message"]
        .iter()
        .filter_map(|key| body.get(*key))
        .find_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        })
        .unwrap_or_else(|| GENERIC_FAILURE.to_string())
}
