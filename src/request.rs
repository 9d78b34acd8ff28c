//! Outbound request construction.

use serde::{Deserialize, Serialize};

/// Header name/value pairs attached to a request.
pub type Headers = std::collections::HashSet<(String, String)>;

/// HTTP methods used against the processor API.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

/// Body of an outbound request. Every body on this API is JSON.
#[derive(Clone)]
pub enum RequestContent {
    /// JSON-encoded body.
    Json(serde_json::Value),
}

impl std::fmt::Debug for RequestContent {
    /// Formats the request body type without exposing its contents.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Json(_) => "JsonRequestBody",
        })
    }
}

/// A fully built outbound request.
#[derive(Debug)]
pub struct Request {
    /// Absolute URL.
    pub url: String,
    /// Headers to attach.
    pub headers: Headers,
    /// HTTP method.
    pub method: Method,
    /// Optional body.
    pub body: Option<RequestContent>,
}

impl Request {
    /// Creates a new request with the given method and URL.
    pub fn new(method: Method, url: &str) -> Self {
        Self {
            method,
            url: String::from(url),
            headers: std::collections::HashSet::new(),
            body: None,
        }
    }

    /// Sets the body of the request.
    pub fn set_body<T: Into<RequestContent>>(&mut self, body: T) {
        self.body.replace(body.into());
    }

    /// Adds a header, replacing nothing; duplicate names are kept as given.
    pub fn add_header(&mut self, header: &str, value: &str) {
        self.headers.insert((String::from(header), String::from(value)));
    }
}

impl From<serde_json::Value> for RequestContent {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// Builder for [`Request`].
#[derive(Debug)]
pub struct RequestBuilder {
    url: String,
    headers: Headers,
    method: Method,
    body: Option<RequestContent>,
}

impl RequestBuilder {
    /// Creates a builder with method GET and no URL.
    pub fn new() -> Self {
        Self {
            method: Method::Get,
            url: String::with_capacity(1024),
            headers: std::collections::HashSet::new(),
            body: None,
        }
    }

    /// Sets the URL.
    pub fn url(mut self, url: &str) -> Self {
        self.url = url.into();
        self
    }

    /// Sets the method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Adds a single header.
    pub fn header(mut self, header: &str, value: &str) -> Self {
        self.headers.insert((header.into(), value.into()));
        self
    }

    /// Adds all given headers.
    pub fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Sets the body.
    pub fn set_body<T: Into<RequestContent>>(mut self, body: T) -> Self {
        self.body.replace(body.into());
        self
    }

    /// Builds the request.
    pub fn build(self) -> Request {
        Request {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: self.body,
        }
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}
