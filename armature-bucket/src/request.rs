//! Request and response types exchanged with the host framework.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{ByteStream, RouteError};

/// Request line, headers and path parameters.
///
/// Shared with resolvers and delegates behind an `Arc`, so it never carries
/// the body.
#[derive(Debug, Clone)]
pub struct RequestHead {
    /// HTTP method.
    pub method: Method,
    /// Request path.
    pub path: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Path parameters captured by the router.
    pub path_params: HashMap<String, String>,
}

impl RequestHead {
    /// Create a head with no headers or parameters.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            path_params: HashMap::new(),
        }
    }

    /// Get a path parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// Get a header as a string.
    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Inbound request handed to a bucket route.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    /// Shared request head.
    pub head: Arc<RequestHead>,
    /// Raw request body.
    pub body: Bytes,
}

impl RouteRequest {
    /// Create a request with an empty body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            head: Arc::new(RequestHead::new(method, path)),
            body: Bytes::new(),
        }
    }

    /// Build from an `http::Request` and the router's path parameters.
    pub fn from_http(request: http::Request<Bytes>, path_params: HashMap<String, String>) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            head: Arc::new(RequestHead {
                method: parts.method,
                path: parts.uri.path().to_string(),
                headers: parts.headers,
                path_params,
            }),
            body,
        }
    }

    /// Add a path parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.head)
            .path_params
            .insert(name.into(), value.into());
        self
    }

    /// Add a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            Arc::make_mut(&mut self.head).headers.insert(name, value);
        }
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.head.method
    }
}

/// Response body.
pub enum ResponseBody {
    /// No body.
    Empty,
    /// Buffered body.
    Full(Bytes),
    /// Streamed object body.
    Stream(ByteStream),
}

impl ResponseBody {
    /// Drain into a single buffer.
    pub async fn collect(self) -> std::io::Result<Bytes> {
        use futures::TryStreamExt;

        match self {
            Self::Empty => Ok(Bytes::new()),
            Self::Full(bytes) => Ok(bytes),
            Self::Stream(stream) => {
                let chunks: Vec<Bytes> = stream.try_collect().await?;
                Ok(Bytes::from(chunks.concat()))
            }
        }
    }

    /// Whether the body is known to be empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Full(bytes) => bytes.is_empty(),
            Self::Stream(_) => false,
        }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// Response produced by a bucket route.
#[derive(Debug)]
pub struct RouteResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: ResponseBody,
}

impl RouteResponse {
    /// Create an empty response with a status.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: ResponseBody::Empty,
        }
    }

    /// JSON response.
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::new(status)
                .with_header(header::CONTENT_TYPE, "application/json; charset=utf-8")
                .with_body(ResponseBody::Full(Bytes::from(body))),
            Err(e) => Self::error(&RouteError::configuration(format!(
                "failed to serialize response: {}",
                e
            ))),
        }
    }

    /// Structured error response.
    pub fn error(err: &RouteError) -> Self {
        let body = err.to_body();
        let bytes = serde_json::to_vec(&body).unwrap_or_default();
        Self::new(err.status_code())
            .with_header(header::CONTENT_TYPE, "application/json; charset=utf-8")
            .with_body(ResponseBody::Full(Bytes::from(bytes)))
    }

    /// Set a header. Values that are not valid header text are dropped.
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: ResponseBody) -> Self {
        self.body = body;
        self
    }

    /// Get a header as a string.
    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Convert into an `http::Response` with a buffered body.
    pub async fn into_http(self) -> std::io::Result<http::Response<Bytes>> {
        let body = self.body.collect().await?;
        let mut response = http::Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        Ok(response)
    }
}
