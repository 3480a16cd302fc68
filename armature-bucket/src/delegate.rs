//! Response delegation.
//!
//! Every terminal outcome of a pipeline, success or failure, goes through a
//! [`ResponseDelegate`]. Routes without `on_response` use [`DefaultResponder`].

use async_trait::async_trait;
use http::{StatusCode, header};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, warn};

use crate::{
    ByteStream, DeleteResponse, ObjectHead, PutResponse, RequestHead, ResponseBody, RouteResponse,
    RouteResult,
};

/// Successful GET details.
#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    /// Resolved bucket.
    pub bucket: String,
    /// Resolved key.
    pub key: String,
    /// Resolved content type.
    pub content_type: Option<String>,
    /// Resolved content disposition.
    pub content_disposition: Option<String>,
    /// Object facts from the read.
    pub head: ObjectHead,
    /// Status the default strategy would use.
    pub default_status_code: StatusCode,
}

/// One stored upload part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedObject {
    /// Bucket written to.
    pub bucket: String,
    /// Key written to.
    pub key: String,
    /// Backend response.
    #[serde(flatten)]
    pub storage_response: PutResponse,
    /// Content type stored with the object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Content disposition stored with the object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<String>,
}

/// Successful POST details.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Stored parts keyed by form field name.
    pub files: BTreeMap<String, UploadedObject>,
    /// Status the default strategy would use.
    pub default_status_code: StatusCode,
}

/// Successful DELETE details.
#[derive(Debug, Clone)]
pub struct DeletionOptions {
    /// Resolved bucket.
    pub bucket: String,
    /// Resolved key.
    pub key: String,
    /// Backend response.
    pub storage_response: DeleteResponse,
    /// Status the default strategy would use.
    pub default_status_code: StatusCode,
}

/// Successful pipeline result.
pub enum Outcome {
    /// GET: object body and resolved headers.
    Retrieved {
        /// Object body.
        body: ByteStream,
        /// Resolved details.
        options: RetrievalOptions,
    },
    /// POST: stored parts.
    Uploaded(UploadOptions),
    /// DELETE: removed object.
    Deleted(DeletionOptions),
}

impl Outcome {
    /// Status the default strategy would use.
    pub fn default_status_code(&self) -> StatusCode {
        match self {
            Self::Retrieved { options, .. } => options.default_status_code,
            Self::Uploaded(options) => options.default_status_code,
            Self::Deleted(options) => options.default_status_code,
        }
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retrieved { options, .. } => f
                .debug_struct("Retrieved")
                .field("options", options)
                .finish_non_exhaustive(),
            Self::Uploaded(options) => f.debug_tuple("Uploaded").field(options).finish(),
            Self::Deleted(options) => f.debug_tuple("Deleted").field(options).finish(),
        }
    }
}

/// Produces the final response for a pipeline outcome.
///
/// The delegate owns the reply entirely: it may map an error to a success
/// or drop the body.
#[async_trait]
pub trait ResponseDelegate: Send + Sync {
    /// Build the response.
    async fn respond(&self, result: RouteResult<Outcome>, request: Arc<RequestHead>)
    -> RouteResponse;
}

/// Default reply strategy.
///
/// GET streams the body with resolved headers, POST answers 201 with a JSON
/// map of stored parts, DELETE answers 204. Errors become their status with
/// a JSON error body.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResponder;

impl DefaultResponder {
    /// Build the default response without going through the trait.
    pub fn reply(result: RouteResult<Outcome>, request: &RequestHead) -> RouteResponse {
        match result {
            Ok(Outcome::Retrieved { body, options }) => {
                let mut response = RouteResponse::new(options.default_status_code)
                    .with_body(ResponseBody::Stream(body));
                if let Some(ct) = &options.content_type {
                    response = response.with_header(header::CONTENT_TYPE, ct);
                }
                if let Some(cd) = &options.content_disposition {
                    response = response.with_header(header::CONTENT_DISPOSITION, cd);
                }
                if let Some(len) = options.head.content_length {
                    response = response.with_header(header::CONTENT_LENGTH, &len.to_string());
                }
                if let Some(e_tag) = &options.head.e_tag {
                    response = response.with_header(header::ETAG, e_tag);
                }
                if let Some(modified) = &options.head.last_modified {
                    response = response.with_header(header::LAST_MODIFIED, modified);
                }
                response
            }
            Ok(Outcome::Uploaded(options)) => {
                RouteResponse::json(options.default_status_code, &options.files)
            }
            Ok(Outcome::Deleted(options)) => RouteResponse::new(options.default_status_code),
            Err(err) => {
                if err.status_code().is_server_error() {
                    error!(method = %request.method, path = %request.path, error = %err, "Bucket route failed");
                } else {
                    warn!(method = %request.method, path = %request.path, error = %err, "Bucket route rejected request");
                }
                RouteResponse::error(&err)
            }
        }
    }
}

#[async_trait]
impl ResponseDelegate for DefaultResponder {
    async fn respond(
        &self,
        result: RouteResult<Outcome>,
        request: Arc<RequestHead>,
    ) -> RouteResponse {
        Self::reply(result, &request)
    }
}

/// Delegate backed by an async closure.
#[derive(Clone)]
pub struct FnDelegate<F> {
    f: F,
}

impl<F> FnDelegate<F> {
    /// Wrap a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> fmt::Debug for FnDelegate<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnDelegate(..)")
    }
}

#[async_trait]
impl<F, Fut> ResponseDelegate for FnDelegate<F>
where
    F: Fn(RouteResult<Outcome>, Arc<RequestHead>) -> Fut + Send + Sync,
    Fut: Future<Output = RouteResponse> + Send,
{
    async fn respond(
        &self,
        result: RouteResult<Outcome>,
        request: Arc<RequestHead>,
    ) -> RouteResponse {
        (self.f)(result, request).await
    }
}

/// Wrap an async closure as a shareable delegate.
///
/// ```
/// use armature_bucket::{RouteResponse, delegate_fn};
/// use http::StatusCode;
///
/// // Swallow every error and answer 200.
/// let delegate = delegate_fn(|result, _request| async move {
///     match result {
///         Ok(outcome) => RouteResponse::new(outcome.default_status_code()),
///         Err(_) => RouteResponse::new(StatusCode::OK),
///     }
/// });
/// # let _ = delegate;
/// ```
pub fn delegate_fn<F, Fut>(f: F) -> Arc<dyn ResponseDelegate>
where
    F: Fn(RouteResult<Outcome>, Arc<RequestHead>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RouteResponse> + Send + 'static,
{
    Arc::new(FnDelegate::new(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RouteError;
    use bytes::Bytes;
    use http::Method;

    fn head() -> RequestHead {
        RequestHead::new(Method::GET, "/files/a.pdf")
    }

    #[tokio::test]
    async fn test_default_retrieval_headers() {
        let options = RetrievalOptions {
            bucket: "media".into(),
            key: "a.pdf".into(),
            content_type: Some("application/pdf".into()),
            content_disposition: Some(r#"attachment; filename="a.pdf""#.into()),
            head: ObjectHead {
                content_length: Some(4),
                e_tag: Some("\"abc\"".into()),
                ..Default::default()
            },
            default_status_code: StatusCode::OK,
        };
        let body: ByteStream =
            Box::pin(futures::stream::once(async { Ok(Bytes::from_static(b"%PDF")) }));

        let response = DefaultResponder::reply(Ok(Outcome::Retrieved { body, options }), &head());
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.header(header::CONTENT_TYPE), Some("application/pdf"));
        assert_eq!(
            response.header(header::CONTENT_DISPOSITION),
            Some(r#"attachment; filename="a.pdf""#)
        );
        assert_eq!(response.header(header::CONTENT_LENGTH), Some("4"));
        assert_eq!(response.header(header::ETAG), Some("\"abc\""));
        assert_eq!(response.body.collect().await.unwrap(), Bytes::from_static(b"%PDF"));
    }

    #[tokio::test]
    async fn test_default_upload_json() {
        let mut files = BTreeMap::new();
        files.insert(
            "file".to_string(),
            UploadedObject {
                bucket: "media".into(),
                key: "a.pdf".into(),
                storage_response: PutResponse {
                    e_tag: Some("\"e\"".into()),
                    version_id: None,
                },
                content_type: Some("application/pdf".into()),
                content_disposition: None,
            },
        );
        let response = DefaultResponder::reply(
            Ok(Outcome::Uploaded(UploadOptions {
                files,
                default_status_code: StatusCode::CREATED,
            })),
            &head(),
        );
        assert_eq!(response.status, StatusCode::CREATED);

        let json: serde_json::Value =
            serde_json::from_slice(&response.body.collect().await.unwrap()).unwrap();
        assert_eq!(json["file"]["key"], "a.pdf");
        assert_eq!(json["file"]["eTag"], "\"e\"");
        assert_eq!(json["file"]["contentType"], "application/pdf");
        assert!(json["file"].get("contentDisposition").is_none());
    }

    #[tokio::test]
    async fn test_default_error() {
        let response = DefaultResponder
            .respond(
                Err(RouteError::Conflict("exists".into())),
                Arc::new(head()),
            )
            .await;
        assert_eq!(response.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_fn_delegate_can_swallow_errors() {
        let delegate = delegate_fn(|result, request| async move {
            assert_eq!(request.path, "/files/a.pdf");
            match result {
                Ok(_) => RouteResponse::new(StatusCode::ACCEPTED),
                Err(_) => RouteResponse::new(StatusCode::OK),
            }
        });
        let response = delegate
            .respond(Err(RouteError::NotFound("a".into())), Arc::new(head()))
            .await;
        assert_eq!(response.status, StatusCode::OK);
    }
}
