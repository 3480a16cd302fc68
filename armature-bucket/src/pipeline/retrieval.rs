//! GET: stream an object back to the client.

use http::StatusCode;
use std::sync::Arc;
use tracing::{Span, debug, instrument};

use super::{resolve_bucket, resolve_content_type, resolve_disposition, resolve_key};
use crate::{
    ObjectStore, Outcome, RequestHead, ResolveContext, RetrievalOptions, RouteConfig, RouteError,
    RouteRequest, RouteResponse, RouteResult,
};

/// Serve a GET request.
#[instrument(skip_all, fields(path = %request.head.path, bucket, key))]
pub async fn retrieve(
    config: &RouteConfig,
    store: &dyn ObjectStore,
    request: RouteRequest,
) -> RouteResponse {
    let head = request.head;
    let result = run(config, store, &head).await;
    config.delegate().respond(result, head).await
}

async fn run(
    config: &RouteConfig,
    store: &dyn ObjectStore,
    head: &Arc<RequestHead>,
) -> RouteResult<Outcome> {
    let ctx = ResolveContext::new(Arc::clone(head));
    let bucket = resolve_bucket(config, ctx.clone()).await?;

    let ctx = ctx.with_bucket(&bucket);
    let key = resolve_key(config, ctx.clone(), head.param(config.path_param()), None, false).await?;

    let span = Span::current();
    span.record("bucket", bucket.as_str());
    span.record("key", key.as_str());

    // A missing object is a real failure here.
    let metadata = store.head_object(&bucket, &key).await?;

    let ctx = ctx.with_key(&key);
    let content_type =
        resolve_content_type(config, metadata.content_type.clone(), ctx.clone()).await?;
    let content_disposition = resolve_disposition(
        config,
        config.mode().get(),
        metadata.content_disposition.as_deref(),
        ctx.with_content_type(content_type.clone()),
    )
    .await?;

    let object = store.get_object(&bucket, &key).await?;
    if object.status >= 400 {
        return Err(RouteError::Storage {
            status: object.status,
            message: format!("failed to read {}/{}", bucket, key),
        });
    }

    debug!(content_type = ?content_type, content_disposition = ?content_disposition, "Streaming object");

    Ok(Outcome::Retrieved {
        body: object.stream,
        options: RetrievalOptions {
            bucket,
            key,
            content_type,
            content_disposition,
            head: object.head,
            default_status_code: StatusCode::OK,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::FailingStore;
    use crate::{ConfigValue, DispositionMode, MemoryStore, PutOptions};
    use bytes::Bytes;
    use http::{Method, header};

    async fn store_with(key: &str, options: PutOptions) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .put_object("media", key, Bytes::from_static(b"%PDF"), options)
            .await
            .unwrap();
        store
    }

    fn get(key: &str) -> RouteRequest {
        RouteRequest::new(Method::GET, format!("/files/{}", key)).with_param("key", key)
    }

    #[tokio::test]
    async fn test_get_streams_body_with_headers() {
        let store = store_with(
            "files/1.pdf",
            PutOptions {
                content_type: Some("application/pdf".into()),
                content_disposition: None,
            },
        )
        .await;
        let config = RouteConfig::builder("media").key("files").build().unwrap();

        let response = retrieve(&config, &store, get("1.pdf")).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.header(header::CONTENT_TYPE), Some("application/pdf"));
        assert_eq!(
            response.header(header::CONTENT_DISPOSITION),
            Some(r#"attachment; filename="1.pdf""#)
        );
        assert_eq!(response.header(header::CONTENT_LENGTH), Some("4"));
        assert!(response.header(header::ETAG).is_some());
        assert_eq!(response.body.collect().await.unwrap(), Bytes::from_static(b"%PDF"));
    }

    #[tokio::test]
    async fn test_get_missing_object_is_404() {
        let store = MemoryStore::new();
        let config = RouteConfig::builder("media").build().unwrap();

        let response = retrieve(&config, &store, get("nope.pdf")).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_inline_overrides_stored_attachment() {
        let store = store_with(
            "1.pdf",
            PutOptions {
                content_type: None,
                content_disposition: Some(r#"attachment; filename="orig.pdf""#.into()),
            },
        )
        .await;
        let config = RouteConfig::builder("media")
            .mode(DispositionMode::Inline)
            .build()
            .unwrap();

        let response = retrieve(&config, &store, get("1.pdf")).await;
        assert_eq!(
            response.header(header::CONTENT_DISPOSITION),
            Some(r#"inline; filename="1.pdf""#)
        );
    }

    #[tokio::test]
    async fn test_get_auto_follows_stored_header() {
        let store = store_with(
            "1.pdf",
            PutOptions {
                content_type: None,
                content_disposition: Some(r#"inline; filename="orig.pdf""#.into()),
            },
        )
        .await;
        let config = RouteConfig::builder("media").build().unwrap();

        let response = retrieve(&config, &store, get("1.pdf")).await;
        assert_eq!(
            response.header(header::CONTENT_DISPOSITION),
            Some(r#"inline; filename="orig.pdf""#)
        );
    }

    #[tokio::test]
    async fn test_get_mode_off_sets_no_disposition() {
        let store = store_with("1.pdf", PutOptions::default()).await;
        let config = RouteConfig::builder("media")
            .mode(DispositionMode::Off)
            .build()
            .unwrap();

        let response = retrieve(&config, &store, get("1.pdf")).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.header(header::CONTENT_DISPOSITION), None);
        assert_eq!(response.header(header::CONTENT_TYPE), None);
    }

    #[tokio::test]
    async fn test_get_unresolvable_bucket_is_500() {
        let store = MemoryStore::new();
        let config = RouteConfig::builder(ConfigValue::<String>::resolver_sync(|_| None))
            .build()
            .unwrap();

        let response = retrieve(&config, &store, get("1.pdf")).await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_failing_read_status_is_passed_through() {
        let store = FailingStore {
            get: Some(503),
            ..Default::default()
        };
        store
            .inner
            .put_object("media", "1.pdf", Bytes::from_static(b"%PDF"), PutOptions::default())
            .await
            .unwrap();
        let config = RouteConfig::builder("media").build().unwrap();

        let response = retrieve(&config, &store, get("1.pdf")).await;
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.header(header::CONTENT_DISPOSITION), None);
    }
}
