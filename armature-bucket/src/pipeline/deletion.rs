//! DELETE: remove an object.

use http::StatusCode;
use std::sync::Arc;
use tracing::{Span, debug, instrument};

use super::{resolve_bucket, resolve_key};
use crate::{
    DeletionOptions, ObjectStore, Outcome, RequestHead, ResolveContext, RouteConfig, RouteRequest,
    RouteResponse, RouteResult,
};

/// Serve a DELETE request.
///
/// There is no existence pre-check; a missing object surfaces as the
/// backend's not-found error.
#[instrument(skip_all, fields(path = %request.head.path, bucket, key))]
pub async fn delete(
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
    let key = resolve_key(
        config,
        ctx.with_bucket(&bucket),
        head.param(config.path_param()),
        None,
        false,
    )
    .await?;

    let span = Span::current();
    span.record("bucket", bucket.as_str());
    span.record("key", key.as_str());

    let storage_response = store.delete_object(&bucket, &key).await?;
    debug!("Object deleted");

    Ok(Outcome::Deleted(DeletionOptions {
        bucket,
        key,
        storage_response,
        default_status_code: StatusCode::NO_CONTENT,
    }))
}
