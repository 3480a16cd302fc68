//! POST: store every part of a multipart upload.
//!
//! Runs in two phases. Every part is resolved and validated concurrently;
//! only when all of them pass are the puts issued, again concurrently.
//! A failing put does not roll back parts that were already stored.

use bytes::Bytes;
use futures::future::join_all;
use http::{StatusCode, header};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{Span, debug, instrument, warn};

use super::{resolve_bucket, resolve_content_type, resolve_disposition, resolve_key};
use crate::multipart::{is_multipart, read_parts};
use crate::{
    FormPart, ObjectStore, Outcome, PutOptions, RequestHead, ResolveContext, RouteConfig,
    RouteError, RouteRequest, RouteResponse, RouteResult, UploadOptions, UploadedObject,
};

/// A validated part waiting to be stored.
#[derive(Debug)]
struct PlannedUpload {
    field_name: String,
    bucket: String,
    key: String,
    data: Bytes,
    options: PutOptions,
}

/// Serve a POST request.
#[instrument(skip_all, fields(path = %request.head.path, parts))]
pub async fn upload(
    config: &RouteConfig,
    store: &dyn ObjectStore,
    request: RouteRequest,
) -> RouteResponse {
    let RouteRequest { head, body } = request;
    let result = run(config, store, &head, body).await;
    config.delegate().respond(result, head).await
}

async fn run(
    config: &RouteConfig,
    store: &dyn ObjectStore,
    head: &Arc<RequestHead>,
    body: Bytes,
) -> RouteResult<Outcome> {
    let content_type = head.header(header::CONTENT_TYPE).ok_or_else(|| {
        RouteError::UnprocessableEntity("missing Content-Type header".to_string())
    })?;
    if !is_multipart(content_type) {
        return Err(RouteError::UnsupportedMediaType(format!(
            "expected multipart/form-data, got {}",
            content_type
        )));
    }

    let parts = read_parts(content_type, body, config.upload_limits()).await?;
    Span::current().record("parts", parts.len());

    let prepared = join_all(parts.into_iter().map(|part| prepare(config, store, head, part))).await;
    let mut planned = Vec::with_capacity(prepared.len());
    for result in prepared {
        if let Some(plan) = result? {
            planned.push(plan);
        }
    }

    let stored = join_all(planned.into_iter().map(|plan| store_part(store, plan))).await;
    let mut files = BTreeMap::new();
    for result in stored {
        let (field_name, object) = result?;
        files.insert(field_name, object);
    }

    Ok(Outcome::Uploaded(UploadOptions {
        files,
        default_status_code: StatusCode::CREATED,
    }))
}

/// Resolve and validate one part. `None` means the part is ignored.
async fn prepare(
    config: &RouteConfig,
    store: &dyn ObjectStore,
    head: &Arc<RequestHead>,
    part: FormPart,
) -> RouteResult<Option<PlannedUpload>> {
    let form_key = part.form_key();
    if config.is_ignored(&part.field_name, form_key.as_deref()) {
        debug!(field = %part.field_name, "Ignoring form part");
        return Ok(None);
    }

    let mut ctx = ResolveContext::new(Arc::clone(head));
    ctx.form_key = form_key.clone();
    ctx.field_name = Some(part.field_name.clone());
    ctx.file_name = part.file_name.clone();

    let bucket = resolve_bucket(config, ctx.clone()).await?;
    let ctx = ctx.with_bucket(&bucket);
    let key = resolve_key(
        config,
        ctx.clone(),
        head.param(config.path_param()),
        form_key.as_deref(),
        config.random_post_keys(),
    )
    .await?;

    if store.exists(&bucket, &key).await? {
        warn!(bucket = %bucket, key = %key, field = %part.field_name, "Upload target already exists");
        return Err(RouteError::Conflict(format!("{}/{} already exists", bucket, key)));
    }

    let ctx = ctx.with_key(&key);
    let content_type = resolve_content_type(config, part.content_type.clone(), ctx.clone()).await?;
    if !config.is_content_type_allowed(content_type.as_deref()) {
        warn!(field = %part.field_name, content_type = ?content_type, "Content type not allowed");
        return Err(RouteError::UnsupportedMediaType(format!(
            "content type {} is not allowed",
            content_type.as_deref().unwrap_or("(none)")
        )));
    }

    let content_disposition = resolve_disposition(
        config,
        config.mode().post(),
        part.content_disposition.as_deref(),
        ctx.with_content_type(content_type.clone()),
    )
    .await?;

    debug!(
        field = %part.field_name,
        index = part.index,
        size = part.size(),
        key = %key,
        "Validated upload part"
    );

    Ok(Some(PlannedUpload {
        field_name: part.field_name,
        bucket,
        key,
        data: part.data,
        options: PutOptions {
            content_type,
            content_disposition,
        },
    }))
}

async fn store_part(
    store: &dyn ObjectStore,
    plan: PlannedUpload,
) -> RouteResult<(String, UploadedObject)> {
    let storage_response = store
        .put_object(&plan.bucket, &plan.key, plan.data, plan.options.clone())
        .await?;
    debug!(bucket = %plan.bucket, key = %plan.key, "Stored upload part");

    Ok((
        plan.field_name,
        UploadedObject {
            bucket: plan.bucket,
            key: plan.key,
            storage_response,
            content_type: plan.options.content_type,
            content_disposition: plan.options.content_disposition,
        },
    ))
}
