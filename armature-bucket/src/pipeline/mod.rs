//! GET, POST and DELETE pipelines.
//!
//! Each pipeline turns a request into a [`RouteResult<Outcome>`](crate::Outcome)
//! and hands it to the route's delegate. The helpers here are the single
//! resolution site for every configurable value.

mod deletion;
mod retrieval;
mod upload;

pub use deletion::delete;
pub use retrieval::retrieve;
pub use upload::upload;

use crate::{
    ConfigValue, DispositionInput, DispositionMode, KeySpec, ResolveContext, RouteConfig,
    RouteResult, compute_key, decide,
};

/// Resolve the bucket. Runs the bucket resolver exactly once.
pub(crate) async fn resolve_bucket(
    config: &RouteConfig,
    ctx: ResolveContext,
) -> RouteResult<String> {
    config.bucket.resolve_required("bucket", ctx).await
}

/// Resolve the object key.
///
/// A key resolver supplies the full key; a literal key is a prefix joined
/// with the path parameter and the form key.
pub(crate) async fn resolve_key(
    config: &RouteConfig,
    ctx: ResolveContext,
    path_param: Option<&str>,
    form_key: Option<&str>,
    randomize: bool,
) -> RouteResult<String> {
    match &config.key {
        Some(value @ ConfigValue::Resolver(_)) => {
            let key = value.resolve_required("key", ctx).await?;
            compute_key(KeySpec::resolved(&key).randomize(randomize))
        }
        Some(ConfigValue::Literal(prefix)) => compute_key(
            KeySpec::prefix(prefix)
                .path_param(path_param)
                .form_filename(form_key)
                .randomize(randomize),
        ),
        None => compute_key(
            KeySpec::prefix("")
                .path_param(path_param)
                .form_filename(form_key)
                .randomize(randomize),
        ),
    }
}

/// Derive the content type.
///
/// Reported type, then the override table, then the configured value,
/// which wins when it yields anything.
pub(crate) async fn resolve_content_type(
    config: &RouteConfig,
    reported: Option<String>,
    ctx: ResolveContext,
) -> RouteResult<Option<String>> {
    let derived = config.override_content_type(reported);
    match &config.content_type {
        Some(value) => {
            let configured = value
                .resolve_non_empty(ctx.with_content_type(derived.clone()))
                .await?;
            Ok(configured.or(derived))
        }
        None => Ok(derived),
    }
}

/// Derive the content disposition. `ctx` must carry the resolved key.
///
/// The filename resolver is not consulted when the mode is off.
pub(crate) async fn resolve_disposition(
    config: &RouteConfig,
    mode: DispositionMode,
    existing_header: Option<&str>,
    ctx: ResolveContext,
) -> RouteResult<Option<String>> {
    if mode == DispositionMode::Off {
        return Ok(None);
    }

    let key = ctx.key.clone().unwrap_or_default();
    let filename = match &config.filename {
        Some(value) => value.resolve_non_empty(ctx).await?,
        None => None,
    };

    Ok(decide(DispositionInput {
        mode,
        existing_header,
        configured_filename: filename.as_deref(),
        key: &key,
    }))
}
