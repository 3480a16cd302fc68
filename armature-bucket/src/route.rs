//! Route handle binding a configuration to a store.

use http::{Method, StatusCode, header};
use std::sync::Arc;
use tracing::info;

use crate::pipeline;
use crate::{ObjectStore, RouteConfig, RouteRequest, RouteResponse};

/// A bucket-backed route.
///
/// Cheap to clone; the configuration and store are shared.
///
/// ```
/// use armature_bucket::{BucketRoute, MemoryStore, RouteConfig, RouteRequest};
/// use http::{Method, StatusCode};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let config = RouteConfig::builder("media").key("files").build().unwrap();
/// let route = BucketRoute::new(config, Arc::new(MemoryStore::new()));
///
/// let request = RouteRequest::new(Method::GET, "/files/a.pdf").with_param("key", "a.pdf");
/// let response = route.handle(request).await;
/// assert_eq!(response.status, StatusCode::NOT_FOUND);
/// # });
/// ```
#[derive(Clone)]
pub struct BucketRoute {
    config: Arc<RouteConfig>,
    store: Arc<dyn ObjectStore>,
}

impl BucketRoute {
    /// Bind a configuration to a store.
    pub fn new(config: RouteConfig, store: Arc<dyn ObjectStore>) -> Self {
        info!(bucket = ?config.bucket(), "Bucket route registered");
        Self {
            config: Arc::new(config),
            store,
        }
    }

    /// Route configuration.
    pub fn config(&self) -> &RouteConfig {
        &self.config
    }

    /// Dispatch on the request method.
    ///
    /// Methods other than GET, POST and DELETE get 405 with an `Allow` header.
    pub async fn handle(&self, request: RouteRequest) -> RouteResponse {
        match *request.method() {
            Method::GET => self.get(request).await,
            Method::POST => self.post(request).await,
            Method::DELETE => self.delete(request).await,
            _ => RouteResponse::new(StatusCode::METHOD_NOT_ALLOWED)
                .with_header(header::ALLOW, "GET, POST, DELETE"),
        }
    }

    /// Serve a download.
    pub async fn get(&self, request: RouteRequest) -> RouteResponse {
        pipeline::retrieve(&self.config, self.store.as_ref(), request).await
    }

    /// Serve an upload.
    pub async fn post(&self, request: RouteRequest) -> RouteResponse {
        pipeline::upload(&self.config, self.store.as_ref(), request).await
    }

    /// Serve a deletion.
    pub async fn delete(&self, request: RouteRequest) -> RouteResponse {
        pipeline::delete(&self.config, self.store.as_ref(), request).await
    }
}

impl std::fmt::Debug for BucketRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketRoute")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[tokio::test]
    async fn test_unsupported_method_is_405() {
        let config = RouteConfig::builder("media").build().unwrap();
        let route = BucketRoute::new(config, Arc::new(MemoryStore::new()));

        let response = route.handle(RouteRequest::new(Method::PUT, "/files/a")).await;
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.header(header::ALLOW), Some("GET, POST, DELETE"));
    }

    #[tokio::test]
    async fn test_route_is_send() {
        fn assert_send<T: Send>(_: T) {}

        let config = RouteConfig::builder("media").build().unwrap();
        let route = BucketRoute::new(config, Arc::new(MemoryStore::new()));
        assert_send(route.handle(RouteRequest::new(Method::GET, "/")));
    }
}
