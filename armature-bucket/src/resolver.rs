//! Literal-or-resolver configuration values.
//!
//! A route option such as the bucket may be fixed at registration time or
//! computed per request. [`ConfigValue`] models both, and [`ConfigValue::resolve`]
//! is the only place that tells them apart.

use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::{RequestHead, RouteError, RouteResult};

/// Facts handed to a resolver.
///
/// Fields are filled in as a pipeline progresses; a bucket resolver sees no
/// bucket, a filename resolver sees both bucket and key.
#[derive(Debug, Clone)]
pub struct ResolveContext {
    /// The inbound request.
    pub request: Arc<RequestHead>,
    /// Resolved bucket.
    pub bucket: Option<String>,
    /// Resolved object key.
    pub key: Option<String>,
    /// Form key of the part being uploaded.
    pub form_key: Option<String>,
    /// Form field name of the part being uploaded.
    pub field_name: Option<String>,
    /// Filename declared by the part being uploaded.
    pub file_name: Option<String>,
    /// Content type derived so far.
    pub content_type: Option<String>,
}

impl ResolveContext {
    /// Context carrying only the request.
    pub fn new(request: Arc<RequestHead>) -> Self {
        Self {
            request,
            bucket: None,
            key: None,
            form_key: None,
            field_name: None,
            file_name: None,
            content_type: None,
        }
    }

    /// Set the bucket.
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Set the key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }
}

/// Resolver function stored in a [`ConfigValue`].
pub type ResolverFn<T> =
    Arc<dyn Fn(ResolveContext) -> BoxFuture<'static, RouteResult<Option<T>>> + Send + Sync>;

/// A configuration value that is either fixed or computed per request.
pub enum ConfigValue<T> {
    /// Fixed value.
    Literal(T),
    /// Computed from the request and accumulated context.
    Resolver(ResolverFn<T>),
}

impl<T> ConfigValue<T> {
    /// Wrap an async resolver.
    ///
    /// ```
    /// use armature_bucket::ConfigValue;
    ///
    /// let bucket: ConfigValue<String> = ConfigValue::resolver(|ctx| async move {
    ///     Ok(ctx.request.param("tenant").map(|t| format!("tenant-{}", t)))
    /// });
    /// assert!(bucket.is_resolver());
    /// ```
    pub fn resolver<F, Fut>(f: F) -> Self
    where
        F: Fn(ResolveContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RouteResult<Option<T>>> + Send + 'static,
    {
        Self::Resolver(Arc::new(move |ctx| Box::pin(f(ctx))))
    }

    /// Wrap a synchronous resolver.
    pub fn resolver_sync<F>(f: F) -> Self
    where
        F: Fn(&ResolveContext) -> Option<T> + Send + Sync + 'static,
        T: Send + 'static,
    {
        Self::Resolver(Arc::new(move |ctx| {
            let value = f(&ctx);
            Box::pin(async move { Ok(value) })
        }))
    }

    /// Whether this value is computed per request.
    pub fn is_resolver(&self) -> bool {
        matches!(self, Self::Resolver(_))
    }

    /// The literal, if this is one.
    pub fn as_literal(&self) -> Option<&T> {
        match self {
            Self::Literal(value) => Some(value),
            Self::Resolver(_) => None,
        }
    }
}

impl<T: Clone> ConfigValue<T> {
    /// Resolve the value.
    ///
    /// Literals return immediately. Resolvers run once per call; nothing is
    /// cached between calls.
    pub async fn resolve(&self, ctx: ResolveContext) -> RouteResult<Option<T>> {
        match self {
            Self::Literal(value) => Ok(Some(value.clone())),
            Self::Resolver(f) => f(ctx).await,
        }
    }
}

impl ConfigValue<String> {
    /// Resolve a value the caller cannot do without.
    ///
    /// A resolver returning nothing or an empty string is a configuration
    /// error naming `what`.
    pub async fn resolve_required(&self, what: &str, ctx: ResolveContext) -> RouteResult<String> {
        match self.resolve(ctx).await? {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(RouteError::configuration(format!("cannot resolve {}", what))),
        }
    }

    /// Resolve, treating an empty string as absent.
    pub async fn resolve_non_empty(&self, ctx: ResolveContext) -> RouteResult<Option<String>> {
        Ok(self.resolve(ctx).await?.filter(|v| !v.is_empty()))
    }
}

impl<T> Clone for ConfigValue<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Self::Literal(value) => Self::Literal(value.clone()),
            Self::Resolver(f) => Self::Resolver(Arc::clone(f)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ConfigValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

impl From<&str> for ConfigValue<String> {
    fn from(value: &str) -> Self {
        Self::Literal(value.to_string())
    }
}

impl From<String> for ConfigValue<String> {
    fn from(value: String) -> Self {
        Self::Literal(value)
    }
}
