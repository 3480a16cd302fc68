//! Route and connection configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{
    ConfigValue, DefaultResponder, DispositionMode, MatcherSet, ResponseDelegate, RouteError,
    RouteResult, UploadLimits,
};

/// Path parameter holding the object key when none is configured.
pub const DEFAULT_PATH_PARAM: &str = "key";

/// Credentials used to reach the object store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialsSource {
    /// Default provider chain of the backend SDK.
    #[default]
    Auto,
    /// Static credentials.
    Explicit {
        access_key_id: String,
        secret_access_key: String,
        session_token: Option<String>,
    },
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_true() -> bool {
    true
}

/// Object store connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Region.
    #[serde(default = "default_region")]
    pub region: String,
    /// Use TLS for endpoints given without a scheme and for the AWS endpoint.
    #[serde(default = "default_true")]
    pub ssl_enabled: bool,
    /// Credentials source.
    #[serde(default)]
    pub credentials: CredentialsSource,
    /// Custom endpoint (MinIO, LocalStack).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Address buckets by path instead of virtual host.
    #[serde(default)]
    pub force_path_style: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            ssl_enabled: true,
            credentials: CredentialsSource::Auto,
            endpoint: None,
            force_path_style: false,
        }
    }
}

impl ConnectionConfig {
    /// Load settings from the environment, after an optional `.env` file.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(region) = std::env::var("AWS_REGION") {
            config.region = region;
        } else if let Ok(region) = std::env::var("AWS_DEFAULT_REGION") {
            config.region = region;
        }

        if let Ok(endpoint) = std::env::var("AWS_ENDPOINT_URL") {
            config.endpoint = Some(endpoint);
        }

        if let (Ok(access_key_id), Ok(secret_access_key)) = (
            std::env::var("AWS_ACCESS_KEY_ID"),
            std::env::var("AWS_SECRET_ACCESS_KEY"),
        ) {
            config.credentials = CredentialsSource::Explicit {
                access_key_id,
                secret_access_key,
                session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
            };
        }

        config
    }

    /// Set the region.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Set a custom endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Use static credentials.
    pub fn explicit_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.credentials = CredentialsSource::Explicit {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        };
        self
    }

    /// Enable or disable TLS.
    pub fn ssl_enabled(mut self, enabled: bool) -> Self {
        self.ssl_enabled = enabled;
        self
    }

    /// Address buckets by path.
    pub fn force_path_style(mut self, force: bool) -> Self {
        self.force_path_style = force;
        self
    }

    /// Endpoint URL with the scheme implied by `ssl_enabled` when missing.
    ///
    /// Without a custom endpoint this is `None` over TLS, and the regional
    /// AWS endpoint over plain HTTP otherwise.
    pub fn endpoint_url(&self) -> Option<String> {
        match &self.endpoint {
            Some(endpoint) if endpoint.contains("://") => Some(endpoint.clone()),
            Some(endpoint) if self.ssl_enabled => Some(format!("https://{}", endpoint)),
            Some(endpoint) => Some(format!("http://{}", endpoint)),
            None if self.ssl_enabled => None,
            None => Some(format!("http://s3.{}.amazonaws.com", self.region)),
        }
    }
}

/// Disposition mode for the whole route or per method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModeConfig {
    /// Same mode for GET and POST.
    All(DispositionMode),
    /// Separate modes.
    PerMethod {
        #[serde(default)]
        get: DispositionMode,
        #[serde(default)]
        post: DispositionMode,
    },
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self::All(DispositionMode::Auto)
    }
}

impl ModeConfig {
    /// Mode applied to GET.
    pub fn get(&self) -> DispositionMode {
        match self {
            Self::All(mode) => *mode,
            Self::PerMethod { get, .. } => *get,
        }
    }

    /// Mode applied to POST.
    pub fn post(&self) -> DispositionMode {
        match self {
            Self::All(mode) => *mode,
            Self::PerMethod { post, .. } => *post,
        }
    }
}

impl From<DispositionMode> for ModeConfig {
    fn from(mode: DispositionMode) -> Self {
        Self::All(mode)
    }
}

/// Validated route configuration.
///
/// Built once per route with [`RouteConfig::builder`] and shared by every
/// request the route serves.
#[derive(Clone)]
pub struct RouteConfig {
    pub(crate) bucket: ConfigValue<String>,
    pub(crate) key: Option<ConfigValue<String>>,
    pub(crate) mode: ModeConfig,
    pub(crate) filename: Option<ConfigValue<String>>,
    pub(crate) content_type: Option<ConfigValue<String>>,
    pub(crate) override_content_types: HashMap<String, String>,
    pub(crate) allowed_content_types: Option<MatcherSet>,
    pub(crate) ignored_form_keys: Option<MatcherSet>,
    pub(crate) random_post_keys: bool,
    pub(crate) path_param: String,
    pub(crate) upload_limits: UploadLimits,
    pub(crate) on_response: Option<Arc<dyn ResponseDelegate>>,
    pub(crate) connection: ConnectionConfig,
}

static DEFAULT_RESPONDER: DefaultResponder = DefaultResponder;

impl RouteConfig {
    /// Start a configuration for a bucket.
    pub fn builder(bucket: impl Into<ConfigValue<String>>) -> RouteConfigBuilder {
        RouteConfigBuilder::new(bucket)
    }

    /// Bucket source.
    pub fn bucket(&self) -> &ConfigValue<String> {
        &self.bucket
    }

    /// Key source, if configured.
    pub fn key(&self) -> Option<&ConfigValue<String>> {
        self.key.as_ref()
    }

    /// Disposition modes.
    pub fn mode(&self) -> ModeConfig {
        self.mode
    }

    /// Path parameter carrying the key segment.
    pub fn path_param(&self) -> &str {
        &self.path_param
    }

    /// Upload limits.
    pub fn upload_limits(&self) -> &UploadLimits {
        &self.upload_limits
    }

    /// Connection settings.
    pub fn connection(&self) -> &ConnectionConfig {
        &self.connection
    }

    /// Whether POST keys are randomized.
    pub fn random_post_keys(&self) -> bool {
        self.random_post_keys
    }

    /// Substitute a reported content type if an override exists.
    pub fn override_content_type(&self, content_type: Option<String>) -> Option<String> {
        match content_type {
            Some(ct) => Some(self.override_content_types.get(&ct).cloned().unwrap_or(ct)),
            None => None,
        }
    }

    /// Whether an upload part's content type is accepted.
    pub fn is_content_type_allowed(&self, content_type: Option<&str>) -> bool {
        self.allowed_content_types
            .as_ref()
            .is_none_or(|set| set.matches(content_type))
    }

    /// Whether a field name or form key is on the ignore list.
    pub fn is_ignored(&self, field_name: &str, form_key: Option<&str>) -> bool {
        self.ignored_form_keys.as_ref().is_some_and(|set| {
            set.matches(Some(field_name)) || form_key.is_some_and(|k| set.matches(Some(k)))
        })
    }

    /// Delegate producing the final response.
    pub fn delegate(&self) -> &dyn ResponseDelegate {
        match &self.on_response {
            Some(delegate) => delegate.as_ref(),
            None => &DEFAULT_RESPONDER,
        }
    }

    /// Whether a caller-supplied delegate is installed.
    pub fn has_delegate(&self) -> bool {
        self.on_response.is_some()
    }
}

impl fmt::Debug for RouteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteConfig")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("mode", &self.mode)
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("override_content_types", &self.override_content_types)
            .field("allowed_content_types", &self.allowed_content_types)
            .field("ignored_form_keys", &self.ignored_form_keys)
            .field("random_post_keys", &self.random_post_keys)
            .field("path_param", &self.path_param)
            .field("upload_limits", &self.upload_limits)
            .field("on_response", &self.on_response.is_some())
            .field("connection", &self.connection)
            .finish()
    }
}

/// Builder for [`RouteConfig`].
pub struct RouteConfigBuilder {
    config: RouteConfig,
}

impl RouteConfigBuilder {
    /// Create a builder for a bucket.
    pub fn new(bucket: impl Into<ConfigValue<String>>) -> Self {
        Self {
            config: RouteConfig {
                bucket: bucket.into(),
                key: None,
                mode: ModeConfig::default(),
                filename: None,
                content_type: None,
                override_content_types: HashMap::new(),
                allowed_content_types: None,
                ignored_form_keys: None,
                random_post_keys: false,
                path_param: DEFAULT_PATH_PARAM.to_string(),
                upload_limits: UploadLimits::default(),
                on_response: None,
                connection: ConnectionConfig::default(),
            },
        }
    }

    /// Key prefix (literal) or full key (resolver).
    pub fn key(mut self, key: impl Into<ConfigValue<String>>) -> Self {
        self.config.key = Some(key.into());
        self
    }

    /// Disposition mode for GET and POST.
    pub fn mode(mut self, mode: impl Into<ModeConfig>) -> Self {
        self.config.mode = mode.into();
        self
    }

    /// Separate disposition modes for GET and POST.
    pub fn modes(mut self, get: DispositionMode, post: DispositionMode) -> Self {
        self.config.mode = ModeConfig::PerMethod { get, post };
        self
    }

    /// Filename advertised in the disposition.
    pub fn filename(mut self, filename: impl Into<ConfigValue<String>>) -> Self {
        self.config.filename = Some(filename.into());
        self
    }

    /// Content type replacing the derived one.
    pub fn content_type(mut self, content_type: impl Into<ConfigValue<String>>) -> Self {
        self.config.content_type = Some(content_type.into());
        self
    }

    /// Replace a reported content type with another.
    pub fn override_content_type(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.config
            .override_content_types
            .insert(from.into(), to.into());
        self
    }

    /// Restrict upload content types.
    pub fn allowed_content_types(mut self, set: MatcherSet) -> Self {
        self.config.allowed_content_types = Some(set);
        self
    }

    /// Skip upload parts by field name or form key.
    pub fn ignored_form_keys(mut self, set: MatcherSet) -> Self {
        self.config.ignored_form_keys = Some(set);
        self
    }

    /// Randomize POST key basenames.
    pub fn random_post_keys(mut self, randomize: bool) -> Self {
        self.config.random_post_keys = randomize;
        self
    }

    /// Path parameter carrying the key segment.
    pub fn path_param(mut self, name: impl Into<String>) -> Self {
        self.config.path_param = name.into();
        self
    }

    /// Upload limits.
    pub fn upload_limits(mut self, limits: UploadLimits) -> Self {
        self.config.upload_limits = limits;
        self
    }

    /// Install a response delegate.
    pub fn on_response(mut self, delegate: Arc<dyn ResponseDelegate>) -> Self {
        self.config.on_response = Some(delegate);
        self
    }

    /// Connection settings.
    pub fn connection(mut self, connection: ConnectionConfig) -> Self {
        self.config.connection = connection;
        self
    }

    /// Validate and finish.
    pub fn build(self) -> RouteResult<RouteConfig> {
        let config = self.config;

        if let Some(bucket) = config.bucket.as_literal() {
            if bucket.is_empty() {
                return Err(RouteError::configuration("bucket must not be empty"));
            }
        }

        if config.filename.is_some()
            && (config.mode.get() == DispositionMode::Off
                || config.mode.post() == DispositionMode::Off)
        {
            return Err(RouteError::configuration(
                "filename cannot be set when the disposition mode is off",
            ));
        }

        if config.path_param.is_empty() {
            return Err(RouteError::configuration("path parameter name must not be empty"));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Matcher;

    #[test]
    fn test_builder_defaults() {
        let config = RouteConfig::builder("media").build().unwrap();
        assert_eq!(config.bucket().as_literal().map(String::as_str), Some("media"));
        assert_eq!(config.mode().get(), DispositionMode::Auto);
        assert_eq!(config.path_param(), DEFAULT_PATH_PARAM);
        assert!(!config.has_delegate());
        assert!(config.is_content_type_allowed(Some("anything/at-all")));
        assert!(!config.is_ignored("file", Some("a.pdf")));
    }

    #[test]
    fn test_empty_bucket_rejected() {
        let err = RouteConfig::builder("").build().unwrap_err();
        assert!(matches!(err, RouteError::Configuration(_)));
    }

    #[test]
    fn test_filename_with_mode_off_rejected() {
        let err = RouteConfig::builder("media")
            .mode(DispositionMode::Off)
            .filename("report.pdf")
            .build()
            .unwrap_err();
        assert!(matches!(err, RouteError::Configuration(_)));

        let err = RouteConfig::builder("media")
            .modes(DispositionMode::Inline, DispositionMode::Off)
            .filename("report.pdf")
            .build()
            .unwrap_err();
        assert!(matches!(err, RouteError::Configuration(_)));

        assert!(
            RouteConfig::builder("media")
                .modes(DispositionMode::Inline, DispositionMode::Attachment)
                .filename("report.pdf")
                .build()
                .is_ok()
        );
    }

    #[test]
    fn test_mode_per_method() {
        let mode = ModeConfig::PerMethod {
            get: DispositionMode::Inline,
            post: DispositionMode::Off,
        };
        assert_eq!(mode.get(), DispositionMode::Inline);
        assert_eq!(mode.post(), DispositionMode::Off);
        assert_eq!(ModeConfig::default().get(), DispositionMode::Auto);
    }

    #[test]
    fn test_mode_deserialize() {
        let mode: ModeConfig = serde_json::from_str(r#""inline""#).unwrap();
        assert_eq!(mode, ModeConfig::All(DispositionMode::Inline));

        let mode: ModeConfig = serde_json::from_str(r#"{"get": "attachment"}"#).unwrap();
        assert_eq!(mode.get(), DispositionMode::Attachment);
        assert_eq!(mode.post(), DispositionMode::Auto);
    }

    #[test]
    fn test_override_content_type() {
        let config = RouteConfig::builder("media")
            .override_content_type("application/octet-stream", "application/pdf")
            .build()
            .unwrap();
        assert_eq!(
            config.override_content_type(Some("application/octet-stream".into())),
            Some("application/pdf".into())
        );
        assert_eq!(
            config.override_content_type(Some("text/plain".into())),
            Some("text/plain".into())
        );
        assert_eq!(config.override_content_type(None), None);
    }

    #[test]
    fn test_ignore_list_checks_field_and_form_key() {
        let config = RouteConfig::builder("media")
            .ignored_form_keys(
                MatcherSet::new()
                    .with("csrf")
                    .with(Matcher::pattern(r"\.tmp$").unwrap()),
            )
            .build()
            .unwrap();
        assert!(config.is_ignored("csrf", Some("csrf")));
        assert!(config.is_ignored("file", Some("scratch.tmp")));
        assert!(!config.is_ignored("file", Some("a.pdf")));
    }

    #[test]
    fn test_connection_endpoint_url() {
        let conn = ConnectionConfig::default().endpoint("localhost:9000");
        assert_eq!(conn.endpoint_url().as_deref(), Some("https://localhost:9000"));

        let conn = conn.ssl_enabled(false);
        assert_eq!(conn.endpoint_url().as_deref(), Some("http://localhost:9000"));

        let conn = ConnectionConfig::default().endpoint("http://minio:9000");
        assert_eq!(conn.endpoint_url().as_deref(), Some("http://minio:9000"));
        assert_eq!(ConnectionConfig::default().endpoint_url(), None);
    }

    #[test]
    fn test_plain_http_without_endpoint_uses_regional_aws_endpoint() {
        let conn = ConnectionConfig::default().region("eu-west-1").ssl_enabled(false);
        assert_eq!(
            conn.endpoint_url().as_deref(),
            Some("http://s3.eu-west-1.amazonaws.com")
        );
    }

    #[test]
    fn test_connection_deserialize_defaults() {
        let conn: ConnectionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(conn, ConnectionConfig::default());
        assert_eq!(conn.region, "us-east-1");
        assert!(conn.ssl_enabled);
    }
}
