//! File-backed route settings.
//!
//! Literal options can live in TOML or JSON; resolvers and delegates are
//! attached to the builder afterwards.
//!
//! ```toml
//! bucket = "media"
//! key = "uploads"
//! mode = { get = "inline", post = "attachment" }
//! allowed_content_types = ["application/pdf", { pattern = "^image/" }]
//! ignored_form_keys = ["csrf"]
//!
//! [override_content_types]
//! "application/octet-stream" = "application/pdf"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::{
    ConnectionConfig, MatcherSet, MatcherSpec, ModeConfig, RouteConfig, RouteConfigBuilder,
    UploadLimits,
};

/// Settings loading failures.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to load settings: {0}")]
    LoadError(String),

    #[error("Failed to parse settings: {0}")]
    ParseError(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Settings file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsFormat {
    Toml,
    Json,
}

impl SettingsFormat {
    /// Detect format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Literal route options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteSettings {
    pub bucket: String,
    pub key: Option<String>,
    pub mode: Option<ModeConfig>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub override_content_types: HashMap<String, String>,
    pub allowed_content_types: Option<Vec<MatcherSpec>>,
    pub ignored_form_keys: Option<Vec<MatcherSpec>>,
    pub random_post_keys: bool,
    pub path_param: Option<String>,
    pub upload_limits: UploadLimits,
    pub connection: ConnectionConfig,
}

impl RouteSettings {
    /// Parse TOML settings.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        toml::from_str(content)
            .map_err(|e| SettingsError::ParseError(format!("TOML parse error: {}", e)))
    }

    /// Parse JSON settings.
    pub fn from_json_str(content: &str) -> Result<Self, SettingsError> {
        serde_json::from_str(content)
            .map_err(|e| SettingsError::ParseError(format!("JSON parse error: {}", e)))
    }

    /// Load settings, picking the format from the file extension.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| SettingsError::LoadError("No file extension found".to_string()))?;
        let format = SettingsFormat::from_extension(ext)
            .ok_or_else(|| SettingsError::LoadError(format!("Unsupported format: {}", ext)))?;

        let content = std::fs::read_to_string(path)?;
        match format {
            SettingsFormat::Toml => Self::from_toml_str(&content),
            SettingsFormat::Json => Self::from_json_str(&content),
        }
    }

    /// Turn into a builder. Patterns are compiled here.
    pub fn into_builder(self) -> Result<RouteConfigBuilder, SettingsError> {
        let mut builder = RouteConfig::builder(self.bucket)
            .random_post_keys(self.random_post_keys)
            .upload_limits(self.upload_limits)
            .connection(self.connection);

        if let Some(key) = self.key {
            builder = builder.key(key);
        }
        if let Some(mode) = self.mode {
            builder = builder.mode(mode);
        }
        if let Some(filename) = self.filename {
            builder = builder.filename(filename);
        }
        if let Some(content_type) = self.content_type {
            builder = builder.content_type(content_type);
        }
        for (from, to) in self.override_content_types {
            builder = builder.override_content_type(from, to);
        }
        if let Some(specs) = self.allowed_content_types {
            builder = builder.allowed_content_types(MatcherSet::compile(&specs)?);
        }
        if let Some(specs) = self.ignored_form_keys {
            builder = builder.ignored_form_keys(MatcherSet::compile(&specs)?);
        }
        if let Some(param) = self.path_param {
            builder = builder.path_param(param);
        }

        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DispositionMode;
    use std::io::Write;

    const TOML: &str = r#"
bucket = "media"
key = "uploads"
mode = { get = "inline", post = "attachment" }
allowed_content_types = ["application/pdf", { pattern = "^image/" }, { missing = true }]
ignored_form_keys = ["csrf"]
random_post_keys = true

[override_content_types]
"application/octet-stream" = "application/pdf"

[upload_limits]
max_files = 3

[connection]
region = "eu-west-1"
endpoint = "localhost:9000"
force_path_style = true
"#;

    #[test]
    fn test_parse_toml() {
        let settings = RouteSettings::from_toml_str(TOML).unwrap();
        assert_eq!(settings.bucket, "media");
        assert_eq!(settings.key.as_deref(), Some("uploads"));
        assert_eq!(settings.upload_limits.max_files, Some(3));
        assert_eq!(settings.connection.region, "eu-west-1");
        assert!(settings.connection.ssl_enabled);
        assert_eq!(settings.allowed_content_types.as_ref().map(Vec::len), Some(3));
    }

    #[test]
    fn test_into_builder() {
        let config = RouteSettings::from_toml_str(TOML)
            .unwrap()
            .into_builder()
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.mode().get(), DispositionMode::Inline);
        assert_eq!(config.mode().post(), DispositionMode::Attachment);
        assert!(config.random_post_keys());
        assert!(config.is_content_type_allowed(Some("image/png")));
        assert!(config.is_content_type_allowed(None));
        assert!(!config.is_content_type_allowed(Some("text/plain")));
        assert!(config.is_ignored("csrf", None));
        assert_eq!(
            config.override_content_type(Some("application/octet-stream".into())),
            Some("application/pdf".into())
        );
    }

    #[test]
    fn test_parse_json() {
        let settings =
            RouteSettings::from_json_str(r#"{"bucket": "media", "mode": "off"}"#).unwrap();
        assert_eq!(settings.mode, Some(ModeConfig::All(DispositionMode::Off)));
    }

    #[test]
    fn test_invalid_pattern() {
        let settings = RouteSettings::from_json_str(
            r#"{"bucket": "media", "ignored_form_keys": [{"pattern": "("}]}"#,
        )
        .unwrap();
        assert!(matches!(
            settings.into_builder(),
            Err(SettingsError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(TOML.as_bytes()).unwrap();

        let settings = RouteSettings::load_file(file.path()).unwrap();
        assert_eq!(settings.bucket, "media");
    }

    #[test]
    fn test_load_file_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(matches!(
            RouteSettings::load_file(file.path()),
            Err(SettingsError::LoadError(_))
        ));
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(SettingsFormat::from_extension("TOML"), Some(SettingsFormat::Toml));
        assert_eq!(SettingsFormat::from_extension("json"), Some(SettingsFormat::Json));
        assert_eq!(SettingsFormat::from_extension("yaml"), None);
    }
}
