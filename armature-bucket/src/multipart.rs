//! Multipart form data parsing.

use bytes::Bytes;
use http::header::CONTENT_DISPOSITION;
use serde::{Deserialize, Serialize};

use crate::{ContentDisposition, RouteError, RouteResult};

/// One part of a multipart upload.
#[derive(Debug, Clone)]
pub struct FormPart {
    /// Position in the payload.
    pub index: usize,
    /// Form field name.
    pub field_name: String,
    /// Filename declared by the part.
    pub file_name: Option<String>,
    /// Declared content type.
    pub content_type: Option<String>,
    /// Raw `Content-Disposition` header of the part.
    pub content_disposition: Option<String>,
    /// Part bytes.
    pub data: Bytes,
}

impl FormPart {
    /// Create a part from raw values.
    pub fn new(field_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            index: 0,
            field_name: field_name.into(),
            file_name: None,
            content_type: None,
            content_disposition: None,
            data: data.into(),
        }
    }

    /// Set the declared filename.
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Set the declared content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the raw disposition header.
    pub fn with_content_disposition(mut self, value: impl Into<String>) -> Self {
        self.content_disposition = Some(value.into());
        self
    }

    /// Key this part is stored under, before prefixing.
    ///
    /// Disposition filename, then disposition name, then field name.
    pub fn form_key(&self) -> Option<String> {
        let parsed = self
            .content_disposition
            .as_deref()
            .and_then(ContentDisposition::parse);

        self.file_name
            .clone()
            .or_else(|| parsed.as_ref().and_then(|cd| cd.filename.clone()))
            .or_else(|| parsed.and_then(|cd| cd.name))
            .or_else(|| Some(self.field_name.clone()))
            .filter(|k| !k.is_empty())
    }

    /// Part size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Limits applied while reading an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadLimits {
    /// Maximum size of a single part.
    #[serde(default)]
    pub max_file_size: Option<u64>,
    /// Maximum number of parts.
    #[serde(default)]
    pub max_files: Option<usize>,
}

impl UploadLimits {
    /// No limits.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Set maximum part size.
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    /// Set maximum number of parts.
    pub fn max_files(mut self, count: usize) -> Self {
        self.max_files = Some(count);
        self
    }

    fn constraints(&self) -> multer::Constraints {
        let mut size = multer::SizeLimit::new();
        if let Some(max) = self.max_file_size {
            size = size.per_field(max);
        }
        multer::Constraints::new().size_limit(size)
    }
}

/// Whether a `Content-Type` value announces multipart form data.
pub fn is_multipart(content_type: &str) -> bool {
    content_type
        .parse::<mime::Mime>()
        .map(|m| m.type_() == mime::MULTIPART && m.subtype() == mime::FORM_DATA)
        .unwrap_or(false)
}

/// Read every part of a multipart body.
///
/// Parts are buffered; the upload pipeline validates all of them before
/// storing any.
pub async fn read_parts(
    content_type: &str,
    body: Bytes,
    limits: &UploadLimits,
) -> RouteResult<Vec<FormPart>> {
    let boundary = multer::parse_boundary(content_type)
        .map_err(|e| RouteError::UnsupportedMediaType(e.to_string()))?;

    let stream = futures::stream::once(async move { Ok::<Bytes, std::io::Error>(body) });
    let mut multipart =
        multer::Multipart::with_constraints(stream, boundary, limits.constraints());

    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if let Some(max) = limits.max_files {
            if parts.len() >= max {
                return Err(RouteError::PayloadTooLarge(format!(
                    "upload exceeds the limit of {} files",
                    max
                )));
            }
        }

        let field_name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(String::from);
        let content_type = field.content_type().map(ToString::to_string);
        let content_disposition = field
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let data = field.bytes().await?;

        parts.push(FormPart {
            index: parts.len(),
            field_name,
            file_name,
            content_type,
            content_disposition,
            data,
        });
    }

    Ok(parts)
}
