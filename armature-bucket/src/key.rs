//! Object key composition.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

use crate::{RouteError, RouteResult};

/// Where the leading part of a key comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyBase<'a> {
    /// Complete key returned by a key resolver. No further composition.
    Resolved(&'a str),
    /// Literal prefix from the route configuration, possibly empty.
    Prefix(&'a str),
}

/// Inputs to [`compute_key`].
#[derive(Debug, Clone, Copy)]
pub struct KeySpec<'a> {
    /// Base key or prefix.
    pub base: KeyBase<'a>,
    /// Captured path segment, if the route has one.
    pub path_param: Option<&'a str>,
    /// Per-part name for uploads.
    pub form_filename: Option<&'a str>,
    /// Replace the final basename with a random token.
    pub randomize: bool,
}

impl<'a> KeySpec<'a> {
    /// Spec with a literal prefix and nothing else.
    pub fn prefix(prefix: &'a str) -> Self {
        Self {
            base: KeyBase::Prefix(prefix),
            path_param: None,
            form_filename: None,
            randomize: false,
        }
    }

    /// Spec deferring to a resolved key.
    pub fn resolved(key: &'a str) -> Self {
        Self {
            base: KeyBase::Resolved(key),
            ..Self::prefix("")
        }
    }

    /// Set the path parameter.
    pub fn path_param(mut self, value: Option<&'a str>) -> Self {
        self.path_param = value;
        self
    }

    /// Set the per-part filename.
    pub fn form_filename(mut self, value: Option<&'a str>) -> Self {
        self.form_filename = value;
        self
    }

    /// Request randomization.
    pub fn randomize(mut self, randomize: bool) -> Self {
        self.randomize = randomize;
        self
    }
}

/// Compute the final object key.
///
/// A resolved base is used verbatim. Otherwise prefix, path parameter and
/// form filename are joined as POSIX path segments, skipping empty ones.
/// Randomization replaces only the last basename and keeps its extension.
///
/// ```
/// use armature_bucket::{KeySpec, compute_key};
///
/// let key = compute_key(KeySpec::prefix("files").path_param(Some("a/b.pdf"))).unwrap();
/// assert_eq!(key, "files/a/b.pdf");
/// ```
pub fn compute_key(spec: KeySpec<'_>) -> RouteResult<String> {
    let key = match spec.base {
        KeyBase::Resolved(key) => key.to_string(),
        KeyBase::Prefix(prefix) => join_segments(
            [Some(prefix), spec.path_param, spec.form_filename]
                .into_iter()
                .flatten(),
        ),
    };

    if key.is_empty() {
        // Client segments that collapse to nothing (`..`) are a bad request.
        let from_client = [spec.path_param, spec.form_filename]
            .into_iter()
            .flatten()
            .any(|segment| !segment.is_empty());
        return Err(if from_client {
            RouteError::BadRequest("request does not name an object key".to_string())
        } else {
            RouteError::configuration("cannot resolve key")
        });
    }

    if spec.randomize {
        Ok(randomize_basename(&key))
    } else {
        Ok(key)
    }
}

/// Join path fragments with `/`.
///
/// Empty and `.` segments are skipped. `..` drops the previous segment of
/// the same fragment only, so a later fragment never climbs into an earlier one.
pub fn join_segments<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for part in parts {
        let floor = segments.len();
        for segment in part.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.len() > floor {
                        segments.pop();
                    }
                }
                s => segments.push(s),
            }
        }
    }
    segments.join("/")
}

/// Final path segment of a key.
pub fn basename(key: &str) -> &str {
    key.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(key)
}

/// Random 16-byte token, URL-safe base64 without padding.
pub fn random_token() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn randomize_basename(key: &str) -> String {
    let (dir, name) = match key.rfind('/') {
        Some(idx) => (&key[..=idx], &key[idx + 1..]),
        None => ("", key),
    };

    // A leading dot marks a hidden file, not an extension.
    let extension = match name.rfind('.') {
        Some(idx) if idx > 0 => &name[idx..],
        _ => "",
    };

    format!("{}{}{}", dir, random_token(), extension)
}
