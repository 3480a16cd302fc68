//! Content-Disposition policy, parsing and formatting.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::key::basename;

/// RFC 5987 `attr-char` complement.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// How a route sets `Content-Disposition`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispositionMode {
    /// Never set the header.
    Off,
    /// Follow the existing header, defaulting to `attachment`.
    #[default]
    Auto,
    /// Always `attachment`.
    Attachment,
    /// Always `inline`.
    Inline,
}

impl DispositionMode {
    /// Mode name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Auto => "auto",
            Self::Attachment => "attachment",
            Self::Inline => "inline",
        }
    }
}

impl fmt::Display for DispositionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DispositionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "auto" => Ok(Self::Auto),
            "attachment" => Ok(Self::Attachment),
            "inline" => Ok(Self::Inline),
            other => Err(format!("unknown disposition mode: {}", other)),
        }
    }
}

/// Disposition type emitted in a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispositionType {
    /// Display in the browser.
    Inline,
    /// Download.
    Attachment,
}

impl DispositionType {
    /// Type token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Attachment => "attachment",
        }
    }
}

/// A parsed `Content-Disposition` header.
///
/// `kind` keeps the raw lowercased type, since upload parts carry
/// `form-data` rather than `inline` or `attachment`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Lowercased disposition type.
    pub kind: String,
    /// Filename, preferring `filename*` over `filename`.
    pub filename: Option<String>,
    /// `name` parameter, present on form-data parts.
    pub name: Option<String>,
}

impl ContentDisposition {
    /// Parse a header value.
    ///
    /// Returns `None` for an empty value.
    ///
    /// ```
    /// use armature_bucket::ContentDisposition;
    ///
    /// let cd = ContentDisposition::parse(r#"attachment; filename="a b.pdf""#).unwrap();
    /// assert_eq!(cd.kind, "attachment");
    /// assert_eq!(cd.filename.as_deref(), Some("a b.pdf"));
    /// ```
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = split_params(value).into_iter();
        let kind = parts.next()?.trim().to_ascii_lowercase();
        if kind.is_empty() {
            return None;
        }

        let mut filename = None;
        let mut extended = None;
        let mut name = None;

        for param in parts {
            let Some((key, raw)) = param.split_once('=') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let raw = raw.trim();
            match key.as_str() {
                "filename" => filename = Some(unquote(raw)),
                "filename*" => extended = decode_extended(raw),
                "name" => name = Some(unquote(raw)),
                _ => {}
            }
        }

        Some(Self {
            kind,
            filename: extended.or(filename).filter(|f| !f.is_empty()),
            name,
        })
    }

    /// The type, if it is one a response can carry.
    pub fn disposition_type(&self) -> Option<DispositionType> {
        match self.kind.as_str() {
            "inline" => Some(DispositionType::Inline),
            "attachment" => Some(DispositionType::Attachment),
            _ => None,
        }
    }
}

/// Format a header value.
///
/// Only the basename of `filename` is used. Printable ASCII names are quoted;
/// anything else gets an ASCII fallback plus a `filename*` parameter.
///
/// ```
/// use armature_bucket::{DispositionType, format_disposition};
///
/// assert_eq!(
///     format_disposition(DispositionType::Attachment, Some("1.pdf")),
///     r#"attachment; filename="1.pdf""#
/// );
/// ```
pub fn format_disposition(kind: DispositionType, filename: Option<&str>) -> String {
    let Some(name) = filename.map(basename).filter(|n| !n.is_empty()) else {
        return kind.as_str().to_string();
    };

    if name.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        return format!("{}; filename={}", kind.as_str(), quote(name));
    }

    let fallback: String = name
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect();
    format!(
        "{}; filename={}; filename*=UTF-8''{}",
        kind.as_str(),
        quote(&fallback),
        utf8_percent_encode(name, ATTR_CHAR)
    )
}

/// Inputs to [`decide`].
#[derive(Debug, Clone, Copy)]
pub struct DispositionInput<'a> {
    /// Route mode for this method.
    pub mode: DispositionMode,
    /// Header already attached to the object or upload part.
    pub existing_header: Option<&'a str>,
    /// Output of the configured filename resolver.
    pub configured_filename: Option<&'a str>,
    /// Resolved object key.
    pub key: &'a str,
}

/// Decide the `Content-Disposition` value for a response or upload.
///
/// `None` means no header.
pub fn decide(input: DispositionInput<'_>) -> Option<String> {
    let key_name = Some(basename(input.key)).filter(|n| !n.is_empty());

    match input.mode {
        DispositionMode::Off => None,
        DispositionMode::Attachment | DispositionMode::Inline => {
            let kind = if input.mode == DispositionMode::Inline {
                DispositionType::Inline
            } else {
                DispositionType::Attachment
            };
            let filename = input
                .configured_filename
                .map(str::to_string)
                .or(key_name.map(str::to_string));
            Some(format_disposition(kind, filename.as_deref()))
        }
        DispositionMode::Auto => {
            let existing = input.existing_header.and_then(ContentDisposition::parse);
            let kind = existing
                .as_ref()
                .and_then(ContentDisposition::disposition_type)
                .unwrap_or(DispositionType::Attachment);
            let filename = input
                .configured_filename
                .map(str::to_string)
                .or_else(|| existing.and_then(|e| e.filename))
                .or(key_name.map(str::to_string));
            Some(format_disposition(kind, filename.as_deref()))
        }
    }
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn unquote(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
        return value.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn decode_extended(value: &str) -> Option<String> {
    let mut parts = value.splitn(3, '\'');
    let charset = parts.next()?.to_ascii_lowercase();
    let _language = parts.next()?;
    let encoded = parts.next()?;

    let bytes: Vec<u8> = percent_decode_str(encoded).collect();
    match charset.as_str() {
        "utf-8" => String::from_utf8(bytes).ok(),
        "iso-8859-1" => Some(bytes.into_iter().map(char::from).collect()),
        _ => None,
    }
}

/// Split on `;` outside quoted strings.
fn split_params(value: &str) -> Vec<String> {
    let mut params = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in value.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                current.push(c);
                in_quotes = !in_quotes;
            }
            ';' if !in_quotes => params.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    params.push(current);
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(
        mode: DispositionMode,
        existing: Option<&'a str>,
        filename: Option<&'a str>,
        key: &'a str,
    ) -> DispositionInput<'a> {
        DispositionInput {
            mode,
            existing_header: existing,
            configured_filename: filename,
            key,
        }
    }

    #[test]
    fn test_auto_without_existing_header() {
        let header = decide(input(DispositionMode::Auto, None, Some("1.pdf"), "files/x"));
        assert_eq!(header.as_deref(), Some(r#"attachment; filename="1.pdf""#));
    }

    #[test]
    fn test_auto_adopts_existing_type_and_filename() {
        let header = decide(input(
            DispositionMode::Auto,
            Some(r#"inline; filename="report.pdf""#),
            None,
            "files/abc",
        ));
        assert_eq!(header.as_deref(), Some(r#"inline; filename="report.pdf""#));
    }

    #[test]
    fn test_auto_configured_filename_wins() {
        let header = decide(input(
            DispositionMode::Auto,
            Some(r#"inline; filename="report.pdf""#),
            Some("override.pdf"),
            "files/abc",
        ));
        assert_eq!(header.as_deref(), Some(r#"inline; filename="override.pdf""#));
    }

    #[test]
    fn test_auto_form_data_part_defaults_to_attachment() {
        let header = decide(input(
            DispositionMode::Auto,
            Some(r#"form-data; name="file"; filename="1.pdf""#),
            None,
            "files/1.pdf",
        ));
        assert_eq!(header.as_deref(), Some(r#"attachment; filename="1.pdf""#));
    }

    #[test]
    fn test_auto_falls_back_to_key_basename() {
        let header = decide(input(DispositionMode::Auto, Some("inline"), None, "files/a/b.txt"));
        assert_eq!(header.as_deref(), Some(r#"inline; filename="b.txt""#));
    }

    #[test]
    fn test_fixed_modes_ignore_existing_header() {
        let header = decide(input(
            DispositionMode::Inline,
            Some(r#"attachment; filename="old.pdf""#),
            None,
            "files/new.pdf",
        ));
        assert_eq!(header.as_deref(), Some(r#"inline; filename="new.pdf""#));

        let header = decide(input(DispositionMode::Attachment, Some("inline"), None, "k.bin"));
        assert_eq!(header.as_deref(), Some(r#"attachment; filename="k.bin""#));
    }

    #[test]
    fn test_off_emits_nothing() {
        assert!(decide(input(DispositionMode::Off, Some("inline"), None, "k")).is_none());
    }

    #[test]
    fn test_header_without_filename() {
        let header = decide(input(DispositionMode::Inline, None, None, "/"));
        assert_eq!(header.as_deref(), Some("inline"));
    }

    #[test]
    fn test_quoting_escapes() {
        assert_eq!(
            format_disposition(DispositionType::Attachment, Some(r#"a"b\c.txt"#)),
            r#"attachment; filename="a\"b\\c.txt""#
        );
    }

    #[test]
    fn test_non_ascii_filename() {
        let value = format_disposition(DispositionType::Attachment, Some("résumé.pdf"));
        assert_eq!(
            value,
            r#"attachment; filename="r?sum?.pdf"; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"#
        );
        let parsed = ContentDisposition::parse(&value).unwrap();
        assert_eq!(parsed.filename.as_deref(), Some("résumé.pdf"));
    }

    #[test]
    fn test_parse_quoted_semicolon() {
        let parsed = ContentDisposition::parse(r#"ATTACHMENT; filename="a;b.txt""#).unwrap();
        assert_eq!(parsed.disposition_type(), Some(DispositionType::Attachment));
        assert_eq!(parsed.filename.as_deref(), Some("a;b.txt"));
    }

    #[test]
    fn test_parse_form_data() {
        let parsed = ContentDisposition::parse(r#"form-data; name="avatar"; filename=me.png"#).unwrap();
        assert_eq!(parsed.kind, "form-data");
        assert_eq!(parsed.disposition_type(), None);
        assert_eq!(parsed.name.as_deref(), Some("avatar"));
        assert_eq!(parsed.filename.as_deref(), Some("me.png"));
    }

    #[test]
    fn test_parse_empty() {
        assert!(ContentDisposition::parse("").is_none());
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("INLINE".parse::<DispositionMode>().unwrap(), DispositionMode::Inline);
        assert!("download".parse::<DispositionMode>().is_err());
        assert_eq!(DispositionMode::default(), DispositionMode::Auto);
    }
}
