//! Classification of stored image references.
//!
//! The cache table holds image references in several shapes: bare filenames,
//! bucket-relative paths, absolute URLs, and assorted junk (JSON fragments,
//! spreadsheet error markers). [`PathLike::classify`] sorts one raw string into
//! one of those shapes so callers can resolve it to a public URL.

use serde_json::Value;

/// True when `name` ends in a dot followed by 2 to 5 ASCII alphanumerics.
fn has_file_extension(name: &str) -> bool {
    name.rsplit_once('.').is_some_and(|(_, ext)| {
        (2..=5).contains(&ext.len()) && ext.bytes().all(|b| b.is_ascii_alphanumeric())
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathLike {
    /// `photo.webp`
    Filename(String),
    /// `OC-1001/photo.webp`
    RelativePath(String),
    /// `https://…`
    FullUrl(String),
    Unrecognized,
}

impl PathLike {
    pub fn classify(raw: &str) -> Self {
        let t = raw.trim();
        if t.is_empty() || t.starts_with('{') || t.starts_with('[') || t.starts_with('"') {
            return PathLike::Unrecognized;
        }
        if t.to_lowercase().contains("error") {
            return PathLike::Unrecognized;
        }

        let lower = t.to_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return PathLike::FullUrl(t.to_string());
        }
        if t.contains('/') {
            return PathLike::RelativePath(t.to_string());
        }
        if has_file_extension(t) {
            return PathLike::Filename(t.to_string());
        }
        PathLike::Unrecognized
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, PathLike::Unrecognized)
    }

    /// Public URL for this reference; bucket-relative shapes are resolved against `base`.
    pub fn public_url(&self, base: Option<&str>) -> Option<String> {
        match self {
            PathLike::FullUrl(url) => Some(url.clone()),
            PathLike::Filename(path) | PathLike::RelativePath(path) => {
                base.and_then(|b| build_public_url(b, path))
            }
            PathLike::Unrecognized => None,
        }
    }
}

/// Join `base` and a bucket-relative `path`, percent-encoding each path segment.
///
/// The path is decoded first so already-encoded input (`a%2Fb.webp`) is not double-encoded.
pub fn build_public_url(base: &str, path: &str) -> Option<String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(trimmed)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| trimmed.to_string());
    let cleaned = decoded.trim_start_matches('/');
    if cleaned.is_empty() {
        return None;
    }
    let encoded = cleaned
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    Some(format!("{}/{}", base.trim_end_matches('/'), encoded))
}

/// Extract recognized references from a loosely-typed column value.
///
/// Accepts arrays, JSON-encoded strings, comma separated strings, single strings, and
/// objects (values are used). Unrecognized entries are dropped.
pub fn normalize_paths_field(field: &Value) -> Vec<PathLike> {
    let strings: Vec<String> = match field {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().map(value_to_string).collect(),
        Value::Object(map) => map.values().map(value_to_string).collect(),
        Value::String(s) => {
            let trimmed = s.trim();
            match serde_json::from_str::<Value>(trimmed) {
                Ok(Value::Array(items)) => items.iter().map(value_to_string).collect(),
                Ok(Value::Object(map)) => map.values().map(value_to_string).collect(),
                Ok(Value::String(inner)) => vec![inner],
                _ if trimmed.contains(',') => {
                    trimmed.split(',').map(|p| p.trim().to_string()).collect()
                }
                _ => vec![trimmed.to_string()],
            }
        }
        other => vec![value_to_string(other)],
    };

    strings
        .iter()
        .map(|s| PathLike::classify(s))
        .filter(PathLike::is_recognized)
        .collect()
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}
