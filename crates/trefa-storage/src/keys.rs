//! Shared key generation for storage backends.
//!
//! Key format: `{business_key}/{sanitized_filename}.webp`.

/// Strip the last extension and replace every character outside `[A-Za-z0-9._-]` with `_`.
///
/// Only the final extension goes: `archive.tar.gz` becomes `archive.tar`. A name that
/// is nothing but an extension (`.jpg`) sanitizes to an empty string.
pub fn sanitize_filename(filename: &str) -> String {
    let stem = match filename.rfind('.') {
        Some(idx) if idx + 1 < filename.len() && !filename[idx + 1..].contains('/') => {
            &filename[..idx]
        }
        _ => filename,
    };

    stem.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Storage key for a transcoded image of the record identified by `business_key`.
///
/// Deterministic, so re-running a sync overwrites the same objects.
pub fn image_key(business_key: &str, filename: &str) -> String {
    format!("{}/{}.webp", business_key, sanitize_filename(filename))
}
