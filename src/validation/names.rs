//! Sanitizers for everything a client can use to address the storage root.

use crate::error::{AppError, Result};

/// Suffixes that mark generated derivative files.
const DERIVATIVE_SUFFIXES: [&str; 2] = ["-thumb.jpg", "-med.jpg"];

/// Reduces a target folder to `[A-Za-z0-9_-]`.
///
/// Returns `None` when nothing survives, meaning "the upload root".
pub fn sanitize_target(raw: &str) -> Option<String> {
    let target: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();

    if target.is_empty() { None } else { Some(target) }
}

/// Replaces every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_file_name(original: &str) -> String {
    original
        .chars()
        .map(|c| match c {
            c if c.is_ascii_alphanumeric() => c,
            '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}

/// Builds the stored name for an upload: `{unix_millis}-{sanitized original}`.
///
/// The result never contains a path separator, so joining it to a directory
/// cannot escape that directory.
pub fn stored_file_name(original: &str, unix_millis: i64) -> String {
    let cleaned = sanitize_file_name(original);
    let cleaned = if cleaned.is_empty() { "upload".to_string() } else { cleaned };
    format!("{}-{}", unix_millis, cleaned)
}

/// Validates a file name addressed by a delete request.
///
/// Only the final path component is considered; it must be a plain file
/// name made of `[A-Za-z0-9._-]`.
pub fn validate_existing_name(raw: &str) -> Result<String> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default();

    if name.is_empty() {
        return Err(AppError::Validation("Missing filename".to_string()));
    }

    if name == "." || name == ".." {
        return Err(AppError::Validation("Invalid filename".to_string()));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
    {
        return Err(AppError::Validation("Invalid filename".to_string()));
    }

    Ok(name.to_string())
}

/// Whether `name` is a generated thumbnail or medium variant.
pub fn is_derivative(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    DERIVATIVE_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
}

/// Splits `name` into stem and extension, the way derivative names are built.
pub fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

/// Name of the thumbnail generated for `name`.
pub fn thumb_name(name: &str) -> String {
    format!("{}-thumb.jpg", file_stem(name))
}

/// Name of the medium variant generated for `name`.
pub fn medium_name(name: &str) -> String {
    format!("{}-med.jpg", file_stem(name))
}

/// Removes characters that would break a `Content-Disposition` header.
pub fn sanitize_attachment_name(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '"' | '\\' | '/' => '_',
            '\n' | '\r' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
