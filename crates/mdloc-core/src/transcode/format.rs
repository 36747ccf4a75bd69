//! Target extension resolution: response content type, then URL path, then `png`.

const DEFAULT_EXTENSION: &str = "png";
const MAX_URL_EXTENSION_LEN: usize = 5;

/// Maps a normalized content type (lowercase, no parameters) to an extension.
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/png" | "image/apng" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/svg+xml" => Some("svg"),
        "image/bmp" | "image/x-ms-bmp" => Some("bmp"),
        "image/avif" => Some("avif"),
        _ => None,
    }
}

/// Extension of the last path segment of `url`, if it looks like a real one.
///
/// `image` is a common CDN pseudo-extension and is rejected.
pub fn extension_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path().split('/').filter(|s| !s.is_empty()).last()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > MAX_URL_EXTENSION_LEN {
        return None;
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    let ext = ext.to_ascii_lowercase();
    match ext.as_str() {
        "image" => None,
        "jpeg" => Some("jpg".to_string()),
        _ => Some(ext),
    }
}

/// Resolves the stored extension for an asset fetched from `url`.
pub fn resolve_extension(content_type: Option<&str>, url: &str) -> String {
    content_type
        .and_then(extension_for_content_type)
        .map(str::to_string)
        .or_else(|| extension_from_url(url))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}
