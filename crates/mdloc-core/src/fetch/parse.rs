//! Parse HTTP response header lines into the metadata a task needs.

/// Metadata from the final response's headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMeta {
    /// Declared body size, if `Content-Length` is present.
    pub content_length: Option<u64>,
    /// Media type without parameters, lowercased (e.g. `image/png`).
    pub content_type: Option<String>,
}

/// Strip parameters and normalize case: `Image/PNG; q=1` → `image/png`.
pub fn normalize_content_type(value: &str) -> Option<String> {
    let media = value.split(';').next().unwrap_or("").trim();
    if media.is_empty() {
        None
    } else {
        Some(media.to_ascii_lowercase())
    }
}

/// Parse collected header lines. A status line (`HTTP/...`) starts a new
/// response, so after redirects only the last response's headers count.
pub(crate) fn parse_headers(lines: &[String]) -> ResponseMeta {
    let mut meta = ResponseMeta::default();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("HTTP/") {
            meta = ResponseMeta::default();
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                if let Ok(n) = value.parse::<u64>() {
                    meta.content_length = Some(n);
                }
            }
            if name.eq_ignore_ascii_case("content-type") {
                meta.content_type = normalize_content_type(value);
            }
        }
    }

    meta
}
