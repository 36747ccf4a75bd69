//! Content addresses for localized assets.
//!
//! An asset's stored name depends only on its source URL, so every reference
//! to the same URL (in any document) resolves to the same file.

use sha2::{Digest, Sha256};

/// SHA-256 of the URL text as lowercase hex.
pub fn url_digest(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}

/// `<digest>.<extension>` for an asset fetched from `url`.
pub fn asset_file_name(url: &str, extension: &str) -> String {
    format!("{}.{}", url_digest(url), extension)
}
