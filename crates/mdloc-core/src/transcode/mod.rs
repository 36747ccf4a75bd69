//! Asset transcoder: WebP normalization and staged size reduction.
//!
//! Pure bytes-in, bytes-out. Vector input passes through untouched. Raster
//! input within the size ceiling is normalized once at high quality (unless
//! it is already WebP). Input over the ceiling is degraded in up to three
//! stages, stopping as soon as the ceiling is met:
//!
//! 1. re-encode the decoded source at quality 80;
//! 2. resize the decoded source to `max_width` and encode at quality 75;
//! 3. re-encode the stage 2 frames at quality 60 and keep the result.
//!
//! Animated GIF, WebP and APNG sources stay animated through every stage.

mod codec;
pub mod format;

pub use codec::WEBP_MAX_DIMENSION;

use serde::Serialize;

const MIB: u64 = 1024 * 1024;

pub const CONVERT_QUALITY: f32 = 80.0;
pub const RESIZE_QUALITY: f32 = 75.0;
pub const REQUANTIZE_QUALITY: f32 = 60.0;

const WEBP_EXTENSION: &str = "webp";

#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image has no frames")]
    NoFrames,
    #[error("{width}x{height} exceeds the WebP dimension limit")]
    Dimensions { width: u32, height: u32 },
    #[error("webp encode failed: {0}")]
    Encode(String),
}

/// A transform applied to an asset, in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    WebpConvert,
    Resize,
    Requantize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscodePolicy {
    /// Target upper bound for the stored asset.
    pub ceiling_bytes: u64,
    /// Width used by the resize stage.
    pub max_width: u32,
    /// Quality for assets already within the ceiling.
    pub normalize_quality: f32,
    /// Normalize raster assets within the ceiling to WebP.
    pub normalize_small: bool,
}

impl Default for TranscodePolicy {
    fn default() -> Self {
        Self {
            ceiling_bytes: 10 * MIB,
            max_width: 2560,
            normalize_quality: 90.0,
            normalize_small: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransformOutcome {
    pub bytes: Vec<u8>,
    pub final_size: u64,
    pub extension: String,
    pub stages: Vec<Stage>,
}

impl TransformOutcome {
    fn unchanged(bytes: Vec<u8>, extension: &str) -> Self {
        Self {
            final_size: bytes.len() as u64,
            bytes,
            extension: extension.to_string(),
            stages: Vec::new(),
        }
    }

    fn webp(bytes: Vec<u8>, stages: Vec<Stage>) -> Self {
        Self {
            final_size: bytes.len() as u64,
            bytes,
            extension: WEBP_EXTENSION.to_string(),
            stages,
        }
    }
}

/// Transcodes `input` whose resolved extension is `extension`.
///
/// Within-ceiling input never errors: if it cannot be normalized it is
/// returned unchanged. Over-ceiling input that cannot be decoded is an error.
pub fn transcode(
    input: Vec<u8>,
    extension: &str,
    policy: &TranscodePolicy,
) -> Result<TransformOutcome, TranscodeError> {
    if extension.eq_ignore_ascii_case("svg") || looks_like_svg(&input) {
        return Ok(TransformOutcome::unchanged(input, extension));
    }

    let size = input.len() as u64;
    if size <= policy.ceiling_bytes {
        if !policy.normalize_small || is_webp(&input) {
            return Ok(TransformOutcome::unchanged(input, extension));
        }
        let normalized =
            codec::decode(&input).and_then(|src| codec::encode_webp(&src, policy.normalize_quality));
        return Ok(match normalized {
            Ok(bytes) => TransformOutcome::webp(bytes, vec![Stage::WebpConvert]),
            Err(e) => {
                tracing::debug!(error = %e, size, "normalization skipped, keeping original bytes");
                TransformOutcome::unchanged(input, extension)
            }
        });
    }

    degrade(&input, policy)
}

fn degrade(input: &[u8], policy: &TranscodePolicy) -> Result<TransformOutcome, TranscodeError> {
    let ceiling = policy.ceiling_bytes;
    let fits = |bytes: &[u8]| bytes.len() as u64 <= ceiling;

    let source = codec::decode(input)?;
    let (width, height) = source.dimensions();
    tracing::debug!(
        size = input.len(),
        ceiling,
        width,
        height,
        frames = source.len(),
        animated = source.is_animated(),
        "asset over ceiling, degrading"
    );

    let mut stages = Vec::with_capacity(3);
    match codec::encode_webp(&source, CONVERT_QUALITY) {
        Ok(bytes) => {
            stages.push(Stage::WebpConvert);
            if fits(&bytes) {
                return Ok(TransformOutcome::webp(bytes, stages));
            }
        }
        Err(TranscodeError::Dimensions { width, height }) => {
            tracing::debug!(width, height, "too large for direct encode, resizing first");
        }
        Err(e) => return Err(e),
    }

    let resized = codec::fit_width(source, policy.max_width);
    let bytes = codec::encode_webp(&resized, RESIZE_QUALITY)?;
    stages.push(Stage::Resize);
    if fits(&bytes) {
        return Ok(TransformOutcome::webp(bytes, stages));
    }

    let bytes = codec::encode_webp(&resized, REQUANTIZE_QUALITY)?;
    stages.push(Stage::Requantize);
    if !fits(&bytes) {
        tracing::debug!(size = bytes.len(), ceiling, "ceiling not met after final stage");
    }
    Ok(TransformOutcome::webp(bytes, stages))
}

fn is_webp(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP"
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    let text = String::from_utf8_lossy(head);
    let text = text.trim_start_matches('\u{feff}').trim_start();
    (text.starts_with("<svg") || text.starts_with("<?xml")) && text.contains("<svg")
}
