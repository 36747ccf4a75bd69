//! Decode to RGBA frames, resize, and WebP encode (still or animated).

use std::io::Cursor;

use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::imageops::{self, FilterType};
use image::{AnimationDecoder, Frame, ImageFormat, RgbaImage};
use webp::{AnimEncoder, AnimFrame, Encoder, WebPConfig};

use super::TranscodeError;

/// Largest width or height libwebp can encode.
pub const WEBP_MAX_DIMENSION: u32 = 16383;

#[derive(Debug, Clone)]
pub(crate) struct DecodedFrame {
    pub image: RgbaImage,
    pub delay_ms: u32,
}

/// Decoded source: one frame for stills, every frame for animations.
/// All frames share the canvas size of the first one.
#[derive(Debug, Clone)]
pub(crate) struct Frames {
    frames: Vec<DecodedFrame>,
    animated: bool,
}

impl Frames {
    pub fn dimensions(&self) -> (u32, u32) {
        self.frames
            .first()
            .map(|f| f.image.dimensions())
            .unwrap_or((0, 0))
    }

    pub fn is_animated(&self) -> bool {
        self.animated
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

/// Decodes `bytes`, keeping every frame of GIF, animated WebP and APNG input.
pub(crate) fn decode(bytes: &[u8]) -> Result<Frames, TranscodeError> {
    let format = image::guess_format(bytes)?;
    let animation = match format {
        ImageFormat::Gif => Some(collect(GifDecoder::new(Cursor::new(bytes))?)?),
        ImageFormat::WebP => {
            let decoder = WebPDecoder::new(Cursor::new(bytes))?;
            if decoder.has_animation() {
                Some(collect(decoder)?)
            } else {
                None
            }
        }
        ImageFormat::Png => {
            let decoder = PngDecoder::new(Cursor::new(bytes))?;
            if decoder.is_apng()? {
                Some(collect(decoder.apng()?)?)
            } else {
                None
            }
        }
        _ => None,
    };

    if let Some(frames) = animation {
        if frames.len() > 1 {
            return Ok(Frames {
                frames,
                animated: true,
            });
        }
        if let Some(only) = frames.into_iter().next() {
            return Ok(Frames {
                frames: vec![only],
                animated: false,
            });
        }
        return Err(TranscodeError::NoFrames);
    }

    let image = image::load_from_memory_with_format(bytes, format)?.to_rgba8();
    Ok(Frames {
        frames: vec![DecodedFrame { image, delay_ms: 0 }],
        animated: false,
    })
}

fn collect<'a, D: AnimationDecoder<'a>>(decoder: D) -> Result<Vec<DecodedFrame>, TranscodeError> {
    let raw = decoder.into_frames().collect_frames()?;
    let Some((width, height)) = raw.first().map(|f| f.buffer().dimensions()) else {
        return Err(TranscodeError::NoFrames);
    };
    Ok(raw
        .into_iter()
        .map(|frame| to_canvas(frame, width, height))
        .collect())
}

fn to_canvas(frame: Frame, width: u32, height: u32) -> DecodedFrame {
    let (numer, denom) = frame.delay().numer_denom_ms();
    let delay_ms = numer / denom.max(1);
    let (left, top) = (frame.left(), frame.top());
    let buffer = frame.into_buffer();
    let image = if buffer.dimensions() == (width, height) {
        buffer
    } else {
        let mut canvas = RgbaImage::new(width, height);
        imageops::overlay(&mut canvas, &buffer, i64::from(left), i64::from(top));
        canvas
    };
    DecodedFrame { image, delay_ms }
}

/// Scales every frame down to `max_width`, keeping the aspect ratio.
/// Never upscales: narrower sources are returned as they are.
pub(crate) fn fit_width(source: Frames, max_width: u32) -> Frames {
    let (width, height) = source.dimensions();
    if width <= max_width || width == 0 {
        return source;
    }
    let new_height = ((u64::from(height) * u64::from(max_width)) / u64::from(width)).max(1) as u32;
    tracing::debug!(
        from_width = width,
        from_height = height,
        to_width = max_width,
        to_height = new_height,
        "resizing"
    );
    let frames = source
        .frames
        .into_iter()
        .map(|f| DecodedFrame {
            image: imageops::resize(&f.image, max_width, new_height, FilterType::Lanczos3),
            delay_ms: f.delay_ms,
        })
        .collect();
    Frames {
        frames,
        animated: source.animated,
    }
}

/// Lossy WebP encode at `quality` (0-100). Animated sources stay animated.
pub(crate) fn encode_webp(source: &Frames, quality: f32) -> Result<Vec<u8>, TranscodeError> {
    let (width, height) = source.dimensions();
    if width > WEBP_MAX_DIMENSION || height > WEBP_MAX_DIMENSION {
        return Err(TranscodeError::Dimensions { width, height });
    }
    let Some(first) = source.frames.first() else {
        return Err(TranscodeError::NoFrames);
    };

    if !source.animated {
        let encoded = Encoder::from_rgba(first.image.as_raw(), width, height)
            .encode_simple(false, quality)
            .map_err(|e| TranscodeError::Encode(format!("{:?}", e)))?;
        return Ok(encoded.to_vec());
    }

    let mut config = WebPConfig::new()
        .map_err(|_| TranscodeError::Encode("libwebp config init failed".to_string()))?;
    config.lossless = 0;
    config.quality = quality;
    let mut encoder = AnimEncoder::new(width, height, &config);
    let mut timestamp_ms: i32 = 0;
    for frame in &source.frames {
        encoder.add_frame(AnimFrame::from_rgba(
            frame.image.as_raw(),
            width,
            height,
            timestamp_ms,
        ));
        let delay = i32::try_from(frame.delay_ms).unwrap_or(i32::MAX);
        timestamp_ms = timestamp_ms.saturating_add(delay.max(1));
    }
    let encoded = encoder
        .try_encode()
        .map_err(|e| TranscodeError::Encode(format!("{:?}", e)))?;
    Ok(encoded.to_vec())
}
