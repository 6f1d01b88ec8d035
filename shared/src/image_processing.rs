use std::fmt::{self, Write as _};
use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime};
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageReader, Limits, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::{
    ValidatedCoordinate, COORDINATE_DECIMALS, MAX_FRAME_ALLOC, MAX_FRAME_BYTES,
    MAX_FRAME_DIMENSION,
};

const GLYPH_SIZE: u32 = 8;
const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const SHADOW_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%d/%m/%Y, %H:%M:%S";
pub const MAX_GLYPH_SCALE: u32 = 8;

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("failed to decode frame: {source}")]
    Decode {
        #[from]
        source: image::ImageError,
    },

    #[error("frame bytes empty")]
    EmptyInput,

    #[error("frame too large: {size} bytes, max {max_size}")]
    InputTooLarge { size: usize, max_size: usize },

    #[error("unsupported frame format")]
    UnsupportedFormat,

    #[error("frame dimensions {width}x{height} exceed {max}px")]
    FrameTooLarge { width: u32, height: u32, max: u32 },

    #[error("frame has a zero dimension")]
    ZeroDimension,

    #[error("pixel buffer holds {actual} bytes, {width}x{height} RGBA needs {expected}")]
    BufferMismatch {
        width: u32,
        height: u32,
        expected: u64,
        actual: u64,
    },

    #[error("invalid timestamp format: {0:?}")]
    InvalidTimestampFormat(String),

    #[error("glyph scale {0} outside 1..={MAX_GLYPH_SCALE}")]
    InvalidScale(u32),

    #[error("png encoding failed: {reason}")]
    Encode { reason: String },
}

/// A still handed over by the shell, either as raw canvas pixels or as an
/// encoded image from a native camera API.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum FrameData {
    Rgba {
        width: u32,
        height: u32,
        #[serde(with = "serde_bytes")]
        pixels: Vec<u8>,
    },
    Encoded {
        #[serde(with = "serde_bytes")]
        bytes: Vec<u8>,
    },
}

impl fmt::Debug for FrameData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rgba {
                width,
                height,
                pixels,
            } => f
                .debug_struct("Rgba")
                .field("width", width)
                .field("height", height)
                .field("bytes", &pixels.len())
                .finish(),
            Self::Encoded { bytes } => f
                .debug_struct("Encoded")
                .field("bytes", &bytes.len())
                .finish(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WatermarkConfig {
    pub glyph_scale: u32,
    pub margin_px: u32,
    pub line_gap_px: u32,
    pub shadow_offset_px: u32,
    pub timestamp_format: String,
    pub max_input_bytes: usize,
    pub max_dimension: u32,
    pub max_alloc_bytes: u64,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            glyph_scale: 2,
            margin_px: 20,
            line_gap_px: 14,
            shadow_offset_px: 2,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            max_input_bytes: MAX_FRAME_BYTES,
            max_dimension: MAX_FRAME_DIMENSION,
            max_alloc_bytes: MAX_FRAME_ALLOC,
        }
    }
}

impl WatermarkConfig {
    pub fn validate(&self) -> Result<(), WatermarkError> {
        if !(1..=MAX_GLYPH_SCALE).contains(&self.glyph_scale) {
            return Err(WatermarkError::InvalidScale(self.glyph_scale));
        }
        validate_timestamp_format(&self.timestamp_format)
    }
}

/// Rejects formats chrono cannot parse and formats that need data a
/// `NaiveDateTime` lacks, such as `%z` or `%Z`.
fn validate_timestamp_format(format: &str) -> Result<(), WatermarkError> {
    let invalid = || WatermarkError::InvalidTimestampFormat(format.to_string());
    if format.trim().is_empty()
        || StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
    {
        return Err(invalid());
    }

    let sample = NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(invalid)?;
    let mut rendered = String::new();
    write!(rendered, "{}", sample.format(format)).map_err(|_| invalid())
}

/// The two overlay lines burned into a capture, top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    timestamp: String,
    location: String,
}

impl Watermark {
    pub fn new(
        taken_at: NaiveDateTime,
        coord: ValidatedCoordinate,
        timestamp_format: &str,
    ) -> Result<Self, WatermarkError> {
        validate_timestamp_format(timestamp_format)?;

        let mut timestamp = String::new();
        write!(timestamp, "{}", taken_at.format(timestamp_format))
            .map_err(|_| WatermarkError::InvalidTimestampFormat(timestamp_format.to_string()))?;

        Ok(Self {
            timestamp,
            location: overlay_location_text(coord),
        })
    }

    #[must_use]
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }
}

/// `"Lat: 12.970000, Lng: 77.590000"`
#[must_use]
pub fn overlay_location_text(coord: ValidatedCoordinate) -> String {
    format!(
        "Lat: {:.prec$}, Lng: {:.prec$}",
        coord.lat(),
        coord.lng(),
        prec = COORDINATE_DECIMALS
    )
}

/// Encoded watermarked still, kept as the data URL that goes out in `imageUrl`.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapturedPhoto {
    data_url: String,
    width: u32,
    height: u32,
    byte_len: usize,
}

impl CapturedPhoto {
    fn from_png(png: &[u8], width: u32, height: u32) -> Self {
        Self {
            data_url: format!("data:image/png;base64,{}", BASE64.encode(png)),
            width,
            height,
            byte_len: png.len(),
        }
    }

    #[must_use]
    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub const fn byte_len(&self) -> usize {
        self.byte_len
    }
}

impl fmt::Debug for CapturedPhoto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedPhoto")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("byte_len", &self.byte_len)
            .finish_non_exhaustive()
    }
}

/// Decodes the frame, burns the overlay in and encodes the result as PNG.
///
/// The frame is consumed; only the stamped image survives.
#[instrument(skip(config, frame, mark))]
pub fn render_capture(
    config: &WatermarkConfig,
    frame: FrameData,
    mark: &Watermark,
) -> Result<CapturedPhoto, WatermarkError> {
    let still = decode_frame(config, frame)?;
    let (width, height) = still.dimensions();
    let stamped = burn_watermark(still, mark, config);
    let png = encode_png(&stamped)?;
    debug!(width, height, bytes = png.len(), "watermarked still encoded");
    Ok(CapturedPhoto::from_png(&png, width, height))
}

pub fn decode_frame(
    config: &WatermarkConfig,
    frame: FrameData,
) -> Result<RgbaImage, WatermarkError> {
    match frame {
        FrameData::Rgba {
            width,
            height,
            pixels,
        } => {
            check_dimensions(config, width, height)?;
            let expected = u64::from(width) * u64::from(height) * 4;
            let actual = pixels.len() as u64;
            if expected != actual {
                return Err(WatermarkError::BufferMismatch {
                    width,
                    height,
                    expected,
                    actual,
                });
            }
            RgbaImage::from_raw(width, height, pixels).ok_or(WatermarkError::BufferMismatch {
                width,
                height,
                expected,
                actual,
            })
        }
        FrameData::Encoded { bytes } => decode_encoded(config, &bytes),
    }
}

fn check_dimensions(
    config: &WatermarkConfig,
    width: u32,
    height: u32,
) -> Result<(), WatermarkError> {
    if width == 0 || height == 0 {
        return Err(WatermarkError::ZeroDimension);
    }
    if width > config.max_dimension || height > config.max_dimension {
        return Err(WatermarkError::FrameTooLarge {
            width,
            height,
            max: config.max_dimension,
        });
    }
    Ok(())
}

fn decode_encoded(config: &WatermarkConfig, bytes: &[u8]) -> Result<RgbaImage, WatermarkError> {
    if bytes.is_empty() {
        return Err(WatermarkError::EmptyInput);
    }

    if bytes.len() > config.max_input_bytes {
        return Err(WatermarkError::InputTooLarge {
            size: bytes.len(),
            max_size: config.max_input_bytes,
        });
    }

    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| WatermarkError::Decode { source: e.into() })?;

    if reader.format().is_none() {
        return Err(WatermarkError::UnsupportedFormat);
    }

    let mut limits = Limits::default();
    limits.max_image_width = Some(config.max_dimension);
    limits.max_image_height = Some(config.max_dimension);
    limits.max_alloc = Some(config.max_alloc_bytes);
    reader.limits(limits);

    let image = reader.decode()?.into_rgba8();
    let (width, height) = image.dimensions();
    check_dimensions(config, width, height)?;
    Ok(image)
}

/// Writes the timestamp and location lines into the bottom-right corner,
/// right-aligned, white over a dark drop shadow.
#[must_use]
pub fn burn_watermark(
    mut frame: RgbaImage,
    mark: &Watermark,
    config: &WatermarkConfig,
) -> RgbaImage {
    let (width, height) = frame.dimensions();
    let scale = config.glyph_scale.clamp(1, MAX_GLYPH_SCALE);
    let line_height = i64::from(GLYPH_SIZE * scale);
    let margin = i64::from(config.margin_px);
    let shadow = i64::from(config.shadow_offset_px);

    let location_top = i64::from(height) - margin - line_height;
    let timestamp_top = location_top - line_height - i64::from(config.line_gap_px);

    for (text, top) in [
        (mark.timestamp(), timestamp_top),
        (mark.location(), location_top),
    ] {
        let left = i64::from(width) - margin - i64::from(text_width(text, scale));
        if shadow > 0 {
            draw_text(&mut frame, (left + shadow, top + shadow), text, scale, SHADOW_COLOR);
        }
        draw_text(&mut frame, (left, top), text, scale, TEXT_COLOR);
    }

    frame
}

#[must_use]
pub fn text_width(text: &str, scale: u32) -> u32 {
    u32::try_from(text.chars().count())
        .unwrap_or(u32::MAX)
        .saturating_mul(GLYPH_SIZE * scale)
}

fn glyph(ch: char) -> [u8; 8] {
    BASIC_FONTS
        .get(ch)
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

// Each glyph row is a bitmask with bit 0 as the leftmost pixel.
fn draw_text(image: &mut RgbaImage, origin: (i64, i64), text: &str, scale: u32, color: Rgba<u8>) {
    let (width, height) = image.dimensions();
    let scale = i64::from(scale);
    let advance = i64::from(GLYPH_SIZE) * scale;

    for (index, ch) in text.chars().enumerate() {
        let left = origin.0 + advance * i64::try_from(index).unwrap_or(i64::MAX / advance);
        for (row, bits) in (0_i64..).zip(glyph(ch)) {
            for col in 0..8_u8 {
                if (bits >> col) & 1 == 0 {
                    continue;
                }
                let x0 = left + i64::from(col) * scale;
                let y0 = origin.1 + row * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        let (Ok(x), Ok(y)) = (u32::try_from(x0 + dx), u32::try_from(y0 + dy))
                        else {
                            continue;
                        };
                        if x < width && y < height {
                            image.put_pixel(x, y, color);
                        }
                    }
                }
            }
        }
    }
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, WatermarkError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(WatermarkError::ZeroDimension);
    }

    let mut buffer = Vec::new();
    PngEncoder::new(&mut buffer)
        .write_image(image.as_raw(), width, height, ExtendedColorType::Rgba8)
        .map_err(|e| WatermarkError::Encode {
            reason: e.to_string(),
        })?;

    Ok(buffer)
}
