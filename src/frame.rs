//! Owned video frames as delivered by a [`FrameSource`](crate::source::FrameSource).
//!
//! A frame is never mutated after capture. The pipeline wraps it in an
//! `Arc` so the processing thread and the presentation layer look at the
//! same buffer.

use crate::image::ImageF32;
use crate::roi::PixelBounds;
use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Packed 8-bit pixel layouts understood by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Gray8,
    Bgr8,
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    #[inline]
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Bgr8 | PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }

    /// BT.601 luma of one packed pixel on a 0..255 scale.
    #[inline]
    fn luma(self, px: &[u8]) -> f32 {
        let (r, g, b) = match self {
            PixelFormat::Gray8 => return px[0] as f32,
            PixelFormat::Bgr8 => (px[2], px[1], px[0]),
            PixelFormat::Rgb8 | PixelFormat::Rgba8 => (px[0], px[1], px[2]),
        };
        0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
    }
}

#[derive(Clone, Debug)]
pub struct Frame {
    width: usize,
    height: usize,
    format: PixelFormat,
    data: Vec<u8>,
    timestamp: DateTime<Utc>,
    sequence: u64,
}

impl Frame {
    /// Wrap a packed buffer, stamping it with the current time.
    ///
    /// The buffer is not checked here; [`Frame::is_valid`] reports whether
    /// it covers `width × height × channels` bytes.
    pub fn new(width: usize, height: usize, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format,
            data,
            timestamp: Utc::now(),
            sequence: 0,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Convert a decoded image. Luma images stay single channel.
    pub fn from_dynamic_image(img: DynamicImage) -> Self {
        let (width, height) = (img.width() as usize, img.height() as usize);
        match img {
            DynamicImage::ImageLuma8(gray) => {
                Self::new(width, height, PixelFormat::Gray8, gray.into_raw())
            }
            other if !other.color().has_color() => {
                Self::new(width, height, PixelFormat::Gray8, other.into_luma8().into_raw())
            }
            other => Self::new(width, height, PixelFormat::Rgb8, other.into_rgb8().into_raw()),
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Bytes needed to hold every pixel of the frame.
    #[inline]
    pub fn expected_len(&self) -> usize {
        self.width * self.height * self.channels()
    }

    /// Non-empty dimensions and a buffer that covers them.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() >= self.expected_len()
    }

    /// Luminance of the pixels inside `bounds`, as a new float image.
    ///
    /// `bounds` must lie inside the frame and the frame must be valid.
    pub fn luma_crop(&self, bounds: &PixelBounds) -> ImageF32 {
        let channels = self.channels();
        let row_bytes = self.width * channels;
        let mut out = ImageF32::new(bounds.width(), bounds.height());
        for (dst_y, y) in (bounds.y0..bounds.y1).enumerate() {
            let start = y * row_bytes + bounds.x0 * channels;
            let end = y * row_bytes + bounds.x1 * channels;
            let src = &self.data[start..end];
            let dst = &mut out.data[dst_y * out.stride..dst_y * out.stride + out.w];
            for (value, px) in dst.iter_mut().zip(src.chunks_exact(channels)) {
                *value = self.format.luma(px);
            }
        }
        out
    }
}
