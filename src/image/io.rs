//! I/O helpers for frames, binary maps and JSON.
//!
//! - `load_frame`: read a PNG/JPEG/etc. into an owned [`Frame`].
//! - `save_frame_png`: write a frame to disk in its natural color layout.
//! - `save_grayscale_u8`: write an 8-bit view (e.g. an edge map) to a PNG.
//! - `write_json_file`: pretty-print a serializable value to disk.
use super::{ImageU8, ImageView};
use crate::frame::{Frame, PixelFormat};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageIoError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to save {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("frame buffer does not match {width}x{height} {format:?}")]
    Buffer {
        width: usize,
        height: usize,
        format: PixelFormat,
    },
    #[error("failed to serialize JSON for {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Load an image from disk. Grayscale files stay single channel, everything
/// else is converted to RGB.
pub fn load_frame(path: &Path) -> Result<Frame, ImageIoError> {
    let img = image::open(path).map_err(|source| ImageIoError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Frame::from_dynamic_image(img))
}

/// Convert a frame into an `image` buffer. BGR data is swizzled to RGB.
pub fn frame_to_dynamic_image(frame: &Frame) -> Result<DynamicImage, ImageIoError> {
    let (w, h) = (frame.width() as u32, frame.height() as u32);
    let bad_buffer = || ImageIoError::Buffer {
        width: frame.width(),
        height: frame.height(),
        format: frame.format(),
    };
    let needed = frame.expected_len();
    if frame.data().len() < needed {
        return Err(bad_buffer());
    }
    let bytes = &frame.data()[..needed];
    let image = match frame.format() {
        PixelFormat::Gray8 => GrayImage::from_raw(w, h, bytes.to_vec())
            .map(DynamicImage::ImageLuma8),
        PixelFormat::Rgb8 => {
            RgbImage::from_raw(w, h, bytes.to_vec()).map(DynamicImage::ImageRgb8)
        }
        PixelFormat::Bgr8 => {
            let rgb = bytes
                .chunks_exact(3)
                .flat_map(|px| [px[2], px[1], px[0]])
                .collect();
            RgbImage::from_raw(w, h, rgb).map(DynamicImage::ImageRgb8)
        }
        PixelFormat::Rgba8 => {
            RgbaImage::from_raw(w, h, bytes.to_vec()).map(DynamicImage::ImageRgba8)
        }
    };
    image.ok_or_else(bad_buffer)
}

/// Save a frame as an image file; the format follows the file extension.
pub fn save_frame_png(frame: &Frame, path: &Path) -> Result<(), ImageIoError> {
    ensure_parent_dir(path)?;
    frame_to_dynamic_image(frame)?
        .save(path)
        .map_err(|source| ImageIoError::Save {
            path: path.to_path_buf(),
            source,
        })
}

/// Save an 8-bit grayscale view to a PNG.
pub fn save_grayscale_u8(view: &ImageU8<'_>, path: &Path) -> Result<(), ImageIoError> {
    ensure_parent_dir(path)?;
    let mut data = Vec::with_capacity(view.w * view.h);
    for y in 0..view.height() {
        data.extend_from_slice(view.row(y));
    }
    let image = GrayImage::from_raw(view.w as u32, view.h as u32, data).ok_or(
        ImageIoError::Buffer {
            width: view.w,
            height: view.h,
            format: PixelFormat::Gray8,
        },
    )?;
    image.save(path).map_err(|source| ImageIoError::Save {
        path: path.to_path_buf(),
        source,
    })
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), ImageIoError> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value).map_err(|source| ImageIoError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| ImageIoError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn ensure_parent_dir(path: &Path) -> Result<(), ImageIoError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| ImageIoError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    Ok(())
}
