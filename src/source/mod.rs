//! Frame sources feeding the capture thread.
//!
//! A source hands out frames one at a time. `Ok(None)` marks the end of a
//! finite stream (a still image, a recorded sequence, a video file); a
//! timeout or a lost live device is transient and the capture thread
//! retries it, reopening the source after repeated failures. Sources do not
//! number frames; the capture thread does. The capture thread owns its
//! source, so dropping the thread's state releases any device or subprocess
//! behind it.

pub mod ffmpeg;
pub mod replay;
pub mod sequence;
pub mod still;

pub use ffmpeg::{FfmpegConfig, FfmpegSource};
pub use replay::ReplaySource;
pub use sequence::ImageSequenceSource;
pub use still::StillImageSource;

use crate::frame::Frame;
use crate::image::ImageIoError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no frame within {0:?}")]
    Timeout(Duration),
    #[error("failed to open video source {uri:?}: {reason}")]
    Open { uri: String, reason: String },
    #[error(transparent)]
    Decode(#[from] ImageIoError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0} stopped delivering frames")]
    Disconnected(String),
    #[error("decoder for {uri:?} exited with {status}")]
    Exited { uri: String, status: String },
    #[error("{0} cannot be reopened")]
    ReopenUnsupported(String),
}

impl SourceError {
    /// Errors the capture thread may retry, reopening the source after
    /// repeated failures.
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Timeout(_) | SourceError::Disconnected(_))
    }
}

pub trait FrameSource: Send {
    /// Next frame, `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;

    /// Human-readable description for logs and status events.
    fn describe(&self) -> String;

    /// Release and re-acquire the underlying device after repeated failures.
    fn reopen(&mut self) -> Result<(), SourceError> {
        Err(SourceError::ReopenUnsupported(self.describe()))
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        (**self).next_frame()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    fn reopen(&mut self) -> Result<(), SourceError> {
        (**self).reopen()
    }
}

/// Where frames come from, as written in the application config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// One image file, processed once.
    Still { path: PathBuf },
    /// Every image in a directory, in file-name order.
    Sequence {
        dir: PathBuf,
        #[serde(default)]
        frame_interval_ms: Option<u64>,
    },
    /// Camera device or video file decoded by `ffmpeg`.
    Ffmpeg(FfmpegConfig),
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Ffmpeg(FfmpegConfig::default())
    }
}

/// Open the configured source.
pub fn open_source(config: &SourceConfig) -> Result<Box<dyn FrameSource>, SourceError> {
    Ok(match config {
        SourceConfig::Still { path } => Box::new(StillImageSource::from_path(path)?),
        SourceConfig::Sequence {
            dir,
            frame_interval_ms,
        } => Box::new(ImageSequenceSource::from_dir(
            dir,
            frame_interval_ms.map(Duration::from_millis),
        )?),
        SourceConfig::Ffmpeg(cfg) => Box::new(FfmpegSource::spawn(cfg.clone())?),
    })
}
