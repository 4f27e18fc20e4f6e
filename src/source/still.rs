use super::{FrameSource, SourceError};
use crate::frame::Frame;
use crate::image::io::load_frame;
use std::path::Path;

/// Yields a single frame, then reports end of stream.
pub struct StillImageSource {
    frame: Option<Frame>,
    label: String,
}

impl StillImageSource {
    pub fn from_path(path: &Path) -> Result<Self, SourceError> {
        let frame = load_frame(path)?;
        Ok(Self {
            frame: Some(frame),
            label: format!("still image {}", path.display()),
        })
    }

    pub fn from_frame(frame: Frame) -> Self {
        Self {
            frame: Some(frame),
            label: "still frame".to_string(),
        }
    }
}

impl FrameSource for StillImageSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        Ok(self.frame.take())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
