use super::{FrameSource, SourceError};
use crate::frame::Frame;
use chrono::Utc;
use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

/// Plays back in-memory frames, optionally paced, then ends the stream.
///
/// Each frame is re-stamped with the time it is handed out.
pub struct ReplaySource {
    frames: VecDeque<Frame>,
    delay: Option<Duration>,
    emitted: usize,
}

impl ReplaySource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            delay: None,
            emitted: 0,
        }
    }

    /// Sleep `delay` before every frame.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for ReplaySource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        if self.frames.is_empty() {
            return Ok(None);
        }
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        let frame = self.frames.pop_front().map(|f| f.with_timestamp(Utc::now()));
        self.emitted += usize::from(frame.is_some());
        Ok(frame)
    }

    fn describe(&self) -> String {
        format!(
            "replay ({} played, {} left)",
            self.emitted,
            self.frames.len()
        )
    }
}
