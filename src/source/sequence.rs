use super::{FrameSource, SourceError};
use crate::frame::Frame;
use crate::image::io::load_frame;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Recorded run: every image file in a directory, in file-name order.
///
/// Files that fail to decode are skipped with a warning rather than ending
/// the run.
pub struct ImageSequenceSource {
    dir: PathBuf,
    paths: Vec<PathBuf>,
    next: usize,
    interval: Option<Duration>,
    last_emit: Option<Instant>,
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

impl ImageSequenceSource {
    pub fn from_dir(dir: &Path, interval: Option<Duration>) -> Result<Self, SourceError> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|err| SourceError::Open {
                uri: dir.display().to_string(),
                reason: err.to_string(),
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_image(p))
            .collect();
        paths.sort();
        debug!("{} images in {}", paths.len(), dir.display());
        Ok(Self::from_paths(dir.to_path_buf(), paths, interval))
    }

    pub fn from_paths(dir: PathBuf, paths: Vec<PathBuf>, interval: Option<Duration>) -> Self {
        Self {
            dir,
            paths,
            next: 0,
            interval,
            last_emit: None,
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn pace(&mut self) {
        if let (Some(interval), Some(last)) = (self.interval, self.last_emit) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            }
        }
        self.last_emit = Some(Instant::now());
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        while let Some(path) = self.paths.get(self.next) {
            self.next += 1;
            match load_frame(path) {
                Ok(frame) => {
                    self.pace();
                    return Ok(Some(frame));
                }
                Err(err) => warn!("skipping {}: {err}", path.display()),
            }
        }
        Ok(None)
    }

    fn describe(&self) -> String {
        format!(
            "image sequence {} ({}/{})",
            self.dir.display(),
            self.next,
            self.paths.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;
    use crate::image::io::save_frame_png;

    #[test]
    fn frames_come_in_name_order_and_skip_other_files() {
        let dir = tempfile::tempdir().unwrap();
        for (name, value) in [("b.png", 20u8), ("a.png", 10u8), ("c.png", 30u8)] {
            let frame = Frame::new(3, 2, PixelFormat::Gray8, vec![value; 6]);
            save_frame_png(&frame, &dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "not an image").unwrap();
        fs::write(dir.path().join("broken.png"), "garbage").unwrap();

        let mut source = ImageSequenceSource::from_dir(dir.path(), None).unwrap();
        assert_eq!(source.len(), 4);
        let mut seen = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            seen.push(frame.data()[0]);
        }
        assert_eq!(seen, vec![10, 20, 30]);
    }

    #[test]
    fn missing_directory_is_an_open_error() {
        let err = ImageSequenceSource::from_dir(Path::new("/definitely/not/here"), None)
            .err()
            .unwrap();
        assert!(matches!(err, SourceError::Open { .. }));
    }
}
