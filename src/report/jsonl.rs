//! Append-only JSON-lines log of defects with a capped image directory.
use super::{DefectEvent, DefectSink, ReportError};
use crate::image::save_frame_png;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const LOG_FILE: &str = "defects.jsonl";
const IMAGE_PREFIX: &str = "defect_";
const IMAGE_EXT: &str = "png";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    /// Saved images kept on disk; `None` uses the performance profile's cap.
    pub max_defect_images: Option<usize>,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("defect_reports"),
            max_defect_images: None,
        }
    }
}

#[derive(Serialize)]
struct LogLine<'a> {
    #[serde(flatten)]
    event: &'a DefectEvent,
    image: Option<String>,
}

pub struct JsonLinesReporter {
    dir: PathBuf,
    writer: BufWriter<File>,
    max_images: usize,
}

impl JsonLinesReporter {
    /// Open (or create) `dir/defects.jsonl` for appending.
    pub fn create(dir: &Path, max_images: usize) -> Result<Self, ReportError> {
        fs::create_dir_all(dir).map_err(|source| ReportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let log_path = dir.join(LOG_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|source| ReportError::Io {
                path: log_path.clone(),
                source,
            })?;
        Ok(Self {
            dir: dir.to_path_buf(),
            writer: BufWriter::new(file),
            max_images,
        })
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }

    fn image_name(event: &DefectEvent) -> String {
        format!(
            "{IMAGE_PREFIX}{}_{:06}.{IMAGE_EXT}",
            event.timestamp.format("%Y%m%dT%H%M%S%.3fZ"),
            event.frame_sequence
        )
    }

    fn save_image(&self, event: &DefectEvent) -> Option<String> {
        let frame = event.frame.as_ref()?;
        let name = Self::image_name(event);
        match save_frame_png(frame, &self.dir.join(&name)) {
            Ok(()) => Some(name),
            Err(err) => {
                warn!("defect image not saved: {err}");
                None
            }
        }
    }

    /// Delete the oldest images until at most `max_images` remain. Names
    /// embed the capture time, so name order is age order. An image that
    /// cannot be removed is skipped; returns how many were removed.
    fn enforce_retention(&self) -> Result<usize, ReportError> {
        let io_err = |source| ReportError::Io {
            path: self.dir.clone(),
            source,
        };
        let mut images: Vec<PathBuf> = fs::read_dir(&self.dir)
            .map_err(io_err)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_defect_image(path))
            .collect();
        if images.len() <= self.max_images {
            return Ok(0);
        }
        images.sort();
        let excess = images.len() - self.max_images;
        let mut removed = 0;
        for path in &images[..excess] {
            match fs::remove_file(path) {
                Ok(()) => {
                    removed += 1;
                    debug!("removed old defect image {}", path.display());
                }
                Err(err) => warn!("cannot remove old defect image {}: {err}", path.display()),
            }
        }
        Ok(removed)
    }
}

fn is_defect_image(path: &Path) -> bool {
    let named = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(IMAGE_PREFIX));
    named && path.extension().is_some_and(|ext| ext == IMAGE_EXT)
}

impl DefectSink for JsonLinesReporter {
    fn record(&mut self, event: &DefectEvent) -> Result<(), ReportError> {
        let image = self.save_image(event);
        if image.is_some() {
            if let Err(err) = self.enforce_retention() {
                warn!("defect image retention skipped: {err}");
            }
        }
        let line = LogLine { event, image };
        serde_json::to_writer(&mut self.writer, &line)?;
        self.writer
            .write_all(b"\n")
            .and_then(|()| self.writer.flush())
            .map_err(|source| ReportError::Io {
                path: self.log_path(),
                source,
            })
    }
}
