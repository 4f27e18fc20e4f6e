//! Defect reporting: the events the pipeline emits for rejected boards and
//! the sinks that persist them.
//!
//! Events travel over an unbounded channel to a reporter thread and are
//! never dropped; only frame attachments are rationed by [`CaptureBudget`].

pub mod budget;
pub mod event;
pub mod jsonl;

pub use budget::CaptureBudget;
pub use event::DefectEvent;
pub use jsonl::{JsonLinesReporter, ReporterConfig};

use crate::image::ImageIoError;
use crossbeam_channel::{unbounded, Sender};
use log::{debug, error};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Image(#[from] ImageIoError),
    #[error("failed to encode defect record: {0}")]
    Json(#[from] serde_json::Error),
}

/// Destination of defect records.
pub trait DefectSink: Send {
    fn record(&mut self, event: &DefectEvent) -> Result<(), ReportError>;
}

/// Sink that only logs, used when persistence is disabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl DefectSink for LogSink {
    fn record(&mut self, event: &DefectEvent) -> Result<(), ReportError> {
        log::info!(
            "defect: frame {} angle {:.2} relay {:?}",
            event.frame_sequence,
            event.angle_deg,
            event.relay
        );
        Ok(())
    }
}

/// Run `sink` on a reporter thread. The thread exits once every sender
/// is dropped and the queue is drained.
pub fn spawn_reporter<S>(mut sink: S) -> std::io::Result<(Sender<DefectEvent>, JoinHandle<()>)>
where
    S: DefectSink + 'static,
{
    let (tx, rx) = unbounded::<DefectEvent>();
    let handle = thread::Builder::new()
        .name("defect-reporter".to_string())
        .spawn(move || {
            for event in rx {
                if let Err(err) = sink.record(&event) {
                    error!("defect record for frame {} failed: {err}", event.frame_sequence);
                }
            }
            debug!("defect reporter stopped");
        })?;
    Ok((tx, handle))
}
