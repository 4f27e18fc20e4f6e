//! Capture/processing pipeline connecting a frame source to the detector,
//! the reject actuator and the defect reporter.

pub mod actuator;
pub mod config;
pub mod events;
pub mod runner;
pub mod slot;
pub mod snapshot;

pub use actuator::{NoActuator, RejectActuator};
pub use config::PipelineConfig;
pub use events::{
    DecisionUpdate, PipelineEvent, PipelineState, PipelineStats, PipelineStatus, StatsSnapshot,
    StopReason,
};
pub use runner::{Pipeline, PipelineError};
pub use slot::LatestSlot;
pub use snapshot::{InspectionSnapshot, SnapshotCell};
