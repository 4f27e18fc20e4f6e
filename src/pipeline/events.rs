use crate::detector::{Decision, DecisionKind};
use crate::frame::Frame;
use crate::relay::{RelayConnectionState, TriggerOutcome};
use crossbeam_channel::{Sender, TrySendError};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Stopped,
    Running,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Requested,
    SourceExhausted,
    SourceLost(String),
}

/// Non-decision conditions reported to the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    SourceTimeout { consecutive: u32 },
    SourceReopened,
    SourceExhausted,
    SourceLost(String),
    InvalidFrame(String),
}

/// One processed frame, shared unmodified with the presentation layer.
#[derive(Clone, Debug)]
pub struct DecisionUpdate {
    pub frame: Arc<Frame>,
    pub decision: Decision,
    /// Outcome of the reject pulse, present for misaligned boards.
    pub relay: Option<TriggerOutcome>,
    pub relay_state: RelayConnectionState,
}

#[derive(Clone, Debug)]
pub enum PipelineEvent {
    Started { source: String },
    Decision(DecisionUpdate),
    Status(PipelineStatus),
    Stopped { reason: StopReason },
}

/// Counters shared by the pipeline threads.
#[derive(Debug, Default)]
pub struct PipelineStats {
    frames_captured: AtomicU64,
    frames_dropped: AtomicU64,
    cycles: AtomicU64,
    aligned: AtomicU64,
    misaligned: AtomicU64,
    no_signal: AtomicU64,
    invalid_frames: AtomicU64,
    source_timeouts: AtomicU64,
    rejects_fired: AtomicU64,
    defects_sent: AtomicU64,
    events_dropped: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub frames_captured: u64,
    pub frames_dropped: u64,
    pub cycles: u64,
    pub aligned: u64,
    pub misaligned: u64,
    pub no_signal: u64,
    pub invalid_frames: u64,
    pub source_timeouts: u64,
    pub rejects_fired: u64,
    pub defects_sent: u64,
    pub events_dropped: u64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl PipelineStats {
    pub(crate) fn frame_captured(&self, replaced_stale: bool) {
        bump(&self.frames_captured);
        if replaced_stale {
            bump(&self.frames_dropped);
        }
    }

    pub(crate) fn cycle(&self) {
        bump(&self.cycles);
    }

    pub(crate) fn decision(&self, kind: DecisionKind) {
        bump(match kind {
            DecisionKind::Aligned => &self.aligned,
            DecisionKind::Misaligned => &self.misaligned,
            DecisionKind::NoSignal => &self.no_signal,
        });
    }

    pub(crate) fn invalid_frame(&self) {
        bump(&self.invalid_frames);
    }

    pub(crate) fn source_timeout(&self) {
        bump(&self.source_timeouts);
    }

    pub(crate) fn reject_fired(&self) {
        bump(&self.rejects_fired);
    }

    pub(crate) fn defect_sent(&self) {
        bump(&self.defects_sent);
    }

    pub(crate) fn event_dropped(&self) {
        bump(&self.events_dropped);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            frames_captured: get(&self.frames_captured),
            frames_dropped: get(&self.frames_dropped),
            cycles: get(&self.cycles),
            aligned: get(&self.aligned),
            misaligned: get(&self.misaligned),
            no_signal: get(&self.no_signal),
            invalid_frames: get(&self.invalid_frames),
            source_timeouts: get(&self.source_timeouts),
            rejects_fired: get(&self.rejects_fired),
            defects_sent: get(&self.defects_sent),
            events_dropped: get(&self.events_dropped),
        }
    }
}

/// Non-blocking event publisher; a full channel drops the event.
#[derive(Clone)]
pub(crate) struct EventPublisher {
    tx: Sender<PipelineEvent>,
    stats: Arc<PipelineStats>,
}

impl EventPublisher {
    pub(crate) fn new(tx: Sender<PipelineEvent>, stats: Arc<PipelineStats>) -> Self {
        Self { tx, stats }
    }

    pub(crate) fn publish(&self, event: PipelineEvent) {
        match self.tx.try_send(event) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(_)) => self.stats.event_dropped(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn full_channel_counts_dropped_events() {
        let stats = Arc::new(PipelineStats::default());
        let (tx, rx) = bounded(1);
        let publisher = EventPublisher::new(tx, Arc::clone(&stats));
        publisher.publish(PipelineEvent::Status(PipelineStatus::SourceReopened));
        publisher.publish(PipelineEvent::Status(PipelineStatus::SourceExhausted));
        assert_eq!(stats.snapshot().events_dropped, 1);
        assert!(matches!(
            rx.try_recv(),
            Ok(PipelineEvent::Status(PipelineStatus::SourceReopened))
        ));
    }
}
