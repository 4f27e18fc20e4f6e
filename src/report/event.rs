use crate::angle::ClassReason;
use crate::detector::{Decision, DecisionKind};
use crate::frame::Frame;
use crate::relay::TriggerOutcome;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Record of one rejected board.
///
/// The angle always comes from the frame identified by `frame_sequence`;
/// `frame` is that same buffer when the capture budget allowed attaching it.
#[derive(Clone, Debug, Serialize)]
pub struct DefectEvent {
    /// Capture time of the frame that produced the decision.
    pub timestamp: DateTime<Utc>,
    pub frame_sequence: u64,
    pub angle_deg: f32,
    pub deviation_deg: Option<f32>,
    pub kind: DecisionKind,
    pub reason: Option<ClassReason>,
    pub relay: TriggerOutcome,
    #[serde(skip)]
    pub frame: Option<Arc<Frame>>,
}

impl DefectEvent {
    /// Build the event for a misaligned decision; other outcomes yield `None`.
    pub fn from_decision(
        frame: &Arc<Frame>,
        decision: &Decision,
        relay: TriggerOutcome,
        attach_frame: bool,
    ) -> Option<Self> {
        if !decision.is_misaligned() {
            return None;
        }
        let angle_deg = decision.angle_deg?;
        Some(Self {
            timestamp: frame.timestamp(),
            frame_sequence: frame.sequence(),
            angle_deg,
            deviation_deg: decision.deviation_deg,
            kind: decision.kind,
            reason: decision.reason,
            relay,
            frame: attach_frame.then(|| Arc::clone(frame)),
        })
    }

    pub fn has_frame(&self) -> bool {
        self.frame.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::angle::{Alignment, AngleClass};
    use crate::frame::PixelFormat;

    fn frame() -> Arc<Frame> {
        Arc::new(Frame::new(2, 2, PixelFormat::Gray8, vec![0; 4]).with_sequence(42))
    }

    #[test]
    fn only_misaligned_decisions_become_events() {
        let frame = frame();
        let aligned = Decision::classified(
            90.0,
            0.0,
            AngleClass {
                alignment: Alignment::Aligned,
                reason: ClassReason::WithinTolerance,
            },
            Vec::new(),
            1.0,
        );
        let none = Decision::no_signal(Vec::new(), 1.0);
        for decision in [&aligned, &none] {
            let event = DefectEvent::from_decision(&frame, decision, TriggerOutcome::Fired, true);
            assert!(event.is_none());
        }
    }

    #[test]
    fn event_carries_frame_identity_and_relay_outcome() {
        let frame = frame();
        let decision = Decision::classified(
            97.0,
            7.0,
            AngleClass {
                alignment: Alignment::Misaligned,
                reason: ClassReason::DefectBand,
            },
            Vec::new(),
            1.0,
        );
        let event =
            DefectEvent::from_decision(&frame, &decision, TriggerOutcome::NotReady, false).unwrap();
        assert_eq!(event.frame_sequence, 42);
        assert_eq!(event.timestamp, frame.timestamp());
        assert_eq!(event.angle_deg, 97.0);
        assert!(!event.has_frame());

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "misaligned");
        assert_eq!(json["relay"]["outcome"], "not_ready");
        assert!(json.get("frame").is_none());
    }
}
