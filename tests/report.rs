mod common;

use board_align::detector::DecisionKind;
use board_align::relay::TriggerOutcome;
use board_align::report::{
    spawn_reporter, DefectEvent, DefectSink, JsonLinesReporter, ReportError,
};
use chrono::Utc;
use common::synthetic_frames::edge_frame;
use std::fs;
use std::sync::{Arc, Mutex};

fn defect(seq: u64, attach: bool) -> DefectEvent {
    let frame = Arc::new(edge_frame(98.0).with_sequence(seq));
    DefectEvent {
        timestamp: Utc::now(),
        frame_sequence: seq,
        angle_deg: 98.0,
        deviation_deg: Some(8.0),
        kind: DecisionKind::Misaligned,
        reason: None,
        relay: TriggerOutcome::NotReady,
        frame: attach.then_some(frame),
    }
}

struct Collecting(Arc<Mutex<Vec<u64>>>);

impl DefectSink for Collecting {
    fn record(&mut self, event: &DefectEvent) -> Result<(), ReportError> {
        self.0.lock().unwrap().push(event.frame_sequence);
        Ok(())
    }
}

#[test]
fn reporter_thread_records_every_event_in_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (tx, handle) = spawn_reporter(Collecting(Arc::clone(&seen))).unwrap();
    for seq in 0..100 {
        tx.send(defect(seq, false)).unwrap();
    }
    drop(tx);
    handle.join().unwrap();
    assert_eq!(*seen.lock().unwrap(), (0..100).collect::<Vec<u64>>());
}

#[test]
fn json_lines_reporter_keeps_newest_images() {
    common::init_logging();
    let dir = tempfile::tempdir().unwrap();
    let reporter = JsonLinesReporter::create(dir.path(), 2).unwrap();
    let log_path = reporter.log_path();
    let (tx, handle) = spawn_reporter(reporter).unwrap();
    for seq in 0..4 {
        tx.send(defect(seq, true)).unwrap();
    }
    tx.send(defect(4, false)).unwrap();
    drop(tx);
    handle.join().unwrap();

    let mut images: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("defect_") && name.ends_with(".png"))
        .collect();
    images.sort();
    assert_eq!(images.len(), 2, "{images:?}");
    assert!(images[0].ends_with("_000002.png"));
    assert!(images[1].ends_with("_000003.png"));

    let log = fs::read_to_string(log_path).unwrap();
    let records: Vec<serde_json::Value> = log
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 5);
    assert_eq!(records[4]["frame_sequence"], 4);
    assert!(records[4]["image"].is_null());
    assert_eq!(records[3]["relay"]["outcome"], "not_ready");
}
