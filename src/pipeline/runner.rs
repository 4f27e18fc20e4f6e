//! Capture and processing threads.
//!
//! The capture thread pulls frames as fast as the source delivers them and
//! drops each into a [`LatestSlot`]. The processing thread wakes on a
//! deadline every `detection_interval`, takes whatever frame is newest and
//! runs one detection cycle on it. Neither thread waits for the other.
use super::actuator::RejectActuator;
use super::config::PipelineConfig;
use super::events::{
    DecisionUpdate, EventPublisher, PipelineEvent, PipelineState, PipelineStats, PipelineStatus,
    StatsSnapshot, StopReason,
};
use super::slot::LatestSlot;
use super::snapshot::{InspectionSnapshot, SnapshotCell};
use crate::detector::{detect, Decision, DetectionSettings, PerformanceProfile, SettingsError};
use crate::frame::Frame;
use crate::relay::TriggerOutcome;
use crate::report::{CaptureBudget, DefectEvent};
use crate::roi::RegionOfInterest;
use crate::source::FrameSource;
use crossbeam_channel::{after, at, bounded, select, Receiver, Sender};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("invalid pipeline configuration: {0}")]
    Config(String),
    #[error("failed to spawn pipeline thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// How the capture thread ended.
#[derive(Debug)]
enum CaptureEnd {
    Stopped,
    Exhausted,
    Lost(String),
}

struct Workers {
    stop_tx: Sender<()>,
    capture: JoinHandle<()>,
    processing: JoinHandle<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn join_worker(name: &str, handle: JoinHandle<()>) {
    if handle.join().is_err() {
        error!("{name} thread panicked");
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    snapshot: Arc<SnapshotCell>,
    actuator: Arc<dyn RejectActuator>,
    defects: Sender<DefectEvent>,
    events_rx: Receiver<PipelineEvent>,
    publisher: EventPublisher,
    stats: Arc<PipelineStats>,
    running: Arc<AtomicBool>,
    /// Last frame number handed out; survives source reopens and restarts.
    sequence: Arc<AtomicU64>,
    workers: Mutex<Option<Workers>>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        settings: DetectionSettings,
        actuator: Arc<dyn RejectActuator>,
        defects: Sender<DefectEvent>,
    ) -> Result<Self, PipelineError> {
        config.validate().map_err(PipelineError::Config)?;
        settings.validate()?;
        let stats = Arc::new(PipelineStats::default());
        let (events_tx, events_rx) = bounded(config.event_capacity);
        Ok(Self {
            snapshot: Arc::new(SnapshotCell::new(InspectionSnapshot {
                roi: RegionOfInterest::None,
                settings,
            })),
            actuator,
            defects,
            events_rx,
            publisher: EventPublisher::new(events_tx, Arc::clone(&stats)),
            stats,
            running: Arc::new(AtomicBool::new(false)),
            sequence: Arc::new(AtomicU64::new(0)),
            workers: Mutex::new(None),
            config,
        })
    }

    /// Spawn the capture and processing threads over `source`.
    pub fn start(&self, source: Box<dyn FrameSource>) -> Result<(), PipelineError> {
        let mut workers = lock(&self.workers);
        if self.running.load(Ordering::Acquire) {
            return Err(PipelineError::AlreadyRunning);
        }
        // Threads of a run that ended on its own are still waiting to be joined.
        if let Some(old) = workers.take() {
            drop(old.stop_tx);
            join_worker("capture", old.capture);
            join_worker("processing", old.processing);
        }

        let description = source.describe();
        let slot = Arc::new(LatestSlot::new());
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let (end_tx, end_rx) = bounded::<CaptureEnd>(1);
        self.running.store(true, Ordering::Release);

        let capture = CaptureLoop {
            source,
            slot: Arc::clone(&slot),
            stats: Arc::clone(&self.stats),
            publisher: self.publisher.clone(),
            running: Arc::clone(&self.running),
            sequence: Arc::clone(&self.sequence),
            stop_rx: stop_rx.clone(),
            config: self.config.clone(),
        };
        let capture = thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || {
                let end = capture.run();
                let _ = end_tx.send(end);
            });
        let capture = match capture {
            Ok(handle) => handle,
            Err(err) => {
                self.running.store(false, Ordering::Release);
                return Err(err.into());
            }
        };

        let processing = ProcessingLoop {
            slot,
            snapshot: Arc::clone(&self.snapshot),
            actuator: Arc::clone(&self.actuator),
            defects: self.defects.clone(),
            publisher: self.publisher.clone(),
            stats: Arc::clone(&self.stats),
            running: Arc::clone(&self.running),
            stop_rx,
            end_rx,
            budget: CaptureBudget::new(
                self.config
                    .max_captures_per_second
                    .unwrap_or_else(|| PerformanceProfile::default().max_captures_per_second()),
            ),
            config: self.config.clone(),
        };
        let processing = thread::Builder::new()
            .name("processing".to_string())
            .spawn(move || processing.run());
        let processing = match processing {
            Ok(handle) => handle,
            Err(err) => {
                self.running.store(false, Ordering::Release);
                drop(stop_tx);
                join_worker("capture", capture);
                return Err(err.into());
            }
        };

        *workers = Some(Workers {
            stop_tx,
            capture,
            processing,
        });
        info!("pipeline started on {description}");
        self.publisher.publish(PipelineEvent::Started {
            source: description,
        });
        Ok(())
    }

    /// Stop both threads and release the source. An in-flight cycle
    /// completes; no new one starts. Idempotent.
    pub fn stop(&self) {
        let workers = lock(&self.workers).take();
        let was_running = self.running.swap(false, Ordering::AcqRel);
        let Some(workers) = workers else {
            return;
        };
        drop(workers.stop_tx);
        join_worker("capture", workers.capture);
        join_worker("processing", workers.processing);
        if was_running {
            info!("pipeline stopped");
            self.publisher.publish(PipelineEvent::Stopped {
                reason: StopReason::Requested,
            });
        }
    }

    pub fn state(&self) -> PipelineState {
        if self.running.load(Ordering::Acquire) {
            PipelineState::Running
        } else {
            PipelineState::Stopped
        }
    }

    /// Takes effect from the next cycle.
    pub fn set_roi(&self, roi: RegionOfInterest) {
        debug!("roi updated: {roi:?}");
        self.snapshot.update(|current| InspectionSnapshot {
            roi,
            settings: current.settings.clone(),
        });
    }

    /// Replace the detection settings. Invalid settings are rejected and the
    /// previous ones stay in effect.
    pub fn set_detection_settings(&self, settings: DetectionSettings) -> Result<(), SettingsError> {
        if let Err(err) = settings.validate() {
            warn!("detection settings rejected: {err}");
            return Err(err);
        }
        self.snapshot.update(|current| InspectionSnapshot {
            roi: current.roi.clone(),
            settings,
        });
        Ok(())
    }

    pub fn snapshot(&self) -> Arc<InspectionSnapshot> {
        self.snapshot.load()
    }

    /// Presentation events. Receivers share one queue.
    pub fn events(&self) -> Receiver<PipelineEvent> {
        self.events_rx.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

struct CaptureLoop {
    source: Box<dyn FrameSource>,
    slot: Arc<LatestSlot<Arc<Frame>>>,
    stats: Arc<PipelineStats>,
    publisher: EventPublisher,
    running: Arc<AtomicBool>,
    sequence: Arc<AtomicU64>,
    stop_rx: Receiver<()>,
    config: PipelineConfig,
}

impl CaptureLoop {
    /// Wait for `duration`; `true` when a stop was requested meanwhile.
    fn interruptible_sleep(&self, duration: Duration) -> bool {
        select! {
            recv(self.stop_rx) -> _ => true,
            recv(after(duration)) -> _ => false,
        }
    }

    fn run(mut self) -> CaptureEnd {
        let min_period = self.config.min_frame_period();
        let mut last_frame: Option<Instant> = None;
        let mut failures = 0u32;
        loop {
            if !self.running.load(Ordering::Acquire) {
                return CaptureEnd::Stopped;
            }
            if let (Some(period), Some(last)) = (min_period, last_frame) {
                let wait = period.saturating_sub(last.elapsed());
                if !wait.is_zero() && self.interruptible_sleep(wait) {
                    return CaptureEnd::Stopped;
                }
            }
            match self.source.next_frame() {
                Ok(Some(frame)) => {
                    failures = 0;
                    last_frame = Some(Instant::now());
                    // Sources do not number their frames; the first one is #1.
                    let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
                    let stale = self.slot.put(Arc::new(frame.with_sequence(sequence)));
                    self.stats.frame_captured(stale.is_some());
                }
                Ok(None) => {
                    info!("{} reached end of stream", self.source.describe());
                    return CaptureEnd::Exhausted;
                }
                Err(err) if err.is_transient() => {
                    failures += 1;
                    self.stats.source_timeout();
                    warn!("capture: {err} ({failures} in a row)");
                    self.publisher
                        .publish(PipelineEvent::Status(PipelineStatus::SourceTimeout {
                            consecutive: failures,
                        }));
                    if failures >= self.config.max_consecutive_failures {
                        if self.interruptible_sleep(self.config.reconnect_delay()) {
                            return CaptureEnd::Stopped;
                        }
                        match self.source.reopen() {
                            Ok(()) => {
                                info!("capture: reopened {}", self.source.describe());
                                failures = 0;
                                self.publisher
                                    .publish(PipelineEvent::Status(PipelineStatus::SourceReopened));
                            }
                            Err(err) => {
                                error!("capture: reopening failed: {err}");
                                return CaptureEnd::Lost(err.to_string());
                            }
                        }
                    }
                }
                Err(err) => {
                    error!("capture: {err}");
                    return CaptureEnd::Lost(err.to_string());
                }
            }
        }
    }
}

struct ProcessingLoop {
    slot: Arc<LatestSlot<Arc<Frame>>>,
    snapshot: Arc<SnapshotCell>,
    actuator: Arc<dyn RejectActuator>,
    defects: Sender<DefectEvent>,
    publisher: EventPublisher,
    stats: Arc<PipelineStats>,
    running: Arc<AtomicBool>,
    stop_rx: Receiver<()>,
    end_rx: Receiver<CaptureEnd>,
    budget: CaptureBudget,
    config: PipelineConfig,
}

impl ProcessingLoop {
    fn run(mut self) {
        let mut deadline = Instant::now() + self.snapshot.load().settings.interval();
        let mut capture_end: Option<CaptureEnd> = None;
        loop {
            select! {
                recv(self.stop_rx) -> _ => break,
                recv(at(deadline)) -> _ => {}
            }
            if !self.running.load(Ordering::Acquire) {
                break;
            }
            // Check for the end before taking the frame so the last frame
            // the capture thread delivered is still processed.
            if capture_end.is_none() {
                capture_end = self.end_rx.try_recv().ok();
            }

            let snapshot = self.snapshot.load();
            let interval = snapshot.settings.interval();
            deadline += interval;
            let now = Instant::now();
            if deadline <= now {
                // Overran one or more intervals; pace from here.
                deadline = now + interval;
            }

            if let Some(frame) = self.slot.take() {
                self.run_cycle(frame, &snapshot);
            }

            if let Some(end) = capture_end.take() {
                if self.slot.is_empty() {
                    self.finish(end);
                    break;
                }
                capture_end = Some(end);
            }
        }
        debug!("processing loop exited");
    }

    fn run_cycle(&mut self, frame: Arc<Frame>, snapshot: &InspectionSnapshot) {
        self.stats.cycle();
        let decision = match detect(&frame, &snapshot.roi, &snapshot.settings) {
            Ok(decision) => decision,
            Err(err) => {
                warn!("frame {} skipped: {err}", frame.sequence());
                self.stats.invalid_frame();
                self.publisher
                    .publish(PipelineEvent::Status(PipelineStatus::InvalidFrame(
                        err.to_string(),
                    )));
                return;
            }
        };
        self.stats.decision(decision.kind);
        debug!(
            "frame {}: {:?} angle {:?} in {:.1} ms",
            frame.sequence(),
            decision.kind,
            decision.angle_deg,
            decision.elapsed_ms
        );

        let relay = decision
            .is_misaligned()
            .then(|| self.reject(&frame, &decision));
        self.publisher
            .publish(PipelineEvent::Decision(DecisionUpdate {
                frame,
                decision,
                relay,
                relay_state: self.actuator.state(),
            }));
    }

    /// Fire the reject pulse and hand the defect to the reporter.
    fn reject(&mut self, frame: &Arc<Frame>, decision: &Decision) -> TriggerOutcome {
        let outcome = self.actuator.reject();
        match &outcome {
            TriggerOutcome::Fired => self.stats.reject_fired(),
            TriggerOutcome::Disabled => {}
            other => warn!("frame {}: reject pulse not fired: {other:?}", frame.sequence()),
        }
        let attach = self.config.capture_defect_frames && self.budget.try_acquire();
        if let Some(event) = DefectEvent::from_decision(frame, decision, outcome.clone(), attach) {
            if self.defects.send(event).is_ok() {
                self.stats.defect_sent();
            } else {
                warn!("defect reporter is gone; frame {} not recorded", frame.sequence());
            }
        }
        outcome
    }

    fn finish(&self, end: CaptureEnd) {
        let (reason, status) = match end {
            CaptureEnd::Stopped => return,
            CaptureEnd::Exhausted => (StopReason::SourceExhausted, PipelineStatus::SourceExhausted),
            CaptureEnd::Lost(msg) => (
                StopReason::SourceLost(msg.clone()),
                PipelineStatus::SourceLost(msg),
            ),
        };
        if self.running.swap(false, Ordering::AcqRel) {
            info!("pipeline stopped: {reason:?}");
            self.publisher.publish(PipelineEvent::Status(status));
            self.publisher.publish(PipelineEvent::Stopped { reason });
        }
    }
}
