use super::config::RelayConfig;
use super::state::{RelayConnectionState, RelayError, TriggerOutcome};
use super::transport::{RelayConnector, SerialConnector};
use super::worker::{Command, RelayWorker};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State observed by both the controller handle and the worker thread.
pub(crate) struct RelayShared {
    state: Mutex<RelayConnectionState>,
    pub(crate) pulse_active: AtomicBool,
    subscribers: Mutex<Vec<Sender<RelayConnectionState>>>,
}

impl RelayShared {
    fn new() -> Self {
        Self {
            state: Mutex::new(RelayConnectionState::Disconnected),
            pulse_active: AtomicBool::new(false),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn state(&self) -> RelayConnectionState {
        *lock(&self.state)
    }

    /// Publish a transition. Repeating the current state is a no-op.
    pub(crate) fn set_state(&self, next: RelayConnectionState) {
        {
            let mut state = lock(&self.state);
            if *state == next {
                return;
            }
            info!("relay: {} -> {}", *state, next);
            *state = next;
        }
        lock(&self.subscribers).retain(|tx| tx.send(next).is_ok());
    }

    fn subscribe(&self) -> Receiver<RelayConnectionState> {
        let (tx, rx) = unbounded();
        let mut subscribers = lock(&self.subscribers);
        let _ = tx.send(self.state());
        subscribers.push(tx);
        rx
    }
}

/// Handle to the reject relay.
///
/// A dedicated worker thread owns the port; this handle only sends it
/// commands and reads the published state. [`RelayController::trigger`]
/// waits at most the I/O timeout for the output to come on;
/// [`RelayController::release`] and [`RelayController::self_test`] wait for
/// the worker to finish.
pub struct RelayController {
    config: RelayConfig,
    commands: Sender<Command>,
    shared: Arc<RelayShared>,
    worker: Option<JoinHandle<()>>,
}

impl RelayController {
    /// Start the worker. With `auto_connect` set the configured port is
    /// opened right away; failures surface as state transitions.
    pub fn spawn(
        config: RelayConfig,
        connector: Box<dyn RelayConnector>,
    ) -> Result<Self, RelayError> {
        config.validate()?;
        let (commands, rx) = unbounded();
        let shared = Arc::new(RelayShared::new());
        let worker = RelayWorker::new(config.clone(), connector, Arc::clone(&shared), rx);
        let handle = thread::Builder::new()
            .name("relay-worker".to_string())
            .spawn(move || worker.run())?;
        let controller = Self {
            config,
            commands,
            shared,
            worker: Some(handle),
        };
        if controller.config.auto_connect {
            controller.connect(&controller.config.port, controller.config.baud_rate)?;
        }
        Ok(controller)
    }

    /// Controller over a real serial port.
    pub fn serial(config: RelayConfig) -> Result<Self, RelayError> {
        Self::spawn(config, Box::new(SerialConnector))
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Ask the worker to (re)open `port`. Progress is reported through
    /// [`RelayController::subscribe`].
    pub fn connect(&self, port: &str, baud_rate: u32) -> Result<(), RelayError> {
        if baud_rate == 0 {
            return Err(RelayError::Config("baud_rate must be positive".to_string()));
        }
        self.send(Command::Connect {
            port: port.to_string(),
            baud_rate,
        })
    }

    /// Assert the output for `duration`.
    ///
    /// Returns once the output is on; the worker turns it off again. A
    /// relay that is not connected is never written to. When the worker is
    /// tied up (opening the port, a slow health ping) for longer than the I/O
    /// timeout the call gives up with `Failed` and the queued pulse is
    /// dropped rather than fired late.
    pub fn trigger(&self, duration: Duration) -> TriggerOutcome {
        if self.shared.state() != RelayConnectionState::Connected {
            return TriggerOutcome::NotReady;
        }
        if self
            .shared
            .pulse_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return TriggerOutcome::Busy;
        }
        let timeout = self.config.io_timeout();
        let expires = Instant::now() + timeout;
        let (reply_tx, reply_rx) = bounded(1);
        if self
            .send(Command::Pulse {
                duration,
                expires,
                reply: reply_tx,
            })
            .is_err()
        {
            self.shared.pulse_active.store(false, Ordering::Release);
            return TriggerOutcome::Failed(RelayError::WorkerGone.to_string());
        }
        match reply_rx.recv_deadline(expires) {
            Ok(Ok(())) => TriggerOutcome::Fired,
            Ok(Err(RelayError::NotConnected)) => TriggerOutcome::NotReady,
            Ok(Err(err)) => TriggerOutcome::Failed(err.to_string()),
            Err(RecvTimeoutError::Timeout) => {
                warn!("relay: no answer to pulse within {timeout:?}");
                TriggerOutcome::Failed(RelayError::Timeout(timeout).to_string())
            }
            Err(RecvTimeoutError::Disconnected) => {
                TriggerOutcome::Failed(RelayError::WorkerGone.to_string())
            }
        }
    }

    /// Pulse for the configured duration.
    pub fn pulse(&self) -> TriggerOutcome {
        self.trigger(self.config.trigger_duration())
    }

    /// Turn the output off, close the port and stop reconnecting. An active
    /// pulse is cut short.
    pub fn release(&self) -> Result<(), RelayError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.send(Command::Release { reply: reply_tx })?;
        reply_rx.recv().map_err(|_| RelayError::WorkerGone)
    }

    /// Run `cycles` on/off pulses; returns how many completed.
    pub fn self_test(&self, cycles: u32, on: Duration, off: Duration) -> Result<u32, RelayError> {
        let done = self.start_test(cycles, on, off, None)?;
        done.recv().map_err(|_| RelayError::WorkerGone)?
    }

    /// Pulse on and off for up to `duration` without blocking the caller.
    ///
    /// The returned receiver yields the number of completed cycles once the
    /// test ends, either on its own or through
    /// [`RelayController::stop_test`]. Reject triggers report `Busy` while
    /// the test runs.
    pub fn continuous_test(
        &self,
        duration: Duration,
        on: Duration,
        off: Duration,
    ) -> Result<Receiver<Result<u32, RelayError>>, RelayError> {
        let until = Instant::now() + duration;
        self.start_test(u32::MAX, on, off, Some(until))
    }

    /// End a running test after its current pulse. The output is left off.
    pub fn stop_test(&self) -> Result<(), RelayError> {
        self.send(Command::StopTest)
    }

    fn start_test(
        &self,
        cycles: u32,
        on: Duration,
        off: Duration,
        until: Option<Instant>,
    ) -> Result<Receiver<Result<u32, RelayError>>, RelayError> {
        if self.shared.state() != RelayConnectionState::Connected {
            return Err(RelayError::NotConnected);
        }
        if self
            .shared
            .pulse_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RelayError::Busy);
        }
        let (reply_tx, reply_rx) = bounded(1);
        if let Err(err) = self.send(Command::SelfTest {
            cycles,
            on,
            off,
            until,
            reply: reply_tx,
        }) {
            self.shared.pulse_active.store(false, Ordering::Release);
            return Err(err);
        }
        Ok(reply_rx)
    }

    pub fn current_state(&self) -> RelayConnectionState {
        self.shared.state()
    }

    /// Receive every state transition from now on. The current state is
    /// delivered first.
    pub fn subscribe(&self) -> Receiver<RelayConnectionState> {
        self.shared.subscribe()
    }

    fn send(&self, cmd: Command) -> Result<(), RelayError> {
        self.commands.send(cmd).map_err(|_| RelayError::WorkerGone)
    }
}

impl Drop for RelayController {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("relay worker panicked");
            }
        }
    }
}
