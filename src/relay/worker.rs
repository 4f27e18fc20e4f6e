//! The thread that owns the relay port.
//!
//! Every request arrives as a [`Command`]; between commands the worker
//! sleeps until the next timer (a reconnection attempt while faulted, a
//! health ping while connected). A pulse holds the output for its duration
//! while still listening for commands, so a release or shutdown cuts the
//! pulse short instead of waiting for it.
use super::config::RelayConfig;
use super::controller::RelayShared;
use super::state::{RelayConnectionState, RelayError};
use super::transport::{RelayConnector, RelayTransport};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};
use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub(crate) enum Command {
    Connect {
        port: String,
        baud_rate: u32,
    },
    Pulse {
        duration: Duration,
        /// The caller stops waiting at this instant; a pulse still queued
        /// by then is dropped instead of fired late.
        expires: Instant,
        reply: Sender<Result<(), RelayError>>,
    },
    SelfTest {
        cycles: u32,
        on: Duration,
        off: Duration,
        until: Option<Instant>,
        reply: Sender<Result<u32, RelayError>>,
    },
    StopTest,
    Release {
        reply: Sender<()>,
    },
    Shutdown,
}

impl Command {
    /// Commands that end an active pulse early.
    fn interrupts_pulse(&self) -> bool {
        matches!(self, Command::Release { .. } | Command::Shutdown)
    }

    fn ends_test(&self) -> bool {
        self.interrupts_pulse() || matches!(self, Command::StopTest)
    }
}

enum Flow {
    Continue,
    Exit,
}

/// Asserted output that is deasserted on every exit path.
struct PulseGuard<'a> {
    transport: &'a mut Box<dyn RelayTransport>,
    off: &'a [u8],
    armed: bool,
}

impl<'a> PulseGuard<'a> {
    fn assert(
        transport: &'a mut Box<dyn RelayTransport>,
        on: &[u8],
        off: &'a [u8],
    ) -> io::Result<Self> {
        let mut guard = Self {
            transport,
            off,
            armed: true,
        };
        guard.transport.write_all(on)?;
        guard.transport.flush()?;
        Ok(guard)
    }

    fn release(mut self) -> io::Result<()> {
        self.armed = false;
        self.transport.write_all(self.off)?;
        self.transport.flush()
    }
}

impl Drop for PulseGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.transport.write_all(self.off);
            let _ = self.transport.flush();
        }
    }
}

/// Wait out `duration`, collecting commands that arrive meanwhile. Stops
/// early on a command for which `interrupts` holds.
fn hold(
    commands: &Receiver<Command>,
    duration: Duration,
    interrupts: fn(&Command) -> bool,
) -> Vec<Command> {
    let deadline = Instant::now() + duration;
    let mut deferred = Vec::new();
    while let Ok(cmd) = commands.recv_deadline(deadline) {
        let stop = interrupts(&cmd);
        deferred.push(cmd);
        if stop {
            break;
        }
    }
    deferred
}

pub(crate) struct RelayWorker {
    config: RelayConfig,
    connector: Box<dyn RelayConnector>,
    shared: Arc<RelayShared>,
    commands: Receiver<Command>,
    transport: Option<Box<dyn RelayTransport>>,
    target: Option<(String, u32)>,
    failures: u32,
    retry_at: Option<Instant>,
    next_ping: Option<Instant>,
}

impl RelayWorker {
    pub(crate) fn new(
        config: RelayConfig,
        connector: Box<dyn RelayConnector>,
        shared: Arc<RelayShared>,
        commands: Receiver<Command>,
    ) -> Self {
        Self {
            config,
            connector,
            shared,
            commands,
            transport: None,
            target: None,
            failures: 0,
            retry_at: None,
            next_ping: None,
        }
    }

    pub(crate) fn run(mut self) {
        debug!("relay worker started");
        loop {
            let cmd = match self.next_deadline() {
                Some(at) => match self.commands.recv_deadline(at) {
                    Ok(cmd) => Some(cmd),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match self.commands.recv() {
                    Ok(cmd) => Some(cmd),
                    Err(_) => break,
                },
            };
            let flow = match cmd {
                Some(cmd) => self.handle(cmd),
                None => {
                    self.on_timer();
                    Flow::Continue
                }
            };
            if let Flow::Exit = flow {
                break;
            }
        }
        self.release();
        debug!("relay worker stopped");
    }

    fn next_deadline(&self) -> Option<Instant> {
        match self.shared.state() {
            RelayConnectionState::Faulted => self.retry_at,
            RelayConnectionState::Connected => self.next_ping,
            _ => None,
        }
    }

    fn on_timer(&mut self) {
        let now = Instant::now();
        match self.shared.state() {
            RelayConnectionState::Faulted if self.retry_at.is_some_and(|at| at <= now) => {
                self.retry_at = None;
                self.try_connect();
            }
            RelayConnectionState::Connected if self.next_ping.is_some_and(|at| at <= now) => {
                self.health_check();
            }
            _ => {}
        }
    }

    fn handle(&mut self, cmd: Command) -> Flow {
        match cmd {
            Command::Connect { port, baud_rate } => {
                self.transport = None;
                self.target = Some((port, baud_rate));
                self.failures = 0;
                self.retry_at = None;
                self.try_connect();
            }
            Command::Pulse {
                duration,
                expires,
                reply,
            } => return self.pulse(duration, expires, reply),
            Command::SelfTest {
                cycles,
                on,
                off,
                until,
                reply,
            } => return self.self_test(cycles, on, off, until, reply),
            Command::StopTest => debug!("relay: no test running"),
            Command::Release { reply } => {
                self.release();
                let _ = reply.send(());
            }
            Command::Shutdown => return Flow::Exit,
        }
        Flow::Continue
    }

    fn replay(&mut self, deferred: Vec<Command>) -> Flow {
        for cmd in deferred {
            if let Flow::Exit = self.handle(cmd) {
                return Flow::Exit;
            }
        }
        Flow::Continue
    }

    fn try_connect(&mut self) {
        let Some((port, baud_rate)) = self.target.clone() else {
            return;
        };
        self.shared.set_state(RelayConnectionState::Connecting);
        match self.open_and_handshake(&port, baud_rate) {
            Ok(transport) => {
                self.transport = Some(transport);
                self.failures = 0;
                self.retry_at = None;
                self.next_ping = self
                    .config
                    .health_check_interval()
                    .map(|interval| Instant::now() + interval);
                info!("relay: connected to {port} at {baud_rate} baud");
                self.shared.set_state(RelayConnectionState::Connected);
            }
            Err(err) => {
                warn!("relay: connecting to {port} failed: {err}");
                self.fault();
            }
        }
    }

    fn open_and_handshake(
        &mut self,
        port: &str,
        baud_rate: u32,
    ) -> io::Result<Box<dyn RelayTransport>> {
        let mut transport = self
            .connector
            .open(port, baud_rate, self.config.io_timeout())?;
        transport.write_all(&self.config.protocol.ping)?;
        transport.flush()?;
        let settle = self.config.handshake_settle();
        if !settle.is_zero() {
            thread::sleep(settle);
        }
        transport.drain_input()?;
        Ok(transport)
    }

    fn fault(&mut self) {
        self.transport = None;
        self.next_ping = None;
        self.failures = self.failures.saturating_add(1);
        self.shared.set_state(RelayConnectionState::Faulted);
        if self.target.is_some() && self.config.backoff.allows(self.failures) {
            let delay = self.config.backoff.delay(self.failures);
            info!("relay: reconnect attempt {} in {delay:?}", self.failures);
            self.retry_at = Some(Instant::now() + delay);
        } else {
            error!("relay: giving up after {} failed attempt(s)", self.failures);
            self.retry_at = None;
        }
    }

    fn health_check(&mut self) {
        let ping = &self.config.protocol.ping;
        let result = match self.transport.as_mut() {
            Some(transport) => transport.write_all(ping).and_then(|()| transport.flush()),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "no open port")),
        };
        match result {
            Ok(()) => {
                debug!("relay: health ping ok");
                self.next_ping = self
                    .config
                    .health_check_interval()
                    .map(|interval| Instant::now() + interval);
            }
            Err(err) => {
                warn!("relay: health ping failed: {err}");
                self.fault();
            }
        }
    }

    fn pulse(
        &mut self,
        duration: Duration,
        expires: Instant,
        reply: Sender<Result<(), RelayError>>,
    ) -> Flow {
        let (result, deferred) = if Instant::now() >= expires {
            warn!("relay: pulse dropped, it waited past its deadline");
            let _ = reply.send(Err(RelayError::Timeout(self.config.io_timeout())));
            (Ok(()), Vec::new())
        } else {
            self.run_pulse(duration, &reply)
        };
        self.shared.pulse_active.store(false, Ordering::Release);
        if let Err(err) = result {
            warn!("relay: pulse failed: {err}");
            self.fault();
        }
        self.replay(deferred)
    }

    fn run_pulse(
        &mut self,
        duration: Duration,
        reply: &Sender<Result<(), RelayError>>,
    ) -> (Result<(), RelayError>, Vec<Command>) {
        let Some(transport) = self.transport.as_mut() else {
            let _ = reply.send(Err(RelayError::NotConnected));
            return (Ok(()), Vec::new());
        };
        let protocol = &self.config.protocol;
        let guard = match PulseGuard::assert(transport, &protocol.on, &protocol.off) {
            Ok(guard) => guard,
            Err(err) => {
                let err = RelayError::from(err);
                let _ = reply.send(Err(err.clone()));
                return (Err(err), Vec::new());
            }
        };
        let _ = reply.send(Ok(()));
        debug!("relay: output on for {duration:?}");
        let deferred = hold(&self.commands, duration, Command::interrupts_pulse);
        (guard.release().map_err(RelayError::from), deferred)
    }

    fn self_test(
        &mut self,
        cycles: u32,
        on: Duration,
        off: Duration,
        until: Option<Instant>,
        reply: Sender<Result<u32, RelayError>>,
    ) -> Flow {
        let (result, deferred) = self.run_self_test(cycles, on, off, until);
        self.shared.pulse_active.store(false, Ordering::Release);
        match &result {
            Ok(done) if until.is_some() => info!("relay: continuous test ran {done} cycle(s)"),
            Ok(done) => info!("relay: self test completed {done}/{cycles} cycle(s)"),
            Err(RelayError::Io(msg)) => {
                warn!("relay: self test failed: {msg}");
                self.fault();
            }
            Err(err) => warn!("relay: self test not run: {err}"),
        }
        let _ = reply.send(result);
        self.replay(deferred)
    }

    /// On/off cycles until `cycles` are done, `until` passes or a stop
    /// request arrives.
    fn run_self_test(
        &mut self,
        cycles: u32,
        on: Duration,
        off: Duration,
        until: Option<Instant>,
    ) -> (Result<u32, RelayError>, Vec<Command>) {
        let Some(transport) = self.transport.as_mut() else {
            return (Err(RelayError::NotConnected), Vec::new());
        };
        let protocol = &self.config.protocol;
        let mut deferred = Vec::new();
        for cycle in 1..=cycles {
            let guard = match PulseGuard::assert(&mut *transport, &protocol.on, &protocol.off) {
                Ok(guard) => guard,
                Err(err) => return (Err(err.into()), deferred),
            };
            deferred.extend(hold(&self.commands, on, Command::ends_test));
            if let Err(err) = guard.release() {
                return (Err(err.into()), deferred);
            }
            let expired = until.is_some_and(|at| Instant::now() >= at);
            if cycle == cycles || expired || deferred.iter().any(Command::ends_test) {
                return (Ok(cycle), deferred);
            }
            deferred.extend(hold(&self.commands, off, Command::ends_test));
            if deferred.iter().any(Command::ends_test) {
                return (Ok(cycle), deferred);
            }
        }
        (Ok(cycles), deferred)
    }

    fn release(&mut self) {
        self.target = None;
        self.retry_at = None;
        self.next_ping = None;
        self.failures = 0;
        if let Some(mut transport) = self.transport.take() {
            let off = &self.config.protocol.off;
            if let Err(err) = transport.write_all(off).and_then(|()| transport.flush()) {
                debug!("relay: final off command failed: {err}");
            }
            drop(transport);
            info!("relay: port released");
        }
        self.shared.set_state(RelayConnectionState::Disconnected);
    }
}
