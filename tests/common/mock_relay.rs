use board_align::relay::{BackoffPolicy, RelayConfig, RelayConnector, RelayTransport};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Everything the fake relay saw.
#[derive(Debug, Default)]
pub struct MockLog {
    pub opens: Vec<Instant>,
    pub writes: Vec<Vec<u8>>,
    pub open_handles: usize,
    /// Upcoming `open` calls that fail.
    pub fail_opens: usize,
    pub fail_writes: bool,
    /// Every write blocks this long before it lands, like a wedged port.
    pub write_delay: Option<Duration>,
}

#[derive(Clone, Default)]
pub struct MockRelay {
    log: Arc<Mutex<MockLog>>,
}

impl MockRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_opens(count: usize) -> Self {
        let relay = Self::new();
        relay.log().fail_opens = count;
        relay
    }

    pub fn log(&self) -> std::sync::MutexGuard<'_, MockLog> {
        self.log.lock().unwrap()
    }

    pub fn connector(&self) -> Box<dyn RelayConnector> {
        Box::new(MockConnector {
            log: Arc::clone(&self.log),
        })
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.log().writes.clone()
    }

    pub fn last_write(&self) -> Option<Vec<u8>> {
        self.log().writes.last().cloned()
    }
}

struct MockConnector {
    log: Arc<Mutex<MockLog>>,
}

impl RelayConnector for MockConnector {
    fn open(
        &mut self,
        port: &str,
        _baud_rate: u32,
        _timeout: Duration,
    ) -> io::Result<Box<dyn RelayTransport>> {
        let mut log = self.log.lock().unwrap();
        log.opens.push(Instant::now());
        if log.fail_opens > 0 {
            log.fail_opens -= 1;
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{port} is not present"),
            ));
        }
        log.open_handles += 1;
        Ok(Box::new(MockTransport {
            log: Arc::clone(&self.log),
        }))
    }
}

struct MockTransport {
    log: Arc<Mutex<MockLog>>,
}

impl RelayTransport for MockTransport {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let delay = self.log.lock().unwrap().write_delay;
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        let mut log = self.log.lock().unwrap();
        if log.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "cable pulled"));
        }
        log.writes.push(bytes.to_vec());
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn drain_input(&mut self) -> io::Result<usize> {
        Ok(0)
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        if let Ok(mut log) = self.log.lock() {
            log.open_handles -= 1;
        }
    }
}

/// Fast settings: no settle pause, no idle ping, short backoff.
pub fn test_config() -> RelayConfig {
    RelayConfig {
        port: "/dev/ttyMOCK0".to_string(),
        handshake_settle_ms: 0,
        health_check_interval_ms: 0,
        auto_connect: false,
        backoff: BackoffPolicy {
            initial_ms: 40,
            max_ms: 1000,
            multiplier: 2.0,
            max_attempts: None,
        },
        ..RelayConfig::default()
    }
}
