//! Byte transports behind the relay worker.
//!
//! The worker only needs to open a port, write command bytes and discard
//! whatever the board echoes back. Keeping that behind two small traits lets
//! tests drive the state machine without hardware.
use super::state::RelayError;
use log::debug;
use std::io::{self, Read, Write};
use std::time::Duration;

pub trait RelayTransport: Send {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
    /// Discard pending input; returns the number of bytes dropped.
    fn drain_input(&mut self) -> io::Result<usize>;
}

pub trait RelayConnector: Send {
    fn open(
        &mut self,
        port: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> io::Result<Box<dyn RelayTransport>>;
}

/// Serial port opened with 8 data bits, no parity, one stop bit.
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl RelayTransport for SerialTransport {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        Write::write_all(&mut self.port, bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(&mut self.port)
    }

    fn drain_input(&mut self) -> io::Result<usize> {
        let pending = self.port.bytes_to_read().map_err(io::Error::from)? as usize;
        if pending == 0 {
            return Ok(0);
        }
        let mut buf = vec![0u8; pending];
        let read = self.port.read(&mut buf)?;
        debug!("relay: drained {read} byte(s): {:02X?}", &buf[..read]);
        Ok(read)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SerialConnector;

impl RelayConnector for SerialConnector {
    fn open(
        &mut self,
        port: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> io::Result<Box<dyn RelayTransport>> {
        let port = serialport::new(port, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(io::Error::from)?;
        Ok(Box::new(SerialTransport { port }))
    }
}

/// Serial ports visible to the operating system.
pub fn available_ports() -> Result<Vec<String>, RelayError> {
    let ports = serialport::available_ports()
        .map_err(|err| RelayError::Io(err.to_string()))?
        .into_iter()
        .map(|info| info.port_name)
        .collect();
    Ok(ports)
}
