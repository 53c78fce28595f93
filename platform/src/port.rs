use crate::error::PlatformError;
use crate::frame::FrameAssembler;
use crate::record;
use platform_traits::ByteSource;
use serialport::SerialPort;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Names of the serial ports present on this machine.
pub fn available_ports() -> Result<Vec<String>, PlatformError> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(|p| p.port_name)
        .collect())
}

/// Whether `bytes` contain at least one complete line that decodes.
pub fn contains_valid_frame(bytes: &[u8]) -> bool {
    let mut assembler = FrameAssembler::new(Some(bytes.len()));
    assembler
        .feed(bytes)
        .filter_map(Result::ok)
        .any(|frame| record::decode(frame.as_str()).is_ok())
}

pub struct LinkPort {
    serial_port: Box<dyn SerialPort>,
}

impl LinkPort {
    pub fn open(port_name: &str, baud_rate: u32, timeout: Duration) -> Result<Self, PlatformError> {
        let serial_port = serialport::new(port_name, baud_rate)
            .timeout(timeout)
            .open()?;
        info!(port = port_name, baud_rate, "opened serial port");
        let mut ret = Self { serial_port };
        ret.clear(Duration::from_millis(10))?;
        Ok(ret)
    }

    /// Reads until a line decodes or `timeout` elapses.
    pub fn verify_comms(&mut self, timeout: Duration) -> Result<(), PlatformError> {
        let deadline = Instant::now() + timeout;
        let mut received = Vec::new();
        while Instant::now() < deadline {
            self.serial_port.read_available(&mut received)?;
            if contains_valid_frame(&received) {
                return Ok(());
            }
        }
        Err(PlatformError::NoValidFrame(timeout))
    }

    /// Tries each rate in turn and settles on the first one carrying valid
    /// lines.
    pub fn find_valid_baud_rate(
        &mut self,
        baud_rates: &[u32],
        timeout: Duration,
    ) -> Result<u32, PlatformError> {
        for &baud_rate in baud_rates {
            debug!(baud_rate, "trying baud rate");
            self.set_baud_rate(baud_rate)?;
            if self.verify_comms(timeout).is_ok() {
                info!(baud_rate, "link verified");
                return Ok(baud_rate);
            }
        }
        Err(PlatformError::NoValidBaudRate)
    }

    pub fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), PlatformError> {
        self.serial_port.set_baud_rate(baud_rate)?;
        std::thread::sleep(Duration::from_millis(10));
        self.clear(Duration::from_millis(10))
    }

    /// Drains stale input.
    fn clear(&mut self, timeout: Duration) -> Result<(), PlatformError> {
        let previous = self.serial_port.timeout();
        self.serial_port.set_timeout(timeout)?;
        let mut scratch = Vec::new();
        for _ in 0..4 {
            match self.serial_port.read_available(&mut scratch) {
                Ok(0) | Err(_) => break,
                Ok(_) => scratch.clear(),
            }
        }
        self.serial_port.set_timeout(previous)?;
        Ok(())
    }

    pub fn into_inner(self) -> Box<dyn SerialPort> {
        self.serial_port
    }
}
