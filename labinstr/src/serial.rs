//! Blocking serial port interfaces built with the `serialport` crate.

use std::time::Duration;

use log::debug;
use serialport::{SerialPort, SerialPortBuilder};

use crate::{Instrument, InstrumentError};

/// Shortcuts to open a serial port and wrap it into an [`Instrument`].
///
/// Drivers for devices that need a specific parity, number of data bits, etc., usually provide
/// their own `simple` function that configures a [`SerialPortBuilder`] and hands it to
/// [`SerialInterface::full`].
#[derive(Debug)]
pub struct SerialInterface {}

impl SerialInterface {
    /// Open a serial port with the given baud rate and default settings (8N1).
    ///
    /// The timeout is set to three seconds.
    ///
    /// # Arguments
    /// * `port` - The name of the serial port, e.g., `"/dev/ttyUSB0"` or `"COM3"`.
    /// * `baud` - The baud rate.
    pub fn simple(
        port: &str,
        baud: u32,
    ) -> Result<Instrument<Box<dyn SerialPort>>, InstrumentError> {
        let spb = serialport::new(port, baud).timeout(Duration::from_secs(3));
        SerialInterface::full(spb)
    }

    /// Open a serial port from a fully configured [`SerialPortBuilder`].
    ///
    /// The timeout of the builder is used as the timeout of the returned [`Instrument`].
    pub fn full(
        spb: SerialPortBuilder,
    ) -> Result<Instrument<Box<dyn SerialPort>>, InstrumentError> {
        let port = spb.open()?;
        let timeout = port.timeout();
        debug!(
            target: "labinstr",
            "Opened serial port {:?} with timeout {timeout:?}",
            port.name()
        );
        Ok(Instrument::new(port, timeout))
    }
}
