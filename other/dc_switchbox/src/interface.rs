//! Provide a serial interface for the switch box.

use std::time::Duration;

use labinstr::{Instrument, InstrumentError, SerialInterface};
use serialport::SerialPort;

/// A SerialInterface for the DC switch box.
///
/// Builds a `labinstr` SerialInterface with 9600 baud, eight data bits, no parity, one stop bit,
/// and a timeout of one second.
#[derive(Debug)]
pub struct SerialInterfaceSwitchBox {}

impl SerialInterfaceSwitchBox {
    /// Open the serial port of the switch box.
    ///
    /// Arguments:
    /// * `port` - The name of the serial port, e.g., `"/dev/ttyUSB0"` or `"COM3"`.
    pub fn simple(port: &str) -> Result<Instrument<Box<dyn SerialPort>>, InstrumentError> {
        let spb = serialport::new(port, 9600)
            .timeout(Duration::from_secs(1))
            .parity(serialport::Parity::None)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One);
        SerialInterface::full(spb)
    }
}
