//! Generic [`InstrumentInterface`] implementation and the shared error type.
//!
//! [`Instrument`] can be built on top of any [`Port`], such as a [`std::net::TcpStream`] or a
//! [`serialport::SerialPort`].

use std::{collections::VecDeque, io, net::TcpStream, time::Duration};

use thiserror::Error;

use crate::InstrumentInterface;

/// A byte stream that an [`Instrument`] can talk over.
///
/// Any `Read + Write` type can become a port. Ports that buffer incoming data should implement
/// [`Port::discard_input`] so that byte oriented protocols can throw away stale data.
pub trait Port: io::Read + io::Write {
    /// Discard all data received but not read yet. The default does nothing.
    fn discard_input(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Port for TcpStream {}

impl Port for VecDeque<u8> {
    fn discard_input(&mut self) -> io::Result<()> {
        self.clear();
        Ok(())
    }
}

#[cfg(feature = "serial")]
impl Port for Box<dyn serialport::SerialPort> {
    fn discard_input(&mut self) -> io::Result<()> {
        self.clear(serialport::ClearBuffer::Input)
            .map_err(io::Error::from)
    }
}

/// A general instrument interface that can be built from any [`Port`].
///
/// [`crate::TcpIpInterface`] and [`crate::SerialInterface`] are shortcuts that return an
/// `Instrument` with the port already opened and the timeout configured.
///
/// # Example
///
/// ```no_run
/// use std::{net::TcpStream, time::Duration};
///
/// use labinstr::{Instrument, InstrumentInterface};
///
/// let stream = TcpStream::connect("192.168.10.1:5025").unwrap();
/// let mut inst = Instrument::new(stream, Duration::from_secs(3));
/// println!("{}", inst.query("*IDN?").unwrap());
/// ```
pub struct Instrument<P: Port> {
    port: P,
    terminator: String,
    timeout: Duration,
}

impl<P: Port> Instrument<P> {
    /// Create a new [`Instrument`] from an open port.
    ///
    /// The terminator defaults to `"\n"`.
    ///
    /// # Arguments
    /// * `port` - The opened port.
    /// * `timeout` - Time after which waiting for a terminated response is given up.
    pub fn new(port: P, timeout: Duration) -> Self {
        Self {
            port,
            terminator: "\n".to_string(),
            timeout,
        }
    }

    /// Set the timeout for reading terminated responses.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }
}

impl<P: Port> InstrumentInterface for Instrument<P> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        self.port.read_exact(buf)?;
        Ok(())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn get_terminator(&self) -> &str {
        self.terminator.as_str()
    }

    fn set_terminator(&mut self, terminator: &str) {
        self.terminator = terminator.to_string();
    }

    fn get_timeout(&self) -> Duration {
        self.timeout
    }

    fn clear_input_buffer(&mut self) -> Result<(), InstrumentError> {
        self.port.discard_input()?;
        Ok(())
    }
}

/// Errors shared by all drivers of this workspace.
///
/// Every command and query of a driver returns this error as the alternative, such that errors
/// from the interface, from parsing, and from argument checks all propagate with `?`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InstrumentError {
    /// The instrument answered a command with something other than the expected acknowledgment.
    /// Contains the answer.
    #[error("Command was not acknowledged, the instrument answered: {0}")]
    NotAcknowledged(String),
    /// The channel index requested is out of range.
    #[error("Channel index {idx} is out of range, the instrument has {nof_channels} channels")]
    ChannelIndexOutOfRange {
        /// Requested index.
        idx: usize,
        /// Number of channels that can be addressed.
        nof_channels: usize,
    },
    /// A given float value is out of the specified range.
    #[error("Value {value} is outside of the range [{min}, {max}]")]
    FloatValueOutOfRange {
        /// Rejected value.
        value: f64,
        /// Lower limit.
        min: f64,
        /// Upper limit.
        max: f64,
    },
    /// The called command is not supported by this interface or instrument.
    #[error("This command is not supported: {0}")]
    CommandNotSupported(String),
    /// A given integer value is out of the specified range.
    #[error("Integer {value} is outside of the range [{min}, {max}]")]
    IntValueOutOfRange {
        /// Rejected value.
        value: i64,
        /// Lower limit.
        min: i64,
        /// Upper limit.
        max: i64,
    },
    /// An invalid argument was passed to a function. The message is intended for the user.
    #[error("{0}")]
    InvalidArgument(String),
    /// Reading from or writing to the port failed, including read timeouts of the port.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The instrument reported a state that does not allow to continue, e.g., an operation
    /// complete query that did not complete. The message is displayed as is.
    #[error("{0}")]
    InstrumentStatus(String),
    /// The response from the instrument could not be parsed. Contains the raw response.
    #[error("Could not parse the response of the instrument: {0}")]
    ResponseParseError(String),
    #[cfg(feature = "serial")]
    /// Opening or configuring a serial port failed.
    #[error(transparent)]
    Serialport(#[from] serialport::Error),
    /// No terminated response arrived within the timeout of the interface.
    #[error("No response from the instrument within {0:?}")]
    Timeout(Duration),
    /// Timeout occurred while waiting for a response to a query.
    #[error("No response to query {query:?} within {timeout:?}")]
    TimeoutQuery {
        /// Query that was sent.
        query: String,
        /// Timeout of the interface.
        timeout: Duration,
    },
}
