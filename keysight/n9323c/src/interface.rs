//! Provide a LAN interface for the N9323C.

use std::{net::TcpStream, time::Duration};

use labinstr::{Instrument, InstrumentError, TcpIpInterface};

/// SCPI raw socket port of the N9323C.
const SCPI_PORT: u16 = 5025;

/// A TCP/IP interface for the N9323C.
///
/// Builds a `labinstr` TCP/IP interface on the SCPI raw socket port with a timeout long enough to
/// wait for a single sweep with averaging.
#[derive(Debug)]
pub struct TcpIpInterfaceN9323c {}

impl TcpIpInterfaceN9323c {
    /// Connect to the analyzer at the given host with a timeout of 10 seconds.
    ///
    /// Arguments:
    /// * `host` - Host name or IP address of the analyzer, e.g., `"192.168.0.123"`.
    pub fn simple(host: &str) -> Result<Instrument<TcpStream>, InstrumentError> {
        Self::with_timeout(host, Duration::from_secs(10))
    }

    /// Connect to the analyzer at the given host with a custom timeout.
    ///
    /// Use this if single sweeps take longer than 10 seconds, e.g., with long sweep times or
    /// many averages, as the operation complete query only returns once the sweep is done.
    pub fn with_timeout(
        host: &str,
        timeout: Duration,
    ) -> Result<Instrument<TcpStream>, InstrumentError> {
        TcpIpInterface::try_new_with_timeout((host, SCPI_PORT), timeout)
    }
}
