//! Blocking TCP/IP interface, e.g., for SCPI raw sockets.

use std::{
    net::{TcpStream, ToSocketAddrs},
    time::Duration,
};

use log::debug;

use crate::{Instrument, InstrumentError};

/// Shortcuts to connect to an instrument via a [`TcpStream`].
#[derive(Debug)]
pub struct TcpIpInterface {}

impl TcpIpInterface {
    /// Connect to an instrument with a read and write timeout of three seconds.
    ///
    /// Without a timeout an unanswered query would block forever.
    ///
    /// # Arguments
    /// * `sock_addr` - Socket address, e.g., `"192.168.0.10:5025"`.
    pub fn try_new<A: ToSocketAddrs>(
        sock_addr: A,
    ) -> Result<Instrument<TcpStream>, InstrumentError> {
        Self::try_new_with_timeout(sock_addr, Duration::from_secs(3))
    }

    /// Connect to an instrument with a given read and write timeout.
    ///
    /// Slow operations, e.g., long sweeps that are awaited with an operation complete query,
    /// need a timeout that is longer than the operation itself.
    ///
    /// # Arguments
    /// * `sock_addr` - Socket address.
    /// * `timeout` - Read and write timeout of the stream, must not be zero.
    pub fn try_new_with_timeout<A: ToSocketAddrs>(
        sock_addr: A,
        timeout: Duration,
    ) -> Result<Instrument<TcpStream>, InstrumentError> {
        if timeout.is_zero() {
            return Err(InstrumentError::InvalidArgument(
                "The timeout of a TCP/IP interface must be larger than zero.".to_string(),
            ));
        }
        let stream = TcpStream::connect(sock_addr)?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_read_timeout(Some(timeout))?;
        debug!(
            target: "labinstr",
            "Connected to {:?} with timeout {timeout:?}",
            stream.peer_addr()
        );
        Ok(Instrument::new(stream, timeout))
    }
}
