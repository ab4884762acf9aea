//! labinstr: the shared plumbing underneath the lab instrument drivers of this workspace
//!
//! Every driver in this workspace talks to its hardware through the [`InstrumentInterface`]
//! trait. The trait only requires raw byte reading and writing; everything else (terminated
//! commands, text queries, acknowledgment checks, SCPI completion queries, and comma separated
//! value parsing) is provided on top of these two primitives. Drivers return the shared
//! [`InstrumentError`] so that failures propagate with the `?` operator all the way to the user.
//!
//! # Interfaces
//!
//! - [`Instrument`]: generic implementation for any [`Port`], i.e., anything that implements
//!   [`std::io::Read`] and [`std::io::Write`].
//! - [`TcpIpInterface`]: blocking TCP/IP socket, e.g., SCPI raw sockets on port 5025.
//! - [`SerialInterface`]: blocking serial port using the [`serialport`] crate (feature `serial`).
//! - [`LoopbackInterfaceString`] and [`LoopbackInterfaceBytes`]: scripted interfaces to test
//!   drivers without hardware.
//!
//! # Logging
//!
//! All traffic is logged with the [`log`] facade at `trace` level under the `labinstr` target.
//! Install any logger in your application to see it.
//!
//! # License
//!
//! Licensed under either of
//!
//! - Apache License, Version 2.0 ([LICENSE-APACHE](http://www.apache.org/licenses/LICENSE-2.0))
//! - MIT license ([LICENSE-MIT](http://opensource.org/licenses/MIT))
//!
//! at your option.

#![warn(missing_docs)]

mod instrument;
mod loopback;
#[cfg(feature = "serial")]
mod serial;
mod tcp_ip;

pub use instrument::{Instrument, InstrumentError, Port};
pub use loopback::{LoopbackInterfaceBytes, LoopbackInterfaceString};
#[cfg(feature = "serial")]
pub use serial::SerialInterface;
pub use tcp_ip::TcpIpInterface;

use std::time::{Duration, Instant};

use log::{trace, warn};

/// The `InstrumentInterface` trait defines how drivers talk to an instrument.
///
/// Implementors only need to provide [`InstrumentInterface::read_exact`] and
/// [`InstrumentInterface::write_raw`]. Terminator and timeout handling have sensible defaults
/// (`"\n"` and three seconds) that real interfaces override.
pub trait InstrumentInterface {
    /// Read exactly enough bytes from the instrument to fill `buf`.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError>;

    /// Write all bytes in `data` to the instrument and flush the interface.
    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError>;

    /// Get the terminator that is appended to commands and ends responses.
    fn get_terminator(&self) -> &str {
        "\n"
    }

    /// Set the terminator of the interface.
    ///
    /// The default implementation ignores the new terminator, interfaces that store one should
    /// override it.
    fn set_terminator(&mut self, _terminator: &str) {}

    /// Get the timeout after which reading a response is given up.
    fn get_timeout(&self) -> Duration {
        Duration::from_secs(3)
    }

    /// Discard any bytes the instrument sent that were not read yet.
    ///
    /// Byte oriented protocols use this before a query so that a stale byte is not mistaken for
    /// the answer. Interfaces without an input buffer keep the default no-op.
    fn clear_input_buffer(&mut self) -> Result<(), InstrumentError> {
        Ok(())
    }

    /// Write a string to the instrument as is, i.e., without appending the terminator.
    fn write(&mut self, data: &str) -> Result<(), InstrumentError> {
        trace!(target: "labinstr", "-> {data:?}");
        self.write_raw(data.as_bytes())
    }

    /// Send a command to the instrument.
    ///
    /// The terminator is appended to the command before it is written.
    ///
    /// # Arguments
    /// * `cmd` - The command to send, without terminator.
    fn sendcmd(&mut self, cmd: &str) -> Result<(), InstrumentError> {
        let msg = format!("{cmd}{}", self.get_terminator());
        self.write(&msg)
    }

    /// Read the response of the instrument until the terminator is found.
    ///
    /// The returned string is trimmed, i.e., the terminator and surrounding white space are
    /// removed. Invalid UTF-8 is replaced and reported as a warning. If the terminator is not
    /// seen before the timeout expires, [`InstrumentError::Timeout`] is returned.
    fn read_until_terminator(&mut self) -> Result<String, InstrumentError> {
        let terminator = self.get_terminator().as_bytes().to_vec();
        let timeout = self.get_timeout();
        let tic = Instant::now();

        let mut response: Vec<u8> = Vec::new();
        let mut single_buf = [0u8];
        let mut terminated = false;
        while tic.elapsed() < timeout {
            self.read_exact(&mut single_buf)?;
            response.push(single_buf[0]);
            if response.ends_with(&terminator) {
                terminated = true;
                break;
            }
        }

        if !terminated {
            return Err(InstrumentError::Timeout(timeout));
        }

        let text = match String::from_utf8(response) {
            Ok(text) => text,
            Err(e) => {
                warn!(target: "labinstr", "Received invalid UTF-8 data: {:?}", e.as_bytes());
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        trace!(target: "labinstr", "<- {text:?}");
        Ok(text.trim().to_string())
    }

    /// Query the instrument with a command and return the response as a String.
    ///
    /// A timeout while waiting for the answer is reported as [`InstrumentError::TimeoutQuery`]
    /// which contains the query that was sent.
    ///
    /// # Arguments
    /// * `cmd` - The command to send to the instrument for which we expect a response.
    fn query(&mut self, cmd: &str) -> Result<String, InstrumentError> {
        self.sendcmd(cmd)?;
        self.read_until_terminator().map_err(|e| match e {
            InstrumentError::Timeout(timeout) => InstrumentError::TimeoutQuery {
                query: cmd.to_string(),
                timeout,
            },
            e => e,
        })
    }

    /// Read one response and check that it equals the expected acknowledgment.
    ///
    /// # Arguments
    /// * `ack` - The acknowledgment the instrument should send, e.g., `"\u{6}"` or `"OK"`.
    fn check_acknowledgment(&mut self, ack: &str) -> Result<(), InstrumentError> {
        let resp = self.read_until_terminator()?;
        if resp == ack {
            Ok(())
        } else {
            Err(InstrumentError::NotAcknowledged(resp))
        }
    }

    /// Send a command that ends with an SCPI operation complete query (`*OPC?`) and block until
    /// the instrument answers with `1`.
    ///
    /// The call only returns once the instrument has processed all preceding commands, so it can
    /// be used to wait for a sweep or measurement to finish without a fixed delay. Any answer
    /// other than `1` is reported as [`InstrumentError::InstrumentStatus`].
    ///
    /// # Arguments
    /// * `cmd` - The full command including the completion query, e.g., `"INIT:IMM;*OPC?"`.
    fn query_opc(&mut self, cmd: &str) -> Result<(), InstrumentError> {
        let resp = self.query(cmd)?;
        match resp.trim_start_matches('+') {
            "1" => Ok(()),
            _ => Err(InstrumentError::InstrumentStatus(format!(
                "Operation complete query '{cmd}' returned '{resp}' instead of '1'"
            ))),
        }
    }

    /// Query the instrument and parse the response as comma separated floating point values.
    ///
    /// # Arguments
    /// * `cmd` - The query to send, e.g., `"TRACe:DATA? TRACe1"`.
    fn query_ascii_values(&mut self, cmd: &str) -> Result<Vec<f64>, InstrumentError> {
        let resp = self.query(cmd)?;
        parse_ascii_values(&resp)
    }
}

/// Parse a comma separated list of floating point values as sent by SCPI instruments.
///
/// Empty responses are an error, as are values that cannot be parsed.
pub fn parse_ascii_values(resp: &str) -> Result<Vec<f64>, InstrumentError> {
    if resp.trim().is_empty() {
        return Err(InstrumentError::ResponseParseError(resp.to_string()));
    }
    resp.split(',')
        .map(|val| {
            val.trim()
                .parse::<f64>()
                .map_err(|_| InstrumentError::ResponseParseError(resp.to_string()))
        })
        .collect()
}

/// Parse a boolean as returned by SCPI instruments.
///
/// Accepts `1`/`0` and `ON`/`OFF` in any case, surrounding white space is ignored.
pub fn parse_scpi_bool(resp: &str) -> Result<bool, InstrumentError> {
    match resp.trim().to_ascii_uppercase().as_str() {
        "1" | "+1" | "ON" => Ok(true),
        "0" | "+0" | "OFF" => Ok(false),
        _ => Err(InstrumentError::ResponseParseError(resp.to_string())),
    }
}
