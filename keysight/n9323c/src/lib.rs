//! A rust driver for the Keysight N9323C spectrum analyzer.
//!
//! The driver covers the frequency, bandwidth, sweep, and averaging settings of the analyzer and
//! provides a segmented acquisition. The N9323C always records 461 points per sweep, so a wide
//! window would be sampled coarsely. [`N9323c::acquire`] instead splits the window into segments
//! of at most 500 MHz, sweeps each one, and stitches the results into one [`StitchedTrace`].
//!
//! # Example
//!
//! ```no_run
//! use measurements::Frequency;
//! use keysight_n9323c::{N9323c, TcpIpInterfaceN9323c};
//!
//! let interface = TcpIpInterfaceN9323c::simple("192.168.0.123").unwrap();
//! let mut sa = N9323c::try_new(interface).unwrap();
//! println!("{}", sa.get_name().unwrap());
//!
//! // 1.2 GHz wide window: acquired as three segments with 1383 points in total
//! let trace = sa
//!     .acquire(
//!         Frequency::from_hertz(0.0),
//!         Frequency::from_gigahertz(1.2),
//!         Frequency::from_kilohertz(100.0),
//!         true,
//!         10,
//!     )
//!     .unwrap();
//! for (freq, power) in trace.iter().take(5) {
//!     println!("{freq} Hz: {power} dBm");
//! }
//! ```

#![deny(warnings, missing_docs)]

mod acquire;
mod error;
mod interface;
mod sweep;

pub use acquire::{
    DataProcessor, SweepAcquirer, SweepControl, SweepSession, SweepStep, TraceCollector,
};
pub use error::AcquisitionError;
pub use interface::TcpIpInterfaceN9323c;
pub use sweep::{
    MAX_SEGMENTS, N9323C_SWEEP_POINTS, Segment, StitchedTrace, SweepLimits, SweepRequest,
};

use std::{
    fmt::Display,
    sync::{Arc, Mutex},
    time::Duration,
};

use labinstr::{InstrumentError, InstrumentInterface, parse_scpi_bool};
use log::debug;
use measurements::Frequency;

/// How the analyzer averages traces.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AverageType {
    /// Average the logarithmic (dB) values.
    LogPower,
    /// Average the voltage envelope.
    Voltage,
    /// Average the linear power, then convert to dB. Set when the driver is created.
    #[default]
    Power,
}

impl AverageType {
    /// SCPI argument for this average type.
    pub fn as_str(&self) -> &'static str {
        match self {
            AverageType::LogPower => "LOGPower",
            AverageType::Voltage => "VOLTage",
            AverageType::Power => "POWer",
        }
    }

    /// Parse the average type from the short or long SCPI form.
    pub fn from_cmd_str(resp: &str) -> Result<Self, InstrumentError> {
        let upper = resp.trim().to_ascii_uppercase();
        if upper.starts_with("LOGP") {
            Ok(AverageType::LogPower)
        } else if upper.starts_with("VOLT") {
            Ok(AverageType::Voltage)
        } else if upper.starts_with("POW") {
            Ok(AverageType::Power)
        } else {
            Err(InstrumentError::ResponseParseError(resp.to_string()))
        }
    }
}

impl Display for AverageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AverageType::LogPower => write!(f, "Log-Power"),
            AverageType::Voltage => write!(f, "Voltage"),
            AverageType::Power => write!(f, "Power"),
        }
    }
}

/// A rust driver for the Keysight N9323C.
///
/// The interface is shared behind a mutex, so the driver can be cloned cheaply and used from
/// several threads. An acquisition holds the mutex for its whole duration: other clones wait
/// until the analyzer is restored.
pub struct N9323c<T: InstrumentInterface> {
    interface: Arc<Mutex<T>>,
    acquirer: SweepAcquirer,
}

impl<T: InstrumentInterface> N9323c<T> {
    /// Create a new N9323C instance with the given instrument interface.
    ///
    /// The average type is set to [`AverageType::Power`] upon initialization.
    ///
    /// # Arguments
    /// * `interface` - An instrument interface that implements the [`InstrumentInterface`] trait.
    pub fn try_new(interface: T) -> Result<Self, InstrumentError> {
        let mut intf = interface;
        intf.set_terminator("\n");
        let mut instrument = N9323c {
            interface: Arc::new(Mutex::new(intf)),
            acquirer: SweepAcquirer::default(),
        };
        instrument.set_average_type(AverageType::Power)?;
        Ok(instrument)
    }

    /// Replace the limits used for planning segmented acquisitions.
    ///
    /// The defaults match the N9323C, see [`SweepLimits`].
    pub fn set_sweep_limits(&mut self, limits: SweepLimits) {
        self.acquirer = SweepAcquirer::new(limits);
    }

    /// Get the limits used for planning segmented acquisitions.
    pub fn get_sweep_limits(&self) -> SweepLimits {
        *self.acquirer.limits()
    }

    /// Query the identification string of the analyzer.
    pub fn get_name(&mut self) -> Result<String, InstrumentError> {
        self.query("*IDN?")
    }

    /// Get the center frequency.
    pub fn get_center_frequency(&mut self) -> Result<Frequency, InstrumentError> {
        self.query_frequency("SENSe:FREQuency:CENTer?")
    }

    /// Set the center frequency.
    pub fn set_center_frequency(&mut self, freq: Frequency) -> Result<(), InstrumentError> {
        self.sendcmd(&format!("SENSe:FREQuency:CENTer {}", freq.as_hertz()))
    }

    /// Get the frequency span.
    pub fn get_span(&mut self) -> Result<Frequency, InstrumentError> {
        self.query_frequency("SENSe:FREQuency:SPAN?")
    }

    /// Set the frequency span.
    pub fn set_span(&mut self, span: Frequency) -> Result<(), InstrumentError> {
        self.sendcmd(&format!("SENSe:FREQuency:SPAN {}", span.as_hertz()))
    }

    /// Get the start frequency.
    pub fn get_start_frequency(&mut self) -> Result<Frequency, InstrumentError> {
        self.query_frequency("FREQuency:STARt?")
    }

    /// Set the start frequency.
    pub fn set_start_frequency(&mut self, freq: Frequency) -> Result<(), InstrumentError> {
        self.sendcmd(&format!("FREQuency:STARt {}", freq.as_hertz()))
    }

    /// Get the stop frequency.
    pub fn get_stop_frequency(&mut self) -> Result<Frequency, InstrumentError> {
        self.query_frequency("FREQuency:STOP?")
    }

    /// Set the stop frequency.
    pub fn set_stop_frequency(&mut self, freq: Frequency) -> Result<(), InstrumentError> {
        self.sendcmd(&format!("FREQuency:STOP {}", freq.as_hertz()))
    }

    /// Get the resolution bandwidth.
    pub fn get_resolution_bandwidth(&mut self) -> Result<Frequency, InstrumentError> {
        self.query_frequency("SENSe:BANDwidth:RESolution?")
    }

    /// Set the resolution bandwidth.
    ///
    /// The bandwidth must be within the limits of [`SweepLimits`], by default 10 Hz to 3 MHz.
    pub fn set_resolution_bandwidth(&mut self, rbw: Frequency) -> Result<(), InstrumentError> {
        let limits = self.acquirer.limits();
        check_rbw(rbw, limits)?;
        self.sendcmd(&format!("SENSe:BANDwidth:RESolution {}", rbw.as_hertz()))
    }

    /// Get the sweep time.
    pub fn get_sweep_time(&mut self) -> Result<Duration, InstrumentError> {
        let resp = self.query("SENSe:SWEep:TIME?")?;
        let secs = parse_f64(&resp)?;
        Duration::try_from_secs_f64(secs).map_err(|_| InstrumentError::ResponseParseError(resp))
    }

    /// Set the sweep time.
    ///
    /// As the number of points is fixed, a longer sweep time integrates longer per point.
    /// Automatic sweep time is switched off first, otherwise the analyzer ignores the value.
    pub fn set_sweep_time(&mut self, time: Duration) -> Result<(), InstrumentError> {
        self.set_auto_sweep_time(false)?;
        self.sendcmd(&format!("SENSe:SWEep:TIME {}", time.as_secs_f64()))
    }

    /// Get whether the sweep time is chosen automatically.
    pub fn get_auto_sweep_time(&mut self) -> Result<bool, InstrumentError> {
        let resp = self.query("SENSe:SWEep:TIME:AUTO?")?;
        parse_scpi_bool(&resp)
    }

    /// Let the analyzer choose the sweep time automatically, or not.
    pub fn set_auto_sweep_time(&mut self, auto: bool) -> Result<(), InstrumentError> {
        self.sendcmd(&format!("SENSe:SWEep:TIME:AUTO {}", u8::from(auto)))
    }

    /// Get the number of points per sweep, which is fixed to 461 on the N9323C.
    pub fn get_sweep_points(&self) -> usize {
        self.acquirer.limits().sample_count
    }

    /// The number of sweep points cannot be changed on the N9323C, this always fails.
    pub fn set_sweep_points(&mut self, _points: usize) -> Result<(), InstrumentError> {
        Err(InstrumentError::CommandNotSupported(format!(
            "Sweep points are fixed to {N9323C_SWEEP_POINTS} on the N9323C"
        )))
    }

    /// Get whether trace averaging is enabled.
    pub fn get_averaging_enabled(&mut self) -> Result<bool, InstrumentError> {
        let resp = self.query(":AVERage:TRACe1:STATe?")?;
        parse_scpi_bool(&resp)
    }

    /// Enable or disable trace averaging.
    pub fn set_averaging_enabled(&mut self, enabled: bool) -> Result<(), InstrumentError> {
        self.sendcmd(&format!(":AVERage:TRACe1:STATe {}", u8::from(enabled)))
    }

    /// Get the number of averages.
    pub fn get_average_count(&mut self) -> Result<u32, InstrumentError> {
        let resp = self.query(":AVERage:TRACe1:COUNt?")?;
        parse_u32(&resp)
    }

    /// Set the number of averages, at least one.
    pub fn set_average_count(&mut self, count: u32) -> Result<(), InstrumentError> {
        if count == 0 {
            return Err(InstrumentError::IntValueOutOfRange {
                value: 0,
                min: 1,
                max: i64::from(u32::MAX),
            });
        }
        self.sendcmd(&format!(":AVERage:TRACe1:COUNt {count}"))
    }

    /// Get the average type.
    pub fn get_average_type(&mut self) -> Result<AverageType, InstrumentError> {
        let resp = self.query(":AVERage:TYPE?")?;
        AverageType::from_cmd_str(&resp)
    }

    /// Set the average type.
    pub fn set_average_type(&mut self, avg_type: AverageType) -> Result<(), InstrumentError> {
        self.sendcmd(&format!(":AVERage:TYPE {}", avg_type.as_str()))
    }

    /// Throw away the accumulated averages and start averaging anew.
    pub fn restart_averaging(&mut self) -> Result<(), InstrumentError> {
        self.sendcmd(":AVERage:TRACe1:CLEar")
    }

    /// Acquire a frequency window as one stitched trace.
    ///
    /// See [`SweepAcquirer::acquire`] for the procedure and the possible errors. The analyzer is
    /// locked for the whole acquisition.
    ///
    /// # Arguments
    /// * `start` - First frequency of the window.
    /// * `stop` - Last frequency of the window.
    /// * `rbw` - Resolution bandwidth of all segments.
    /// * `average_enabled` - Whether to average every segment.
    /// * `average_count` - Number of averages per segment.
    pub fn acquire(
        &mut self,
        start: Frequency,
        stop: Frequency,
        rbw: Frequency,
        average_enabled: bool,
        average_count: u32,
    ) -> Result<StitchedTrace, AcquisitionError> {
        let request = SweepRequest::new(start, stop, rbw, average_enabled, average_count);
        self.acquire_request(&request)
    }

    /// Acquire the window of a [`SweepRequest`] as one stitched trace.
    pub fn acquire_request(
        &mut self,
        request: &SweepRequest,
    ) -> Result<StitchedTrace, AcquisitionError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        let mut control = AnalyzerControl { intf: &mut *intf };
        self.acquirer.acquire(request, &mut control)
    }

    /// Acquire the window of a [`SweepRequest`] and hand the trace to a data processor.
    ///
    /// The processed form returned by [`DataProcessor::get_all`] is returned instead of the raw
    /// trace.
    pub fn acquire_with<D: DataProcessor>(
        &mut self,
        request: &SweepRequest,
        processor: &mut D,
    ) -> Result<D::Output, AcquisitionError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        let mut control = AnalyzerControl { intf: &mut *intf };
        self.acquirer.acquire_with(request, &mut control, processor)
    }

    /// Acquire the window that is currently set on the analyzer.
    ///
    /// Start, stop, resolution bandwidth, and averaging are read from the analyzer first, all
    /// while holding the lock, and then acquired with [`N9323c::acquire_request`].
    pub fn get_data(&mut self) -> Result<StitchedTrace, AcquisitionError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        let mut control = AnalyzerControl { intf: &mut *intf };
        let request = control.current_request()?;
        debug!("Acquiring the current window: {request:?}");
        self.acquirer.acquire(&request, &mut control)
    }

    /// Send a command to the instrument.
    fn sendcmd(&mut self, cmd: &str) -> Result<(), InstrumentError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        intf.sendcmd(cmd)
    }

    /// Query the instrument with a command and return the response as a String.
    fn query(&mut self, cmd: &str) -> Result<String, InstrumentError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        intf.query(cmd)
    }

    /// Query a value in Hz and return it as a frequency.
    fn query_frequency(&mut self, cmd: &str) -> Result<Frequency, InstrumentError> {
        let resp = self.query(cmd)?;
        Ok(Frequency::from_hertz(parse_f64(&resp)?))
    }
}

impl<T: InstrumentInterface> Clone for N9323c<T> {
    fn clone(&self) -> Self {
        Self {
            interface: Arc::clone(&self.interface),
            acquirer: self.acquirer,
        }
    }
}

/// The N9323C seen as a [`SweepControl`], borrowed from the locked interface.
struct AnalyzerControl<'a, T: InstrumentInterface> {
    intf: &'a mut T,
}

impl<T: InstrumentInterface> AnalyzerControl<'_, T> {
    /// Build a request from the window and averaging currently set on the analyzer.
    fn current_request(&mut self) -> Result<SweepRequest, InstrumentError> {
        let start = parse_f64(&self.intf.query("FREQuency:STARt?")?)?;
        let stop = parse_f64(&self.intf.query("FREQuency:STOP?")?)?;
        let rbw = parse_f64(&self.intf.query("SENSe:BANDwidth:RESolution?")?)?;
        let average_enabled = parse_scpi_bool(&self.intf.query(":AVERage:TRACe1:STATe?")?)?;
        let average_count = parse_u32(&self.intf.query(":AVERage:TRACe1:COUNt?")?)?;
        Ok(SweepRequest::new(
            Frequency::from_hertz(start),
            Frequency::from_hertz(stop),
            Frequency::from_hertz(rbw),
            average_enabled,
            average_count,
        ))
    }
}

impl<T: InstrumentInterface> SweepControl for AnalyzerControl<'_, T> {
    fn set_frequency_window(
        &mut self,
        start: Frequency,
        stop: Frequency,
    ) -> Result<(), InstrumentError> {
        self.intf
            .sendcmd(&format!("FREQ:STAR {}", start.as_hertz()))?;
        self.intf.sendcmd(&format!("FREQ:STOP {}", stop.as_hertz()))
    }

    fn set_continuous_sweep(&mut self, enabled: bool) -> Result<(), InstrumentError> {
        let state = if enabled { "ON" } else { "OFF" };
        self.intf.sendcmd(&format!("INIT:CONT {state}"))
    }

    fn trigger_single_sweep_and_wait(&mut self) -> Result<(), InstrumentError> {
        self.intf.query_opc("*CLS;INIT:IMM;*OPC?")
    }

    fn set_resolution_bandwidth(&mut self, rbw: Frequency) -> Result<(), InstrumentError> {
        self.intf
            .sendcmd(&format!("SENSe:BANDwidth:RESolution {}", rbw.as_hertz()))
    }

    fn set_averaging(&mut self, enabled: bool, count: u32) -> Result<(), InstrumentError> {
        self.intf
            .sendcmd(&format!(":AVERage:TRACe1:STATe {}", u8::from(enabled)))?;
        self.intf.sendcmd(&format!(":AVERage:TRACe1:COUNt {count}"))
    }

    fn restart_averaging(&mut self) -> Result<(), InstrumentError> {
        self.intf.sendcmd(":AVERage:TRACe1:CLEar")
    }

    fn read_trace(&mut self) -> Result<Vec<f64>, InstrumentError> {
        self.intf.query_ascii_values("TRACe:DATA? TRACe1")
    }
}

/// Check that a resolution bandwidth is within the limits.
fn check_rbw(rbw: Frequency, limits: &SweepLimits) -> Result<(), InstrumentError> {
    let value = rbw.as_hertz();
    let min = limits.min_resolution_bandwidth.as_hertz();
    let max = limits.max_resolution_bandwidth.as_hertz();
    if !(min..=max).contains(&value) {
        return Err(InstrumentError::FloatValueOutOfRange { value, min, max });
    }
    Ok(())
}

/// Parse a floating point response.
fn parse_f64(resp: &str) -> Result<f64, InstrumentError> {
    resp.trim()
        .parse::<f64>()
        .map_err(|_| InstrumentError::ResponseParseError(resp.to_string()))
}

/// Parse an unsigned integer response, the analyzer may send it with a leading `+`.
fn parse_u32(resp: &str) -> Result<u32, InstrumentError> {
    resp.trim()
        .trim_start_matches('+')
        .parse::<u32>()
        .map_err(|_| InstrumentError::ResponseParseError(resp.to_string()))
}
