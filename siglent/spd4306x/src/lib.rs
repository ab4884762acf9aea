//! A rust driver for the Siglent SPD4306X four channel DC power supply.
//!
//! The supply is used as a voltage and current source. Every channel can carry a ramp rate for
//! the voltage and for the current: if one is set, new setpoints are approached in small steps
//! instead of jumping right away.
//!
//! # Example
//!
//! ```no_run
//! use measurements::{Current, Voltage};
//! use labinstr::TcpIpInterface;
//! use siglent_spd4306x::Spd4306x;
//!
//! let interface = TcpIpInterface::try_new("192.168.0.50:5025").unwrap();
//! let mut inst = Spd4306x::try_new(interface).unwrap();
//! println!("{}", inst.get_name().unwrap());
//!
//! // Channel 2 (zero-indexed 1): ramp to 12 V with 0.5 V/s, 100 mA compliance
//! let mut ch2 = inst.get_channel(1).unwrap();
//! ch2.set_current(Current::from_milliamperes(100.0)).unwrap();
//! ch2.set_voltage_ramp_rate(Some(0.5)).unwrap();
//! ch2.set_voltage(Voltage::from_volts(12.0)).unwrap();
//! ch2.set_output(true).unwrap();
//! println!("Measured: {:?}", ch2.get_voltage_measured().unwrap());
//! ```

#![deny(warnings, missing_docs)]

use std::{
    fmt::Display,
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use labinstr::{InstrumentError, InstrumentInterface, parse_scpi_bool};
use log::debug;
use measurements::{Current, Voltage};

/// Number of channels of the SPD4306X.
const NUM_CHANNELS: usize = 4;

/// Maximum voltage in V and current in A per channel, as printed on the front panel.
const CHANNEL_LIMITS: [(f64, f64); NUM_CHANNELS] =
    [(15.0, 1.5), (30.0, 6.0), (30.0, 6.0), (15.0, 1.0)];

/// The regulation mode a channel is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegulationMode {
    /// The voltage setpoint is reached, the current follows the load.
    ConstantVoltage,
    /// The current limit is reached, the voltage follows the load.
    ConstantCurrent,
}

impl Display for RegulationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegulationMode::ConstantVoltage => write!(f, "Constant voltage"),
            RegulationMode::ConstantCurrent => write!(f, "Constant current"),
        }
    }
}

impl RegulationMode {
    fn from_cmd_str(resp: &str) -> Result<Self, InstrumentError> {
        match resp.trim() {
            "CV" => Ok(RegulationMode::ConstantVoltage),
            "CC" => Ok(RegulationMode::ConstantCurrent),
            _ => Err(InstrumentError::ResponseParseError(resp.to_string())),
        }
    }
}

/// A ramp rate converted into the step size and the delay between two steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ramp {
    /// Rate in units per second.
    pub rate: f64,
    /// Largest change of the setpoint in one step.
    pub step: f64,
    /// Time to wait between two steps.
    pub delay: Duration,
}

impl Ramp {
    /// Create a ramp for the given rate in units per second.
    ///
    /// The step size gets finer for slower rates, the delay is chosen such that the rate is
    /// kept on average.
    pub fn try_new(rate: f64) -> Result<Self, InstrumentError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(InstrumentError::InvalidArgument(format!(
                "Ramp rate must be positive, got {rate}"
            )));
        }
        let step = if rate < 0.01 {
            0.001
        } else if rate < 0.1 {
            0.01
        } else if rate < 1.0 {
            0.1
        } else {
            1.0
        };
        Ok(Ramp {
            rate,
            step,
            delay: Duration::from_secs_f64(step / rate),
        })
    }

    /// Intermediate setpoints from `from` to `to`, the last one being `to`.
    ///
    /// The points are evenly spaced and no two consecutive points differ by more than the step.
    pub fn setpoints(&self, from: f64, to: f64) -> Vec<f64> {
        let diff = to - from;
        if diff.abs() <= self.step {
            return vec![to];
        }
        let num_steps = (diff.abs() / self.step).ceil() as usize;
        (1..=num_steps)
            .map(|k| {
                if k == num_steps {
                    to
                } else {
                    from + diff * k as f64 / num_steps as f64
                }
            })
            .collect()
    }
}

/// Voltage and current ramps of one channel.
#[derive(Debug, Clone, Copy, Default)]
struct ChannelRamps {
    voltage: Option<Ramp>,
    current: Option<Ramp>,
}

/// A rust driver for the Siglent SPD4306X.
///
/// The instrument is usually connected via LAN, e.g., with a [`labinstr::TcpIpInterface`] on the
/// SCPI port 5025.
pub struct Spd4306x<T: InstrumentInterface> {
    interface: Arc<Mutex<T>>,
    ramps: Arc<Mutex<[ChannelRamps; NUM_CHANNELS]>>,
    channels: Vec<usize>,
}

impl<T: InstrumentInterface> Spd4306x<T> {
    /// Create a new SPD4306X instance with the given instrument interface.
    ///
    /// All four channels are configured.
    pub fn try_new(interface: T) -> Result<Self, InstrumentError> {
        let mut intf = interface;
        intf.set_terminator("\n");
        Ok(Spd4306x {
            interface: Arc::new(Mutex::new(intf)),
            ramps: Arc::new(Mutex::new([ChannelRamps::default(); NUM_CHANNELS])),
            channels: (0..NUM_CHANNELS).collect(),
        })
    }

    /// Restrict the driver to a subset of the channels, e.g., if only some are wired up.
    ///
    /// Channels are zero-indexed. Only configured channels can be retrieved with
    /// [`Spd4306x::get_channel`] and switched with [`Spd4306x::set_output_all`].
    pub fn set_channels(&mut self, channels: &[usize]) -> Result<(), InstrumentError> {
        if let Some(&idx) = channels.iter().find(|&&idx| idx >= NUM_CHANNELS) {
            return Err(InstrumentError::ChannelIndexOutOfRange {
                idx,
                nof_channels: NUM_CHANNELS,
            });
        }
        let mut channels = channels.to_vec();
        channels.sort_unstable();
        channels.dedup();
        self.channels = channels;
        Ok(())
    }

    /// Get a new channel with a given index.
    ///
    /// Please note that channels are zero-indexed, i.e., index 0 is `CH1` on the front panel.
    /// An index that exists on the supply but is not part of [`Spd4306x::set_channels`] is an
    /// [`InstrumentError::InvalidArgument`].
    pub fn get_channel(&mut self, idx: usize) -> Result<Channel<T>, InstrumentError> {
        if idx >= NUM_CHANNELS {
            return Err(InstrumentError::ChannelIndexOutOfRange {
                idx,
                nof_channels: NUM_CHANNELS,
            });
        }
        if !self.channels.contains(&idx) {
            return Err(InstrumentError::InvalidArgument(format!(
                "Channel {idx} is not configured, configured channels are {:?}",
                self.channels
            )));
        }
        Ok(Channel::new(
            idx,
            Arc::clone(&self.interface),
            Arc::clone(&self.ramps),
        ))
    }

    /// Query the identification string of the supply.
    pub fn get_name(&mut self) -> Result<String, InstrumentError> {
        self.query("*IDN?")
    }

    /// Reset the supply to its default state.
    pub fn reset(&mut self) -> Result<(), InstrumentError> {
        self.sendcmd("*RST")
    }

    /// Clear the status registers and the error queue.
    pub fn clear_status(&mut self) -> Result<(), InstrumentError> {
        self.sendcmd("*CLS")
    }

    /// Pop the oldest entry of the error queue, e.g., `0, No error`.
    pub fn get_error(&mut self) -> Result<String, InstrumentError> {
        self.query("SYST:ERR?")
    }

    /// Switch the outputs of all configured channels on or off.
    pub fn set_output_all(&mut self, state: bool) -> Result<(), InstrumentError> {
        let channels = self.channels.clone();
        for idx in channels {
            self.get_channel(idx)?.set_output(state)?;
        }
        Ok(())
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
}

impl<T: InstrumentInterface> Clone for Spd4306x<T> {
    fn clone(&self) -> Self {
        Self {
            interface: Arc::clone(&self.interface),
            ramps: Arc::clone(&self.ramps),
            channels: self.channels.clone(),
        }
    }
}

/// Channel structure representing a single output of the SPD4306X.
///
/// Ramp rates are stored on the instrument, so all handles of the same channel share them.
pub struct Channel<T: InstrumentInterface> {
    idx: usize,
    interface: Arc<Mutex<T>>,
    ramps: Arc<Mutex<[ChannelRamps; NUM_CHANNELS]>>,
}

impl<T: InstrumentInterface> Channel<T> {
    /// Get the voltage setpoint.
    pub fn get_voltage(&mut self) -> Result<Voltage, InstrumentError> {
        let val = self.query_f64("SOUR:VOLT:SET?")?;
        Ok(Voltage::from_volts(val))
    }

    /// Set the voltage setpoint.
    ///
    /// With a voltage ramp rate set, the present setpoint is read first and the new one is
    /// approached in steps. This call blocks until the ramp is done.
    pub fn set_voltage(&mut self, voltage: Voltage) -> Result<(), InstrumentError> {
        let value = voltage.as_volts();
        let (v_max, _) = CHANNEL_LIMITS[self.idx];
        check_range(value, v_max)?;
        match self.ramps().voltage {
            Some(ramp) => {
                let present = self.get_voltage()?.as_volts();
                self.ramp_to("SOUR:VOLT", present, value, ramp)
            }
            None => self.sendcmd_f64("SOUR:VOLT", value),
        }
    }

    /// Get the current setpoint.
    pub fn get_current(&mut self) -> Result<Current, InstrumentError> {
        let val = self.query_f64("SOUR:CURR:SET?")?;
        Ok(Current::from_amperes(val))
    }

    /// Set the current setpoint, i.e., the current limit when used as voltage source.
    ///
    /// Ramps the same way as [`Channel::set_voltage`] if a current ramp rate is set.
    pub fn set_current(&mut self, current: Current) -> Result<(), InstrumentError> {
        let value = current.as_amperes();
        let (_, i_max) = CHANNEL_LIMITS[self.idx];
        check_range(value, i_max)?;
        match self.ramps().current {
            Some(ramp) => {
                let present = self.get_current()?.as_amperes();
                self.ramp_to("SOUR:CURR", present, value, ramp)
            }
            None => self.sendcmd_f64("SOUR:CURR", value),
        }
    }

    /// Measure the output voltage.
    pub fn get_voltage_measured(&mut self) -> Result<Voltage, InstrumentError> {
        let val = self.query_f64("MEAS:VOLT?")?;
        Ok(Voltage::from_volts(val))
    }

    /// Measure the output current.
    pub fn get_current_measured(&mut self) -> Result<Current, InstrumentError> {
        let val = self.query_f64("MEAS:CURR?")?;
        Ok(Current::from_amperes(val))
    }

    /// Get whether the output is on.
    pub fn get_output(&mut self) -> Result<bool, InstrumentError> {
        let resp = self.query("OUTP?")?;
        parse_scpi_bool(&resp)
    }

    /// Switch the output on or off.
    pub fn set_output(&mut self, state: bool) -> Result<(), InstrumentError> {
        let cmd = format!("OUTP CH{},{}", self.idx + 1, u8::from(state));
        self.interface
            .lock()
            .expect("Mutex should not be poisoned")
            .sendcmd(&cmd)
    }

    /// Get whether the channel regulates the voltage or the current.
    pub fn get_regulation_mode(&mut self) -> Result<RegulationMode, InstrumentError> {
        let resp = self.query("MEAS:RUN:MODE?")?;
        RegulationMode::from_cmd_str(&resp)
    }

    /// Get the voltage ramp rate in V/s, `None` if voltages are set right away.
    pub fn get_voltage_ramp_rate(&self) -> Option<f64> {
        self.ramps().voltage.map(|ramp| ramp.rate)
    }

    /// Set the voltage ramp rate in V/s, or `None` to set voltages right away.
    pub fn set_voltage_ramp_rate(&mut self, rate: Option<f64>) -> Result<(), InstrumentError> {
        let ramp = rate.map(Ramp::try_new).transpose()?;
        self.ramps
            .lock()
            .expect("Mutex should not be poisoned")[self.idx]
            .voltage = ramp;
        Ok(())
    }

    /// Get the current ramp rate in A/s, `None` if currents are set right away.
    pub fn get_current_ramp_rate(&self) -> Option<f64> {
        self.ramps().current.map(|ramp| ramp.rate)
    }

    /// Set the current ramp rate in A/s, or `None` to set currents right away.
    pub fn set_current_ramp_rate(&mut self, rate: Option<f64>) -> Result<(), InstrumentError> {
        let ramp = rate.map(Ramp::try_new).transpose()?;
        self.ramps
            .lock()
            .expect("Mutex should not be poisoned")[self.idx]
            .current = ramp;
        Ok(())
    }

    /// Get a new channel for the given instrument interface.
    ///
    /// This function can only be called from inside of the `Spd4306x` struct.
    fn new(
        idx: usize,
        interface: Arc<Mutex<T>>,
        ramps: Arc<Mutex<[ChannelRamps; NUM_CHANNELS]>>,
    ) -> Self {
        Channel {
            idx,
            interface,
            ramps,
        }
    }

    fn ramps(&self) -> ChannelRamps {
        self.ramps.lock().expect("Mutex should not be poisoned")[self.idx]
    }

    /// Step from `from` to `to`, waiting the ramp delay between two setpoints.
    fn ramp_to(
        &mut self,
        cmd: &str,
        from: f64,
        to: f64,
        ramp: Ramp,
    ) -> Result<(), InstrumentError> {
        let setpoints = ramp.setpoints(from, to);
        debug!(
            "CH{}: ramping {cmd} from {from} to {to} in {} step(s)",
            self.idx + 1,
            setpoints.len()
        );
        for (it, value) in setpoints.iter().enumerate() {
            if it > 0 {
                thread::sleep(ramp.delay);
            }
            self.sendcmd_f64(cmd, *value)?;
        }
        Ok(())
    }

    /// Send a setpoint with six decimals, e.g., `SOUR:VOLT CH1,1.500000`.
    fn sendcmd_f64(&mut self, cmd: &str, value: f64) -> Result<(), InstrumentError> {
        let cmd = format!("{cmd} CH{},{value:.6}", self.idx + 1);
        self.interface
            .lock()
            .expect("Mutex should not be poisoned")
            .sendcmd(&cmd)
    }

    /// Send a query to this channel, the channel is appended as ` CHn`.
    fn query(&mut self, cmd: &str) -> Result<String, InstrumentError> {
        self.interface
            .lock()
            .expect("Mutex should not be poisoned")
            .query(&format!("{cmd} CH{}", self.idx + 1))
    }

    fn query_f64(&mut self, cmd: &str) -> Result<f64, InstrumentError> {
        let resp = self.query(cmd)?;
        resp.trim()
            .parse::<f64>()
            .map_err(|_| InstrumentError::ResponseParseError(resp))
    }
}

impl<T: InstrumentInterface> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            idx: self.idx,
            interface: Arc::clone(&self.interface),
            ramps: Arc::clone(&self.ramps),
        }
    }
}

/// Check that a setpoint is between zero and the channel maximum.
fn check_range(value: f64, max: f64) -> Result<(), InstrumentError> {
    if !(0.0..=max).contains(&value) {
        return Err(InstrumentError::FloatValueOutOfRange {
            value,
            min: 0.0,
            max,
        });
    }
    Ok(())
}
