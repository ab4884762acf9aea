//! A rust driver for a DC SMU switch box.
//!
//! The switch box routes sixteen ports to the sense, force, ground, or BNC contacts, or leaves
//! them open. It talks a single byte protocol over a serial port: the upper three bits carry the
//! position and the lower five bits the port index.
//!
//! # Example
//!
//! ```no_run
//! use dc_switchbox::{DcSwitchBox, SerialInterfaceSwitchBox, SwitchPosition};
//!
//! let serial_inst = SerialInterfaceSwitchBox::simple("/dev/ttyUSB0").unwrap();
//! let mut sbox = DcSwitchBox::try_new(serial_inst).unwrap();
//!
//! // Ground everything, then route port 2 to force
//! sbox.set_all_ports(SwitchPosition::Ground).unwrap();
//! let mut port2 = sbox.get_port_by_name("Port2").unwrap();
//! port2.set_position(SwitchPosition::Force).unwrap();
//!
//! for (name, pos) in sbox.get_all_positions().unwrap() {
//!     println!("{name}: {pos}");
//! }
//! ```

#![deny(warnings, missing_docs)]

mod interface;

pub use interface::SerialInterfaceSwitchBox;

use std::{
    fmt::Display,
    sync::{Arc, Mutex},
};

use labinstr::{InstrumentError, InstrumentInterface};
use log::debug;

/// Maximum number of ports, the index is sent in five bits.
pub const MAX_PORTS: usize = 32;

/// Default number of attempts to read back a position.
pub const DEFAULT_RETRIES: usize = 100;

/// Query byte prefix, the port index is or-ed into the lower five bits.
const QUERY_PREFIX: u8 = 0xE0;

/// The positions a port can be switched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchPosition {
    /// Connected to the SMU sense line.
    Sense,
    /// Connected to the SMU force line.
    Force,
    /// Connected to ground.
    Ground,
    /// Connected to the BNC feedthrough.
    Bnc,
    /// Not connected.
    Open,
}

impl SwitchPosition {
    /// All positions in the order of their wire index.
    pub const ALL: [SwitchPosition; 5] = [
        SwitchPosition::Sense,
        SwitchPosition::Force,
        SwitchPosition::Ground,
        SwitchPosition::Bnc,
        SwitchPosition::Open,
    ];

    /// Index of the position as sent to the box.
    pub fn wire_index(&self) -> u8 {
        match self {
            SwitchPosition::Sense => 0,
            SwitchPosition::Force => 1,
            SwitchPosition::Ground => 2,
            SwitchPosition::Bnc => 3,
            SwitchPosition::Open => 4,
        }
    }

    /// Position for a wire index, `None` if the index is not a valid position.
    pub fn from_wire_index(idx: u8) -> Option<Self> {
        Self::ALL.get(usize::from(idx)).copied()
    }
}

impl Display for SwitchPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SwitchPosition::Sense => write!(f, "Sense"),
            SwitchPosition::Force => write!(f, "Force"),
            SwitchPosition::Ground => write!(f, "Ground"),
            SwitchPosition::Bnc => write!(f, "BNC"),
            SwitchPosition::Open => write!(f, "Open"),
        }
    }
}

/// Port names of the standard box, in the order of their wire index.
pub fn default_port_names() -> Vec<String> {
    (1..=9)
        .chain(13..=16)
        .chain(10..=12)
        .map(|num| format!("Port{num}"))
        .collect()
}

/// A rust driver for the DC SMU switch box.
///
/// Ports are addressed either by their zero-based wire index or by their name.
pub struct DcSwitchBox<T: InstrumentInterface> {
    interface: Arc<Mutex<T>>,
    ports: Vec<String>,
    retries: usize,
}

impl<T: InstrumentInterface> DcSwitchBox<T> {
    /// Create a new switch box instance with the sixteen standard ports.
    ///
    /// See [`default_port_names`] for the port names.
    ///
    /// # Arguments
    /// * `interface` - An instrument interface that implements the [`InstrumentInterface`] trait.
    pub fn try_new(interface: T) -> Result<Self, InstrumentError> {
        Self::with_ports(interface, default_port_names())
    }

    /// Create a new switch box instance with custom port names.
    ///
    /// The position of a name in `ports` is its wire index, so at most [`MAX_PORTS`] names are
    /// allowed. Names must be unique.
    pub fn with_ports(interface: T, ports: Vec<String>) -> Result<Self, InstrumentError> {
        if ports.is_empty() || ports.len() > MAX_PORTS {
            return Err(InstrumentError::IntValueOutOfRange {
                value: ports.len() as i64,
                min: 1,
                max: MAX_PORTS as i64,
            });
        }
        if let Some(dup) = ports
            .iter()
            .enumerate()
            .find(|(it, name)| ports[..*it].contains(*name))
            .map(|(_, name)| name)
        {
            return Err(InstrumentError::InvalidArgument(format!(
                "Port name {dup} is used more than once"
            )));
        }

        let mut intf = interface;
        intf.set_terminator("");
        Ok(DcSwitchBox {
            interface: Arc::new(Mutex::new(intf)),
            ports,
            retries: DEFAULT_RETRIES,
        })
    }

    /// The switch box has no identification query, this returns a fixed name.
    pub fn get_name(&self) -> String {
        "DC SMU Switch Box".to_string()
    }

    /// Names of all ports in the order of their wire index.
    pub fn get_port_names(&self) -> &[String] {
        &self.ports
    }

    /// Number of attempts to read back a position before giving up.
    pub fn get_retries(&self) -> usize {
        self.retries
    }

    /// Set the number of attempts to read back a position, at least one.
    ///
    /// Only ports retrieved after this call use the new value.
    pub fn set_retries(&mut self, retries: usize) -> Result<(), InstrumentError> {
        if retries == 0 {
            return Err(InstrumentError::IntValueOutOfRange {
                value: 0,
                min: 1,
                max: i64::MAX,
            });
        }
        self.retries = retries;
        Ok(())
    }

    /// Get a port by its zero-based wire index.
    pub fn get_port(&mut self, idx: usize) -> Result<SwitchPort<T>, InstrumentError> {
        if idx >= self.ports.len() {
            return Err(InstrumentError::ChannelIndexOutOfRange {
                idx,
                nof_channels: self.ports.len(),
            });
        }
        Ok(SwitchPort::new(
            idx as u8,
            self.ports[idx].clone(),
            self.retries,
            Arc::clone(&self.interface),
        ))
    }

    /// Get a port by its name, e.g., `"Port13"`.
    pub fn get_port_by_name(&mut self, name: &str) -> Result<SwitchPort<T>, InstrumentError> {
        match self.ports.iter().position(|port| port == name) {
            Some(idx) => self.get_port(idx),
            None => Err(InstrumentError::InvalidArgument(format!(
                "No port with name {name}"
            ))),
        }
    }

    /// Switch every port to the given position.
    ///
    /// Each port is read back first and only switched if it is somewhere else. Ports are visited
    /// as `Port1` to `Port16`, followed by any other ports in the order of their wire index.
    pub fn set_all_ports(&mut self, position: SwitchPosition) -> Result<(), InstrumentError> {
        for idx in self.ordered_indices() {
            let mut port = self.get_port(idx)?;
            if port.get_position()? != position {
                port.set_position(position)?;
            }
        }
        Ok(())
    }

    /// Read the position of every port, in the same order as [`DcSwitchBox::set_all_ports`].
    pub fn get_all_positions(&mut self) -> Result<Vec<(String, SwitchPosition)>, InstrumentError> {
        self.ordered_indices()
            .into_iter()
            .map(|idx| {
                let mut port = self.get_port(idx)?;
                let pos = port.get_position()?;
                Ok((port.get_name().to_string(), pos))
            })
            .collect()
    }

    /// Wire indices with `Port1` to `Port16` first, then all remaining ports.
    fn ordered_indices(&self) -> Vec<usize> {
        let named = (1..=16).filter_map(|num| {
            let name = format!("Port{num}");
            self.ports.iter().position(|port| *port == name)
        });
        let mut order: Vec<usize> = named.collect();
        let rest: Vec<usize> = (0..self.ports.len())
            .filter(|idx| !order.contains(idx))
            .collect();
        order.extend(rest);
        order
    }
}

impl<T: InstrumentInterface> Clone for DcSwitchBox<T> {
    fn clone(&self) -> Self {
        Self {
            interface: Arc::clone(&self.interface),
            ports: self.ports.clone(),
            retries: self.retries,
        }
    }
}

/// A single port of the switch box.
///
/// Ports can only be created through the [`DcSwitchBox`], which ensures that the index is valid.
pub struct SwitchPort<T: InstrumentInterface> {
    idx: u8,
    name: String,
    retries: usize,
    interface: Arc<Mutex<T>>,
}

impl<T: InstrumentInterface> SwitchPort<T> {
    /// Name of the port.
    pub fn get_name(&self) -> &str {
        &self.name
    }

    /// Wire index of the port.
    pub fn get_index(&self) -> usize {
        usize::from(self.idx)
    }

    /// Read back the position of the port.
    ///
    /// The box answers with a single byte that echoes the port index. Stale or garbled bytes and
    /// read timeouts are retried; after the configured number of attempts an
    /// [`InstrumentError::InstrumentStatus`] error is returned.
    pub fn get_position(&mut self) -> Result<SwitchPosition, InstrumentError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        let mut last_issue = String::new();
        for attempt in 1..=self.retries {
            intf.clear_input_buffer()?;
            intf.write_raw(&[QUERY_PREFIX | self.idx])?;
            let mut buf = [0u8];
            match intf.read_exact(&mut buf) {
                Ok(()) => match decode_answer(buf[0], self.idx) {
                    Some(pos) => return Ok(pos),
                    None => last_issue = format!("invalid answer {:#04X}", buf[0]),
                },
                Err(InstrumentError::Io(e)) => last_issue = e.to_string(),
                Err(e) => return Err(e),
            }
            debug!(
                "{}: attempt {attempt}/{} to read the position failed: {last_issue}",
                self.name, self.retries
            );
        }
        Err(InstrumentError::InstrumentStatus(format!(
            "Could not read the position of {} after {} attempts, last issue: {last_issue}",
            self.name, self.retries
        )))
    }

    /// Switch the port to a new position.
    pub fn set_position(&mut self, position: SwitchPosition) -> Result<(), InstrumentError> {
        let msg = (position.wire_index() << 5) | self.idx;
        debug!("{}: switching to {position}", self.name);
        self.interface
            .lock()
            .expect("Mutex should not be poisoned")
            .write_raw(&[msg])
    }

    /// Get a new port for the given instrument interface.
    ///
    /// This function can only be called from inside of the `DcSwitchBox` struct.
    fn new(idx: u8, name: String, retries: usize, interface: Arc<Mutex<T>>) -> Self {
        SwitchPort {
            idx,
            name,
            retries,
            interface,
        }
    }
}

impl<T: InstrumentInterface> Clone for SwitchPort<T> {
    fn clone(&self) -> Self {
        Self {
            idx: self.idx,
            name: self.name.clone(),
            retries: self.retries,
            interface: Arc::clone(&self.interface),
        }
    }
}

/// Decode a position answer, `None` if it belongs to another port or is no valid position.
fn decode_answer(byte: u8, idx: u8) -> Option<SwitchPosition> {
    if byte & 0x1F != idx {
        return None;
    }
    SwitchPosition::from_wire_index(byte >> 5)
}
