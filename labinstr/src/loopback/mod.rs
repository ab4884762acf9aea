//! Scripted loopback interfaces to test instrument drivers without hardware.
//!
//! A loopback interface is given two scripts: what the host is expected to send to the
//! instrument, and what the instrument answers. Every write is compared against the next expected
//! host message and every read is served from the instrument script. Mismatches panic right away
//! and leftover messages panic when the interface is dropped, so a test fails whenever the driver
//! deviates from the script.
//!
//! Use [`LoopbackInterfaceString`] for terminated text protocols (SCPI and friends) and
//! [`LoopbackInterfaceBytes`] for raw byte protocols.

mod loopback_interface_bytes;
mod loopback_interface_string;

pub use loopback_interface_bytes::*;
pub use loopback_interface_string::*;

use std::{collections::VecDeque, fmt::Debug};

/// One direction of a scripted exchange.
#[derive(Debug)]
struct Script<T: Debug> {
    pending: VecDeque<T>,
    direction: &'static str,
}

impl<T: Debug> Script<T> {
    fn new(items: Vec<T>, direction: &'static str) -> Self {
        Script {
            pending: items.into(),
            direction,
        }
    }

    /// Take the next scripted message, or panic if the script is exhausted.
    fn take(&mut self) -> T {
        match self.pending.pop_front() {
            Some(item) => item,
            None => panic!("No more messages were expected from {}.", self.direction),
        }
    }

    /// Panic if scripted messages were not used.
    fn assert_consumed(&self) {
        if let Some(item) = self.pending.front() {
            panic!(
                "Leftover expected messages found from {}: {item:?} ({} in total)",
                self.direction,
                self.pending.len()
            );
        }
    }
}

/// Byte queue of the instrument answer that is currently being read.
#[derive(Debug, Default)]
struct ReadBuffer {
    bytes: VecDeque<u8>,
}

impl ReadBuffer {
    /// Pop one byte, refilling the buffer from `refill` when it runs empty.
    fn pop_or_refill<F: FnMut() -> Vec<u8>>(&mut self, mut refill: F) -> u8 {
        loop {
            if let Some(byte) = self.bytes.pop_front() {
                return byte;
            }
            self.bytes.extend(refill());
        }
    }
}
