//! Loopback interface for drivers that exchange raw bytes without a terminator.

use crate::{
    InstrumentError, InstrumentInterface,
    loopback::{ReadBuffer, Script},
};

/// A scripted interface for testing byte based instrument drivers.
///
/// Each scripted entry is one write (host to instrument) or one answer (instrument to host).
/// Answers are served byte by byte, so a driver can read an answer in several calls.
pub struct LoopbackInterfaceBytes {
    from_host: Script<Vec<u8>>,
    from_inst: Script<Vec<u8>>,
    read_buffer: ReadBuffer,
    input_clears: usize,
}

impl LoopbackInterfaceBytes {
    /// Create a new loopback interface from the two scripts.
    ///
    /// # Arguments
    /// * `from_host` - Writes expected from host to instrument, in order.
    /// * `from_inst` - Answers from instrument to host, in order.
    pub fn new(from_host: Vec<Vec<u8>>, from_inst: Vec<Vec<u8>>) -> Self {
        LoopbackInterfaceBytes {
            from_host: Script::new(from_host, "host to instrument"),
            from_inst: Script::new(from_inst, "instrument to host"),
            read_buffer: ReadBuffer::default(),
            input_clears: 0,
        }
    }

    /// Panic if any scripted message was not used.
    ///
    /// Called automatically on drop.
    pub fn finalize(&mut self) {
        self.from_host.assert_consumed();
        self.from_inst.assert_consumed();
    }

    /// Number of times the driver asked to clear the input buffer.
    pub fn input_clears(&self) -> usize {
        self.input_clears
    }
}

impl InstrumentInterface for LoopbackInterfaceBytes {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        let from_inst = &mut self.from_inst;
        for byte in buf.iter_mut() {
            *byte = self.read_buffer.pop_or_refill(|| from_inst.take());
        }
        Ok(())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError> {
        let exp = self.from_host.take();
        assert_eq!(exp, data, "Expected bytes {exp:02X?}, got {data:02X?}");
        Ok(())
    }

    fn get_terminator(&self) -> &str {
        ""
    }

    /// Scripted answers are never discarded, only counted.
    fn clear_input_buffer(&mut self) -> Result<(), InstrumentError> {
        self.input_clears += 1;
        Ok(())
    }
}

impl Drop for LoopbackInterfaceBytes {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            self.finalize();
        }
    }
}
