//! Loopback interface for drivers that talk in terminated strings.

use crate::{
    InstrumentError, InstrumentInterface,
    loopback::{ReadBuffer, Script},
};

/// A scripted interface for testing text based instrument drivers.
///
/// Messages in both scripts are given without terminator; the expected terminator is appended
/// when comparing what the driver writes and when serving answers. The terminator the driver
/// sets on the interface is recorded and can be checked with
/// [`LoopbackInterfaceString::test_terminator`].
///
/// # Example
///
/// ```
/// use labinstr::{InstrumentInterface, LoopbackInterfaceString};
///
/// let mut lbk = LoopbackInterfaceString::new(
///     vec!["*IDN?".to_string()],
///     vec!["Maker,Model,1234,1.0".to_string()],
///     "\n",
/// );
/// assert_eq!(lbk.query("*IDN?").unwrap(), "Maker,Model,1234,1.0");
/// // Dropping `lbk` checks that all scripted messages were used.
/// ```
pub struct LoopbackInterfaceString {
    from_host: Script<String>,
    from_inst: Script<String>,
    terminator_exp: String,
    terminator: String,
    read_buffer: ReadBuffer,
}

impl LoopbackInterfaceString {
    /// Create a new loopback interface from the two scripts.
    ///
    /// # Arguments
    /// * `from_host` - Commands expected from host to instrument, in order.
    /// * `from_inst` - Answers from instrument to host, in order.
    /// * `terminator_exp` - Terminator appended to every scripted message.
    pub fn new(from_host: Vec<String>, from_inst: Vec<String>, terminator_exp: &str) -> Self {
        LoopbackInterfaceString {
            from_host: Script::new(from_host, "host to instrument"),
            from_inst: Script::new(from_inst, "instrument to host"),
            terminator_exp: terminator_exp.to_string(),
            terminator: "\n".to_string(),
            read_buffer: ReadBuffer::default(),
        }
    }

    /// Panic if any scripted message was not used.
    ///
    /// Called automatically on drop, but can be called earlier to pinpoint a failure.
    pub fn finalize(&mut self) {
        self.from_host.assert_consumed();
        self.from_inst.assert_consumed();
    }

    /// Assert that the driver configured the interface with the expected terminator.
    pub fn test_terminator(&self, expected_terminator: &str) {
        assert_eq!(
            expected_terminator, self.terminator,
            "Expected terminator {expected_terminator:?}, got {:?}",
            self.terminator
        );
    }
}

impl InstrumentInterface for LoopbackInterfaceString {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        let from_inst = &mut self.from_inst;
        let terminator = &self.terminator_exp;
        for byte in buf.iter_mut() {
            *byte = self
                .read_buffer
                .pop_or_refill(|| format!("{}{terminator}", from_inst.take()).into_bytes());
        }
        Ok(())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError> {
        let exp = format!("{}{}", self.from_host.take(), self.terminator_exp);
        assert_eq!(
            exp.as_bytes(),
            data,
            "Expected sendcmd {exp:?}, got {:?}",
            String::from_utf8_lossy(data)
        );
        Ok(())
    }

    fn get_terminator(&self) -> &str {
        self.terminator.as_str()
    }

    fn set_terminator(&mut self, terminator: &str) {
        self.terminator = terminator.to_string();
    }
}

impl Drop for LoopbackInterfaceString {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            self.finalize();
        }
    }
}
