//! Tests for the provided methods of the [`InstrumentInterface`] trait.

use std::{collections::VecDeque, time::Duration};

use rstest::*;

use labinstr::{InstrumentError, InstrumentInterface};

/// Minimal interface that only implements the two required methods.
struct MinimalInterface {
    written: Vec<u8>,
    to_read: VecDeque<u8>,
}

impl InstrumentInterface for MinimalInterface {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        for byte in buf.iter_mut() {
            *byte = self.to_read.pop_front().ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "nothing to read")
            })?;
        }
        Ok(())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError> {
        self.written.extend_from_slice(data);
        Ok(())
    }
}

fn crt_intf(answers: &str) -> MinimalInterface {
    MinimalInterface {
        written: Vec::new(),
        to_read: answers.as_bytes().iter().copied().collect(),
    }
}

#[fixture]
fn intf() -> MinimalInterface {
    crt_intf("")
}

#[rstest]
fn test_default_get_terminator(mut intf: MinimalInterface) {
    assert_eq!(intf.get_terminator(), "\n");
    // setting is ignored by the default implementation
    intf.set_terminator("\r");
    assert_eq!(intf.get_terminator(), "\n");
}

#[rstest]
fn test_default_get_timeout(intf: MinimalInterface) {
    assert_eq!(intf.get_timeout(), Duration::from_secs(3));
}

#[rstest]
fn test_default_clear_input_buffer(mut intf: MinimalInterface) {
    intf.clear_input_buffer().unwrap();
}

#[rstest]
fn test_sendcmd_appends_terminator(mut intf: MinimalInterface) {
    intf.sendcmd("*RST").unwrap();
    intf.write("\u{5}").unwrap();
    assert_eq!(intf.written, b"*RST\n\x05");
}

#[rstest]
fn test_query_trims_response() {
    let mut intf = crt_intf("  Keysight,N9323C,1,A.01 \n");
    let resp = intf.query("*IDN?").unwrap();
    assert_eq!(resp, "Keysight,N9323C,1,A.01");
    assert_eq!(intf.written, b"*IDN?\n");
}

#[rstest]
#[case("1\n")]
#[case("+1\n")]
fn test_query_opc_complete(#[case] answer: &str) {
    let mut intf = crt_intf(answer);
    intf.query_opc("*CLS;INIT:IMM;*OPC?").unwrap();
    assert_eq!(intf.written, b"*CLS;INIT:IMM;*OPC?\n");
}

#[rstest]
fn test_query_opc_not_complete() {
    let mut intf = crt_intf("0\n");
    assert!(matches!(
        intf.query_opc("*OPC?"),
        Err(InstrumentError::InstrumentStatus(_))
    ));
}

#[rstest]
fn test_query_ascii_values() {
    let mut intf = crt_intf("-80.5,-79.25,-81\n");
    let vals = intf.query_ascii_values("TRACe:DATA? TRACe1").unwrap();
    assert_eq!(vals, vec![-80.5, -79.25, -81.0]);
}

#[rstest]
fn test_query_ascii_values_parse_error() {
    let mut intf = crt_intf("-80.5,oops\n");
    match intf.query_ascii_values("TRACe:DATA? TRACe1") {
        Err(InstrumentError::ResponseParseError(resp)) => assert_eq!(resp, "-80.5,oops"),
        _ => panic!("Expected a parse error."),
    }
}

/// Invalid UTF-8 is replaced instead of failing the read.
#[rstest]
fn test_read_until_terminator_invalid_utf8() {
    let mut intf = MinimalInterface {
        written: Vec::new(),
        to_read: VecDeque::from(vec![b'o', 0xFF, b'k', b'\n']),
    };
    let resp = intf.read_until_terminator().unwrap();
    assert_eq!(resp, "o\u{FFFD}k");
}
