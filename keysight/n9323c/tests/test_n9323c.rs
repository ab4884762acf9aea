//! Tests for the Keysight N9323C driver.

use std::time::Duration;

use measurements::Frequency;
use rstest::*;

use labinstr::{InstrumentError, LoopbackInterfaceString};

use keysight_n9323c::*;

// Type alias for the loopback interface with the N9323C driver.
type N9323cLbk = N9323c<LoopbackInterfaceString>;

/// Function that creates a new N9323c instance with the given input and output commands.
///
/// The average type command that is sent on initialization is prepended automatically.
fn crt_inst(host2inst: Vec<&str>, inst2host: Vec<&str>) -> N9323cLbk {
    let term = "\n";
    let mut h2i: Vec<String> = vec![":AVERage:TYPE POWer".to_string()];
    h2i.extend(host2inst.iter().map(|s| s.to_string()));
    let i2h: Vec<String> = inst2host.iter().map(|s| s.to_string()).collect();
    let interface = LoopbackInterfaceString::new(h2i, i2h, term);
    N9323c::try_new(interface).unwrap()
}

/// Trace answer with `n` points of the given value.
fn trace_resp(n: usize, value: f64) -> String {
    vec![format!("{value:.2}"); n].join(",")
}

#[fixture]
fn emp_inst() -> N9323cLbk {
    crt_inst(vec![], vec![])
}

/// Empty initialization should always pass.
#[rstest]
fn test_initialization(_emp_inst: N9323cLbk) {}

/// Get the name from the instrument.
#[rstest]
fn test_get_name() {
    let mut inst = crt_inst(vec!["*IDN?"], vec!["Keysight,N9323C,CN12345678,A.01.08"]);
    assert_eq!(inst.get_name().unwrap(), "Keysight,N9323C,CN12345678,A.01.08");
}

/// Get and set the frequency window settings.
#[rstest]
fn test_center_frequency() {
    let mut inst = crt_inst(
        vec!["SENSe:FREQuency:CENTer?", "SENSe:FREQuency:CENTer 1500000000"],
        vec!["1.5E+09"],
    );
    assert_eq!(inst.get_center_frequency().unwrap().as_hertz(), 1.5e9);
    inst.set_center_frequency(Frequency::from_hertz(1.5e9))
        .unwrap();
}

#[rstest]
fn test_span() {
    let mut inst = crt_inst(
        vec!["SENSe:FREQuency:SPAN?", "SENSe:FREQuency:SPAN 2000000"],
        vec!["3.0E+09"],
    );
    assert_eq!(inst.get_span().unwrap().as_hertz(), 3e9);
    inst.set_span(Frequency::from_hertz(2e6)).unwrap();
}

#[rstest]
fn test_start_stop_frequency() {
    let mut inst = crt_inst(
        vec![
            "FREQuency:STARt?",
            "FREQuency:STOP?",
            "FREQuency:STARt 100",
            "FREQuency:STOP 250000",
        ],
        vec!["0", "3000000000"],
    );
    assert_eq!(inst.get_start_frequency().unwrap().as_hertz(), 0.0);
    assert_eq!(inst.get_stop_frequency().unwrap().as_hertz(), 3e9);
    inst.set_start_frequency(Frequency::from_hertz(100.0))
        .unwrap();
    inst.set_stop_frequency(Frequency::from_hertz(250e3))
        .unwrap();
}

/// Unparsable frequencies are reported with the raw response.
#[rstest]
fn test_get_frequency_parse_error() {
    let mut inst = crt_inst(vec!["FREQuency:STARt?"], vec!["NaNHz"]);
    match inst.get_start_frequency() {
        Err(InstrumentError::ResponseParseError(resp)) => assert_eq!(resp, "NaNHz"),
        other => panic!("Unexpected result: {other:?}"),
    }
}

/// Resolution bandwidth within and outside of the allowed range.
#[rstest]
fn test_resolution_bandwidth() {
    let mut inst = crt_inst(
        vec!["SENSe:BANDwidth:RESolution?", "SENSe:BANDwidth:RESolution 30000"],
        vec!["1.0E+05"],
    );
    assert_eq!(inst.get_resolution_bandwidth().unwrap().as_hertz(), 1e5);
    inst.set_resolution_bandwidth(Frequency::from_hertz(3e4))
        .unwrap();
}

#[rstest]
#[case(1.0)]
#[case(5e6)]
fn test_resolution_bandwidth_out_of_range(mut emp_inst: N9323cLbk, #[case] rbw: f64) {
    let res = emp_inst.set_resolution_bandwidth(Frequency::from_hertz(rbw));
    assert!(matches!(
        res,
        Err(InstrumentError::FloatValueOutOfRange { .. })
    ));
}

/// Setting the sweep time switches automatic sweep time off first.
#[rstest]
fn test_sweep_time() {
    let mut inst = crt_inst(
        vec![
            "SENSe:SWEep:TIME?",
            "SENSe:SWEep:TIME:AUTO 0",
            "SENSe:SWEep:TIME 0.25",
        ],
        vec!["5.0E-01"],
    );
    assert_eq!(inst.get_sweep_time().unwrap(), Duration::from_millis(500));
    inst.set_sweep_time(Duration::from_millis(250)).unwrap();
}

#[rstest]
#[case("1", true)]
#[case("0", false)]
fn test_auto_sweep_time(#[case] resp: &str, #[case] exp: bool) {
    let cmd = format!("SENSe:SWEep:TIME:AUTO {}", u8::from(exp));
    let mut inst = crt_inst(vec!["SENSe:SWEep:TIME:AUTO?", cmd.as_str()], vec![resp]);
    assert_eq!(inst.get_auto_sweep_time().unwrap(), exp);
    inst.set_auto_sweep_time(exp).unwrap();
}

/// The number of sweep points is fixed.
#[rstest]
fn test_sweep_points(mut emp_inst: N9323cLbk) {
    assert_eq!(emp_inst.get_sweep_points(), 461);
    assert!(matches!(
        emp_inst.set_sweep_points(1001),
        Err(InstrumentError::CommandNotSupported(_))
    ));
}

/// Averaging state, count, type, and restart.
#[rstest]
fn test_averaging() {
    let mut inst = crt_inst(
        vec![
            ":AVERage:TRACe1:STATe?",
            ":AVERage:TRACe1:STATe 1",
            ":AVERage:TRACe1:COUNt?",
            ":AVERage:TRACe1:COUNt 16",
            ":AVERage:TRACe1:CLEar",
        ],
        vec!["0", "+10"],
    );
    assert!(!inst.get_averaging_enabled().unwrap());
    inst.set_averaging_enabled(true).unwrap();
    assert_eq!(inst.get_average_count().unwrap(), 10);
    inst.set_average_count(16).unwrap();
    inst.restart_averaging().unwrap();
}

#[rstest]
fn test_average_count_zero(mut emp_inst: N9323cLbk) {
    assert!(matches!(
        emp_inst.set_average_count(0),
        Err(InstrumentError::IntValueOutOfRange { value: 0, .. })
    ));
}

#[rstest]
#[case("LOGP", AverageType::LogPower)]
#[case("VOLT", AverageType::Voltage)]
#[case("POW", AverageType::Power)]
#[case("POWer", AverageType::Power)]
fn test_get_average_type(#[case] resp: &str, #[case] exp: AverageType) {
    let mut inst = crt_inst(vec![":AVERage:TYPE?"], vec![resp]);
    assert_eq!(inst.get_average_type().unwrap(), exp);
}

#[rstest]
#[case(AverageType::LogPower, ":AVERage:TYPE LOGPower")]
#[case(AverageType::Voltage, ":AVERage:TYPE VOLTage")]
fn test_set_average_type(#[case] avg_type: AverageType, #[case] cmd: &str) {
    let mut inst = crt_inst(vec![cmd], vec![]);
    inst.set_average_type(avg_type).unwrap();
}

/// A narrow window is acquired in a single segment and the window is restored afterwards.
#[rstest]
fn test_acquire_single_segment() {
    let data = trace_resp(461, -80.5);
    let mut inst = crt_inst(
        vec![
            "SENSe:BANDwidth:RESolution 100000",
            "FREQ:STAR 0",
            "FREQ:STOP 1000000",
            "INIT:CONT OFF",
            "*CLS;INIT:IMM;*OPC?",
            ":AVERage:TRACe1:STATe 0",
            ":AVERage:TRACe1:COUNt 1",
            ":AVERage:TRACe1:CLEar",
            "TRACe:DATA? TRACe1",
            "FREQ:STAR 0",
            "FREQ:STOP 1000000",
            "INIT:CONT ON",
        ],
        vec!["1", data.as_str()],
    );
    let trace = inst
        .acquire(
            Frequency::from_hertz(0.0),
            Frequency::from_hertz(1e6),
            Frequency::from_hertz(1e5),
            false,
            1,
        )
        .unwrap();
    assert_eq!(trace.len(), 461);
    assert_eq!(trace.frequencies_hz[0], 0.0);
    assert_eq!(trace.frequencies_hz[460], 1e6);
    assert!(trace.amplitudes_dbm.iter().all(|&v| v == -80.5));
}

/// Two segments: averaging is reapplied and restarted for each of them.
#[rstest]
fn test_acquire_two_segments() {
    let first = trace_resp(461, -70.0);
    let second = trace_resp(461, -60.0);
    let mut inst = crt_inst(
        vec![
            "SENSe:BANDwidth:RESolution 1000000",
            "FREQ:STAR 0",
            "FREQ:STOP 500000000",
            "INIT:CONT OFF",
            "*CLS;INIT:IMM;*OPC?",
            ":AVERage:TRACe1:STATe 1",
            ":AVERage:TRACe1:COUNt 4",
            ":AVERage:TRACe1:CLEar",
            "TRACe:DATA? TRACe1",
            "FREQ:STAR 500000000",
            "FREQ:STOP 800000000",
            "INIT:CONT OFF",
            "*CLS;INIT:IMM;*OPC?",
            ":AVERage:TRACe1:STATe 1",
            ":AVERage:TRACe1:COUNt 4",
            ":AVERage:TRACe1:CLEar",
            "TRACe:DATA? TRACe1",
            "FREQ:STAR 0",
            "FREQ:STOP 800000000",
            "INIT:CONT ON",
        ],
        vec!["1", first.as_str(), "+1", second.as_str()],
    );
    let trace = inst
        .acquire(
            Frequency::from_hertz(0.0),
            Frequency::from_hertz(8e8),
            Frequency::from_hertz(1e6),
            true,
            4,
        )
        .unwrap();
    assert_eq!(trace.len(), 922);
    assert_eq!(trace.num_segments(), 2);
    assert_eq!(trace.amplitudes_dbm[460], -70.0);
    assert_eq!(trace.amplitudes_dbm[461], -60.0);
    assert_eq!(trace.boundary_duplicates(), vec![461]);
}

/// A sweep that does not complete aborts the acquisition, but the analyzer is still restored.
#[rstest]
fn test_acquire_opc_failure_restores() {
    let mut inst = crt_inst(
        vec![
            "SENSe:BANDwidth:RESolution 100000",
            "FREQ:STAR 0",
            "FREQ:STOP 1000000",
            "INIT:CONT OFF",
            "*CLS;INIT:IMM;*OPC?",
            "FREQ:STAR 0",
            "FREQ:STOP 1000000",
            "INIT:CONT ON",
        ],
        vec!["0"],
    );
    let err = inst
        .acquire(
            Frequency::from_hertz(0.0),
            Frequency::from_hertz(1e6),
            Frequency::from_hertz(1e5),
            false,
            1,
        )
        .unwrap_err();
    assert_eq!(err.step(), Some(SweepStep::SingleSweep));
    assert!(matches!(
        err,
        AcquisitionError::Transport {
            segment: 0,
            source: InstrumentError::InstrumentStatus(_),
            ..
        }
    ));
}

/// An invalid request is rejected before anything is sent.
#[rstest]
fn test_acquire_invalid_request(mut emp_inst: N9323cLbk) {
    let err = emp_inst
        .acquire(
            Frequency::from_hertz(2e6),
            Frequency::from_hertz(1e6),
            Frequency::from_hertz(1e5),
            false,
            1,
        )
        .unwrap_err();
    assert!(matches!(err, AcquisitionError::InvalidRequest(_)));
}

/// Acquire the window currently set on the analyzer.
#[rstest]
fn test_get_data() {
    let data = trace_resp(461, -90.0);
    let mut inst = crt_inst(
        vec![
            "FREQuency:STARt?",
            "FREQuency:STOP?",
            "SENSe:BANDwidth:RESolution?",
            ":AVERage:TRACe1:STATe?",
            ":AVERage:TRACe1:COUNt?",
            "SENSe:BANDwidth:RESolution 3000",
            "FREQ:STAR 1000000",
            "FREQ:STOP 2000000",
            "INIT:CONT OFF",
            "*CLS;INIT:IMM;*OPC?",
            ":AVERage:TRACe1:STATe 1",
            ":AVERage:TRACe1:COUNt 8",
            ":AVERage:TRACe1:CLEar",
            "TRACe:DATA? TRACe1",
            "FREQ:STAR 1000000",
            "FREQ:STOP 2000000",
            "INIT:CONT ON",
        ],
        vec!["1.0E+06", "2.0E+06", "3.0E+03", "1", "8", "1", data.as_str()],
    );
    let trace = inst.get_data().unwrap();
    assert_eq!(trace.len(), 461);
    assert_eq!(trace.frequencies_hz[0], 1e6);
    assert_eq!(trace.frequencies_hz[460], 2e6);
}

/// Custom sweep limits change how a window is split up.
#[rstest]
fn test_set_sweep_limits(mut emp_inst: N9323cLbk) {
    let limits = SweepLimits {
        max_segment_span: Frequency::from_hertz(1e8),
        ..SweepLimits::default()
    };
    emp_inst.set_sweep_limits(limits);
    assert_eq!(emp_inst.get_sweep_limits(), limits);
}

/// Ensure cloning an instrument works correctly.
#[rstest]
fn test_cloning(emp_inst: N9323cLbk) {
    let _ = emp_inst.clone();
}
