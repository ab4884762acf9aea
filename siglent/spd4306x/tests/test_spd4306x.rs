//! Tests for the Siglent SPD4306X driver.

use measurements::{Current, Voltage};
use rstest::*;

use labinstr::{InstrumentError, LoopbackInterfaceString};

use siglent_spd4306x::*;

// Type alias for the loopback interface with the SPD4306X driver.
type Spd4306xLbk = Spd4306x<LoopbackInterfaceString>;

/// Function that creates a new Spd4306x instance with the given input and output commands.
fn crt_inst(host2inst: Vec<&str>, inst2host: Vec<&str>) -> Spd4306xLbk {
    let term = "\n";
    let h2i: Vec<String> = host2inst.iter().map(|s| s.to_string()).collect();
    let i2h: Vec<String> = inst2host.iter().map(|s| s.to_string()).collect();
    let interface = LoopbackInterfaceString::new(h2i, i2h, term);
    Spd4306x::try_new(interface).unwrap()
}

#[fixture]
fn emp_inst() -> Spd4306xLbk {
    crt_inst(vec![], vec![])
}

/// Empty initialization should always pass.
#[rstest]
fn test_initialization(_emp_inst: Spd4306xLbk) {}

/// Instrument level commands.
#[rstest]
fn test_get_name() {
    let mut inst = crt_inst(vec!["*IDN?"], vec!["Siglent Technologies,SPD4306X,SPD4X1234,1.01"]);
    assert_eq!(
        inst.get_name().unwrap(),
        "Siglent Technologies,SPD4306X,SPD4X1234,1.01"
    );
}

#[rstest]
fn test_reset_clear_error() {
    let mut inst = crt_inst(vec!["*RST", "*CLS", "SYST:ERR?"], vec!["0, No error"]);
    inst.reset().unwrap();
    inst.clear_status().unwrap();
    assert_eq!(inst.get_error().unwrap(), "0, No error");
}

/// Voltage and current setpoints are sent with six decimals to the right channel.
#[rstest]
#[case(0, "CH1")]
#[case(1, "CH2")]
#[case(2, "CH3")]
#[case(3, "CH4")]
fn test_channel_setpoints(#[case] idx: usize, #[case] ch: &str) {
    let cmds = [
        format!("SOUR:VOLT {ch},1.250000"),
        format!("SOUR:VOLT:SET? {ch}"),
        format!("SOUR:CURR {ch},0.500000"),
        format!("SOUR:CURR:SET? {ch}"),
    ];
    let mut inst = crt_inst(cmds.iter().map(|s| s.as_str()).collect(), vec!["1.250", "0.500"]);
    let mut chan = inst.get_channel(idx).unwrap();
    chan.set_voltage(Voltage::from_volts(1.25)).unwrap();
    assert_eq!(chan.get_voltage().unwrap().as_volts(), 1.25);
    chan.set_current(Current::from_amperes(0.5)).unwrap();
    assert_eq!(chan.get_current().unwrap().as_amperes(), 0.5);
}

/// Measured values.
#[rstest]
fn test_channel_measure() {
    let mut inst = crt_inst(vec!["MEAS:VOLT? CH2", "MEAS:CURR? CH2"], vec!["11.998", "0.0123"]);
    let mut chan = inst.get_channel(1).unwrap();
    assert_eq!(chan.get_voltage_measured().unwrap().as_volts(), 11.998);
    assert_eq!(chan.get_current_measured().unwrap().as_amperes(), 0.0123);
}

/// Setpoints outside of the channel limits are rejected without sending anything.
#[rstest]
#[case(0, 15.1)]
#[case(1, 30.5)]
#[case(2, -0.1)]
#[case(3, 15.01)]
fn test_channel_voltage_limits(mut emp_inst: Spd4306xLbk, #[case] idx: usize, #[case] volts: f64) {
    let mut chan = emp_inst.get_channel(idx).unwrap();
    assert!(matches!(
        chan.set_voltage(Voltage::from_volts(volts)),
        Err(InstrumentError::FloatValueOutOfRange { .. })
    ));
}

#[rstest]
#[case(0, 1.6)]
#[case(1, 6.1)]
#[case(3, 1.1)]
fn test_channel_current_limits(mut emp_inst: Spd4306xLbk, #[case] idx: usize, #[case] amps: f64) {
    let mut chan = emp_inst.get_channel(idx).unwrap();
    assert!(matches!(
        chan.set_current(Current::from_amperes(amps)),
        Err(InstrumentError::FloatValueOutOfRange { .. })
    ));
}

/// Output state and regulation mode.
#[rstest]
#[case("1", true)]
#[case("0", false)]
fn test_channel_output(#[case] resp: &str, #[case] exp: bool) {
    let set_cmd = format!("OUTP CH3,{}", u8::from(exp));
    let mut inst = crt_inst(vec![set_cmd.as_str(), "OUTP? CH3"], vec![resp]);
    let mut chan = inst.get_channel(2).unwrap();
    chan.set_output(exp).unwrap();
    assert_eq!(chan.get_output().unwrap(), exp);
}

#[rstest]
#[case("CV", RegulationMode::ConstantVoltage)]
#[case("CC", RegulationMode::ConstantCurrent)]
fn test_regulation_mode(#[case] resp: &str, #[case] exp: RegulationMode) {
    let mut inst = crt_inst(vec!["MEAS:RUN:MODE? CH1"], vec![resp]);
    let mut chan = inst.get_channel(0).unwrap();
    assert_eq!(chan.get_regulation_mode().unwrap(), exp);
}

#[rstest]
fn test_regulation_mode_invalid() {
    let mut inst = crt_inst(vec!["MEAS:RUN:MODE? CH1"], vec!["UR"]);
    let mut chan = inst.get_channel(0).unwrap();
    assert!(chan.get_regulation_mode().is_err());
}

/// All configured outputs are switched in channel order.
#[rstest]
fn test_output_all() {
    let mut inst = crt_inst(
        vec!["OUTP CH1,1", "OUTP CH2,1", "OUTP CH3,1", "OUTP CH4,1", "OUTP CH2,0", "OUTP CH4,0"],
        vec![],
    );
    inst.set_output_all(true).unwrap();
    inst.set_channels(&[3, 1]).unwrap();
    inst.set_output_all(false).unwrap();
}

/// Only configured channels can be retrieved.
#[rstest]
fn test_get_channel(mut emp_inst: Spd4306xLbk) {
    match emp_inst.get_channel(4) {
        Err(InstrumentError::ChannelIndexOutOfRange { idx, nof_channels }) => {
            assert_eq!(idx, 4);
            assert_eq!(nof_channels, 4);
        }
        _ => panic!("Expected ChannelIndexOutOfRange error"),
    }
    emp_inst.set_channels(&[0, 2]).unwrap();
    assert!(matches!(
        emp_inst.get_channel(1),
        Err(InstrumentError::InvalidArgument(_))
    ));
    assert!(emp_inst.get_channel(2).is_ok());
    match emp_inst.get_channel(5) {
        Err(InstrumentError::ChannelIndexOutOfRange { nof_channels, .. }) => {
            assert_eq!(nof_channels, 4);
        }
        _ => panic!("Expected ChannelIndexOutOfRange error"),
    }
    assert!(emp_inst.set_channels(&[0, 7]).is_err());
}

/// With a ramp rate the present setpoint is read and the new one approached in steps.
#[rstest]
fn test_voltage_ramp() {
    let mut inst = crt_inst(
        vec![
            "SOUR:VOLT:SET? CH2",
            "SOUR:VOLT CH2,2.000000",
            "SOUR:VOLT CH2,3.000000",
            "SOUR:VOLT CH2,4.000000",
        ],
        vec!["1.000"],
    );
    let mut chan = inst.get_channel(1).unwrap();
    chan.set_voltage_ramp_rate(Some(50.0)).unwrap();
    chan.set_voltage(Voltage::from_volts(4.0)).unwrap();
}

#[rstest]
fn test_current_ramp_down() {
    let mut inst = crt_inst(
        vec![
            "SOUR:CURR:SET? CH3",
            "SOUR:CURR CH3,0.300000",
            "SOUR:CURR CH3,0.200000",
        ],
        vec!["0.400"],
    );
    let mut chan = inst.get_channel(2).unwrap();
    chan.set_current_ramp_rate(Some(0.5)).unwrap();
    chan.set_current(Current::from_amperes(0.2)).unwrap();
}

/// Small changes are set in a single step even with a ramp rate.
#[rstest]
fn test_ramp_small_step() {
    let mut inst = crt_inst(
        vec!["SOUR:VOLT:SET? CH1", "SOUR:VOLT CH1,5.500000"],
        vec!["5.000"],
    );
    let mut chan = inst.get_channel(0).unwrap();
    chan.set_voltage_ramp_rate(Some(10.0)).unwrap();
    chan.set_voltage(Voltage::from_volts(5.5)).unwrap();
}

/// Ramp rates are shared between handles of the same channel, but not between channels.
#[rstest]
fn test_ramp_rate_shared(mut emp_inst: Spd4306xLbk) {
    let mut ch1 = emp_inst.get_channel(0).unwrap();
    let ch1_again = emp_inst.get_channel(0).unwrap();
    let ch2 = emp_inst.get_channel(1).unwrap();

    ch1.set_voltage_ramp_rate(Some(0.2)).unwrap();
    ch1.set_current_ramp_rate(Some(0.05)).unwrap();
    assert_eq!(ch1_again.get_voltage_ramp_rate(), Some(0.2));
    assert_eq!(ch1_again.get_current_ramp_rate(), Some(0.05));
    assert_eq!(ch2.get_voltage_ramp_rate(), None);

    ch1.set_voltage_ramp_rate(None).unwrap();
    assert_eq!(ch1_again.get_voltage_ramp_rate(), None);
    assert!(ch1.set_current_ramp_rate(Some(-1.0)).is_err());
}

/// Ensure cloning an instrument and a channel works correctly.
#[rstest]
fn test_cloning(mut emp_inst: Spd4306xLbk) {
    let _ = emp_inst.clone();
    let ch_c = emp_inst.get_channel(2).unwrap();
    let _ = ch_c.clone();
}
