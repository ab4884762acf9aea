use labinstr::TcpIpInterface;
use measurements::{Current, Voltage};
use siglent_spd4306x::Spd4306x;

fn main() {
    simple_logger::init_with_level(log::Level::Debug).unwrap();

    // Get our LAN instrument interface on the SCPI port
    let lan_inst = TcpIpInterface::try_new("192.168.0.50:5025").expect("Failed to connect");

    // Now we can open the SPD4306X with the LAN interface.
    let mut inst = Spd4306x::try_new(lan_inst).unwrap();
    println!("Instrument ID: {}", inst.get_name().unwrap());

    // Only channels 1 and 2 are wired up
    inst.set_channels(&[0, 1]).unwrap();

    // Ramp channel 2 to 5 V with 1 V/s
    let mut ch2 = inst.get_channel(1).unwrap();
    ch2.set_current(Current::from_amperes(0.1)).unwrap();
    ch2.set_voltage_ramp_rate(Some(1.0)).unwrap();
    ch2.set_output(true).unwrap();
    ch2.set_voltage(Voltage::from_volts(5.0)).unwrap();

    println!(
        "Channel 2: {:?} at {:?}, {}",
        ch2.get_voltage_measured().unwrap(),
        ch2.get_current_measured().unwrap(),
        ch2.get_regulation_mode().unwrap()
    );

    inst.set_output_all(false).unwrap();
    println!("Errors: {}", inst.get_error().unwrap());
}
