use dc_switchbox::{DcSwitchBox, SerialInterfaceSwitchBox, SwitchPosition};

fn main() {
    simple_logger::init_with_level(log::Level::Debug).unwrap();

    let port = "/dev/ttyUSB0";

    // Get our serial instrument interface
    let serial_inst = SerialInterfaceSwitchBox::simple(port).expect("Failed to open serial port");

    // Now we can open the switch box with the serial interface.
    let mut sbox = DcSwitchBox::try_new(serial_inst).unwrap();
    println!("Instrument: {}", sbox.get_name());

    // Ground all ports, then connect port 3 to the SMU
    sbox.set_all_ports(SwitchPosition::Ground).unwrap();
    let mut port3 = sbox.get_port_by_name("Port3").unwrap();
    port3.set_position(SwitchPosition::Force).unwrap();

    for (name, pos) in sbox.get_all_positions().unwrap() {
        println!("{name}: {pos}");
    }
}
