use keysight_n9323c::{AcquisitionError, N9323c, TcpIpInterfaceN9323c};
use measurements::Frequency;

fn main() {
    simple_logger::init_with_level(log::Level::Info).unwrap();

    let host = "192.168.0.123";

    // Get our LAN instrument interface
    let lan_inst = TcpIpInterfaceN9323c::simple(host).expect("Failed to connect to the analyzer");

    // Now we can open the N9323C with the LAN interface.
    let mut sa = N9323c::try_new(lan_inst).unwrap();
    println!("Instrument ID: {}", sa.get_name().unwrap());

    // Acquire 0 to 1.2 GHz with 100 kHz resolution bandwidth and 10 averages per segment
    let res = sa.acquire(
        Frequency::from_hertz(0.0),
        Frequency::from_hertz(1.2e9),
        Frequency::from_hertz(100e3),
        true,
        10,
    );

    let trace = match res {
        Ok(trace) => trace,
        Err(AcquisitionError::PartialAcquisition {
            partial, source, ..
        }) => {
            println!("Acquisition aborted ({source}), using the completed segments");
            *partial
        }
        Err(e) => panic!("Acquisition failed: {e}"),
    };

    println!(
        "Acquired {} points in {} segments",
        trace.len(),
        trace.num_segments()
    );
    if let Some((freq, power)) = trace
        .iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
    {
        println!("Strongest signal: {power:.2} dBm at {:.3} MHz", freq / 1e6);
    }
}
