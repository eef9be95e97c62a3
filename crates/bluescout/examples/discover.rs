use bluescout::gap::DEFAULT_DEVICE;
use bluescout::DiscoverySession;
use std::env;
use std::error::Error;
use std::time::Duration;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let device = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_DEVICE.to_string());
    let seconds: u64 = match env::args().nth(2) {
        Some(arg) => arg.parse()?,
        None => 10,
    };

    // Open the controller
    let mut session = match DiscoverySession::open(&device) {
        Ok(session) => session,
        Err(err) => {
            eprintln!("{}", err);
            eprintln!("Raw HCI scanning usually needs root or CAP_NET_ADMIN.");
            std::process::exit(1);
        }
    };

    println!("Scanning on {} for {} second(s)...", device, seconds);
    let devices = session.discover(Some(Duration::from_secs(seconds)))?;

    // Print summary, strongest signal first
    println!("\nDiscovered {} device(s):", devices.len());
    let mut entries: Vec<_> = devices.values().collect();
    entries.sort_by(|a, b| b.rssi.cmp(&a.rssi));

    for advertisement in entries {
        println!(
            "{} - Type: {:?}, RSSI: {} dBm",
            advertisement.address, advertisement.address_type, advertisement.rssi
        );
        if !advertisement.name.is_empty() {
            println!("   Name: {}", advertisement.name);
        }
        if let Some(flags) = advertisement.flags() {
            println!("   Flags: {:?}", flags);
        }
        if let Some(tx_power) = advertisement.tx_power() {
            println!("   TX Power: {} dBm", tx_power);
        }
        if let Some(data) = advertisement.manufacturer_data() {
            println!("   Manufacturer data: {}", hex::encode(data));
        }
        println!();
    }

    Ok(())
}
