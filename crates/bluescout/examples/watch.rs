use bluescout::gap::DEFAULT_DEVICE;
use bluescout::{BdAddr, DiscoverySession};
use std::env;
use std::error::Error;
use std::io::BufRead;
use std::thread;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let device = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_DEVICE.to_string());

    // Optional address filter, e.g. "AA:BB:CC:DD:EE:FF"
    let filter: Option<BdAddr> = match env::args().nth(2) {
        Some(arg) => Some(
            arg.parse()
                .map_err(|err| format!("invalid address {:?}: {:?}", arg, err))?,
        ),
        None => None,
    };

    let mut session = match DiscoverySession::open(&device) {
        Ok(session) => session,
        Err(err) => {
            eprintln!("{}", err);
            eprintln!("Raw HCI scanning usually needs root or CAP_NET_ADMIN.");
            std::process::exit(1);
        }
    };

    // Stop the unbounded scan when the user presses Enter
    let token = session.cancellation_token();
    thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().lock().read_line(&mut line);
        token.cancel();
    });

    session.set_callback(Some(Box::new(move |address, advertisement| {
        if let Some(want) = filter {
            if want != *address {
                return;
            }
        }
        let name = if advertisement.name.is_empty() {
            "(no name)"
        } else {
            advertisement.name.as_str()
        };
        println!("{} {:>4} dBm  {}", address, advertisement.rssi, name);
    })));

    println!("Watching advertisements on {}; press Enter to stop.", device);
    let devices = session.discover(None)?;

    println!("\nSeen {} device(s).", devices.len());
    Ok(())
}
