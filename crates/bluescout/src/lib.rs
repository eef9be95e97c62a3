//! BlueScout - a Rust library for BLE advertisement discovery
//!
//! This library puts a Bluetooth controller into passive scan mode over
//! the raw HCI interface on Linux, decodes the advertising reports it
//! produces, and surfaces per-device advertisement data (address, name,
//! RSSI, raw EIR fields) either as an accumulated map or through a
//! streaming callback.
//!
//! ```no_run
//! use bluescout::DiscoverySession;
//! use std::time::Duration;
//!
//! let mut session = DiscoverySession::open("hci0")?;
//! let devices = session.discover(Some(Duration::from_secs(10)))?;
//! for (address, advertisement) in &devices {
//!     println!("{} {:?} {} dBm", address, advertisement.name, advertisement.rssi);
//! }
//! # Ok::<(), bluescout::Error>(())
//! ```

pub mod eir;
pub mod error;
pub mod gap;
pub mod hci;
pub mod scan;

// Re-export common types for convenience
pub use eir::{AdFlags, EirData};
pub use error::Error;
pub use gap::{
    AddressType, Advertisement, BdAddr, CancellationToken, DiscoveryCallback, DiscoveryConfig,
    DiscoverySession, EirReportDecoder, ReportDecoder, SessionState,
};
pub use hci::{HciCommand, HciEvent, HciFilter, HciSocket, LeAdvertisingReport};
pub use scan::{ScanConfig, ScanSession};
