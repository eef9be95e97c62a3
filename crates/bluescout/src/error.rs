//! Error types for the bluescout library
//!
//! This module defines the error types used throughout the library.

use thiserror::Error;

/// Errors that can occur while discovering BLE devices
#[derive(Error, Debug)]
pub enum Error {
    /// The device identifier did not resolve to a controller index
    #[error("Unknown HCI device: {0}")]
    DeviceNotFound(String),

    /// Opening or binding the controller socket failed
    #[error("Failed to open HCI device: {0}")]
    DeviceOpen(#[source] std::io::Error),

    /// A scan parameter, enable or disable command failed
    #[error("{0}")]
    ScanConfig(String),

    /// Reading or installing the socket event filter failed
    #[error("Could not access socket filter options: {0}")]
    Filter(#[source] std::io::Error),

    /// The read primitive itself failed (distinct from a timed-out wait)
    #[error("Failed to read HCI event: {0}")]
    Read(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
