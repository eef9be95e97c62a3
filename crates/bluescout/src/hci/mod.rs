//! Bluetooth HCI (Host Controller Interface) implementation
//!
//! This module provides functionality for interacting with HCI interfaces.

use crate::error::Result;
use std::time::Duration;

pub mod constants;
pub mod filter;
pub mod packet;
pub mod socket;

#[cfg(test)]
pub(crate) mod mock;

pub use filter::HciFilter;
pub use packet::{HciCommand, HciEvent, LeAdvertisingReport};
pub use socket::HciSocket;

/// The controller operations a scan needs.
///
/// [`HciSocket`] is the real implementation; scan sessions are generic
/// over this trait so the event loop can also run against a scripted
/// controller in tests.
pub trait Controller {
    /// Issue a command and wait for the controller to acknowledge it
    fn run_command(&mut self, command: &HciCommand, timeout: Duration) -> Result<()>;

    /// Wait until an event is readable, or the timeout passes
    fn wait_readable(&mut self, timeout: Duration) -> std::io::Result<bool>;

    /// Read one raw event packet into `buf`, returning the byte count
    fn read_event(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Snapshot the current event filter
    fn filter(&mut self) -> std::io::Result<HciFilter>;

    /// Install an event filter
    fn set_filter(&mut self, filter: &HciFilter) -> std::io::Result<()>;
}
