//! HCI socket implementation for Bluetooth communication
//!
//! This module provides a wrapper around the raw HCI socket interface,
//! allowing for communication with Bluetooth controllers.

use crate::error::{Error, Result};
use crate::hci::constants::*;
use crate::hci::filter::HciFilter;
use crate::hci::packet::{CommandComplete, CommandStatus, HciCommand, HciEvent};
use crate::hci::Controller;
use log::warn;
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

// Bluetooth socket constants
const AF_BLUETOOTH: i32 = 31;
const BTPROTO_HCI: i32 = 1;
const HCI_CHANNEL_RAW: i32 = 0;

// Socket option level and name for the kernel event filter
const SOL_HCI: libc::c_int = 0;
const HCI_FILTER: libc::c_int = 2;

/// Resolve a device name like "hci0" to its controller index
pub fn device_index(device: &str) -> Result<u16> {
    device
        .strip_prefix("hci")
        .and_then(|index| index.parse::<u16>().ok())
        .ok_or_else(|| Error::DeviceNotFound(device.to_string()))
}

/// Represents an HCI socket
#[derive(Debug)]
pub struct HciSocket {
    fd: RawFd,
}

// Define the sockaddr_hci structure
#[repr(C)]
struct SockaddrHci {
    hci_family: libc::sa_family_t,
    hci_dev: u16,
    hci_channel: u16,
}

impl HciSocket {
    /// Opens a raw HCI socket bound to the given controller index
    /// (0 for the first device).
    ///
    /// Raw HCI access requires CAP_NET_ADMIN, so this typically fails
    /// with a permission error for unprivileged processes.
    pub fn open(dev_id: u16) -> Result<Self> {
        let fd = unsafe { libc::socket(AF_BLUETOOTH, libc::SOCK_RAW, BTPROTO_HCI) };

        if fd < 0 {
            return Err(Error::DeviceOpen(std::io::Error::last_os_error()));
        }

        // Bind to the specified device
        let addr = SockaddrHci {
            hci_family: AF_BLUETOOTH as libc::sa_family_t,
            hci_dev: dev_id,
            hci_channel: HCI_CHANNEL_RAW as u16,
        };

        let result = unsafe {
            libc::bind(
                fd,
                &addr as *const _ as *const libc::sockaddr,
                std::mem::size_of::<SockaddrHci>() as libc::socklen_t,
            )
        };

        if result < 0 {
            let err = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(Error::DeviceOpen(err));
        }

        Ok(HciSocket { fd })
    }

    /// Wait until the socket has an event to read, or the timeout passes.
    ///
    /// Returns `Ok(false)` on timeout and on an interrupted wait.
    pub fn wait_readable(&self, timeout: Duration) -> std::io::Result<bool> {
        let mut read_fds: libc::fd_set = unsafe { std::mem::zeroed() };
        unsafe {
            libc::FD_ZERO(&mut read_fds);
            libc::FD_SET(self.fd, &mut read_fds);
        }

        let mut timeout_val = libc::timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        };

        let result = unsafe {
            libc::select(
                self.fd + 1,
                &mut read_fds,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                &mut timeout_val,
            )
        };

        if result < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(err);
        }

        Ok(result > 0)
    }

    /// Read one raw event packet into `buf`, returning the byte count.
    /// An interrupted read returns `Ok(0)`.
    pub fn read_event(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        let bytes_read =
            unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };

        if bytes_read < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(0);
            }
            return Err(err);
        }

        Ok(bytes_read as usize)
    }

    /// Sends an HCI command packet without waiting for a response
    pub fn send_command(&self, command: &HciCommand) -> std::io::Result<()> {
        let packet = command.to_packet();
        match unsafe {
            libc::write(
                self.fd,
                packet.as_ptr() as *const libc::c_void,
                packet.len(),
            )
        } {
            -1 => Err(std::io::Error::last_os_error()),
            _ => Ok(()),
        }
    }

    /// Reads the socket's current event filter
    pub fn filter(&self) -> std::io::Result<HciFilter> {
        let mut filter = HciFilter::new();
        let mut len = std::mem::size_of::<HciFilter>() as libc::socklen_t;

        let result = unsafe {
            libc::getsockopt(
                self.fd,
                SOL_HCI,
                HCI_FILTER,
                &mut filter as *mut _ as *mut libc::c_void,
                &mut len,
            )
        };

        if result < 0 {
            return Err(std::io::Error::last_os_error());
        }

        Ok(filter)
    }

    /// Installs an event filter on the socket
    pub fn set_filter(&self, filter: &HciFilter) -> std::io::Result<()> {
        let result = unsafe {
            libc::setsockopt(
                self.fd,
                SOL_HCI,
                HCI_FILTER,
                filter as *const _ as *const libc::c_void,
                std::mem::size_of::<HciFilter>() as libc::socklen_t,
            )
        };

        if result < 0 {
            return Err(std::io::Error::last_os_error());
        }

        Ok(())
    }

    /// Issue a command and wait for the controller to acknowledge it.
    ///
    /// The socket filter is swapped for one that only admits Command
    /// Complete/Status events for this opcode, and the previous filter is
    /// restored afterwards whether or not the command succeeded.
    pub fn run_command(&self, command: &HciCommand, timeout: Duration) -> Result<()> {
        let opcode = command.opcode();

        let saved = self.filter().map_err(Error::Filter)?;

        let mut response_filter = HciFilter::new();
        response_filter.set_packet_type(HCI_EVENT_PKT);
        response_filter.set_event(EVT_CMD_COMPLETE);
        response_filter.set_event(EVT_CMD_STATUS);
        response_filter.set_opcode(opcode);
        self.set_filter(&response_filter).map_err(Error::Filter)?;

        let result = self.await_response(command, opcode, timeout);

        if let Err(err) = self.set_filter(&saved) {
            warn!("Failed to restore socket filter: {}", err);
        }

        result
    }

    fn await_response(&self, command: &HciCommand, opcode: u16, timeout: Duration) -> Result<()> {
        self.send_command(command).map_err(|err| {
            Error::ScanConfig(format!("Failed to send command 0x{:04x}: {}", opcode, err))
        })?;

        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::ScanConfig(format!(
                    "Timed out waiting for response to command 0x{:04x}",
                    opcode
                )));
            }

            let readable = self
                .wait_readable(deadline - now)
                .map_err(|err| Error::ScanConfig(format!("Socket wait failed: {}", err)))?;
            if !readable {
                continue;
            }

            let mut buf = [0u8; HCI_MAX_EVENT_SIZE];
            let len = self
                .read_event(&mut buf)
                .map_err(|err| Error::ScanConfig(format!("Socket read failed: {}", err)))?;
            if len < 2 || buf[0] != HCI_EVENT_PKT {
                continue;
            }

            let event = match HciEvent::parse(&buf[1..len]) {
                Some(event) => event,
                None => continue,
            };

            match event.event_code {
                EVT_CMD_COMPLETE => {
                    if let Some(complete) = CommandComplete::parse(&event.parameters) {
                        if complete.opcode != opcode {
                            continue;
                        }
                        if complete.status != 0 {
                            return Err(Error::ScanConfig(format!(
                                "Command 0x{:04x} failed with status 0x{:02x}",
                                opcode, complete.status
                            )));
                        }
                        return Ok(());
                    }
                }
                EVT_CMD_STATUS => {
                    // Status zero only means the command is in flight;
                    // keep waiting for the completion
                    if let Some(status) = CommandStatus::parse(&event.parameters) {
                        if status.opcode == opcode && status.status != 0 {
                            return Err(Error::ScanConfig(format!(
                                "Command 0x{:04x} failed with status 0x{:02x}",
                                opcode, status.status
                            )));
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

impl Controller for HciSocket {
    fn run_command(&mut self, command: &HciCommand, timeout: Duration) -> Result<()> {
        HciSocket::run_command(self, command, timeout)
    }

    fn wait_readable(&mut self, timeout: Duration) -> std::io::Result<bool> {
        HciSocket::wait_readable(self, timeout)
    }

    fn read_event(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        HciSocket::read_event(self, buf)
    }

    fn filter(&mut self) -> std::io::Result<HciFilter> {
        HciSocket::filter(self)
    }

    fn set_filter(&mut self, filter: &HciFilter) -> std::io::Result<()> {
        HciSocket::set_filter(self, filter)
    }
}

impl AsRawFd for HciSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for HciSocket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}
