//! HCI packet structures and parsing
//!
//! This module contains structures and methods for building HCI command
//! packets and for parsing the events a scan produces.

use crate::hci::constants::*;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// HCI Commands used to drive LE scanning
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HciCommand {
    LeSetScanParameters {
        scan_type: u8,
        scan_interval: u16,
        scan_window: u16,
        own_address_type: u8,
        filter_policy: u8,
    },
    LeSetScanEnable {
        enable: bool,
        filter_duplicates: bool,
    },
}

impl HciCommand {
    /// Get the OGF and OCF for this command
    pub fn opcode_parts(&self) -> (u8, u16) {
        match self {
            Self::LeSetScanParameters { .. } => (OGF_LE, OCF_LE_SET_SCAN_PARAMETERS),
            Self::LeSetScanEnable { .. } => (OGF_LE, OCF_LE_SET_SCAN_ENABLE),
        }
    }

    /// Get the packed 16-bit opcode, as carried in command packets and
    /// echoed back in Command Complete/Status events
    pub fn opcode(&self) -> u16 {
        let (ogf, ocf) = self.opcode_parts();
        ((ogf as u16) << 10) | (ocf & 0x3ff)
    }

    /// Convert the command to its raw parameter bytes
    fn parameters(&self) -> Vec<u8> {
        match *self {
            Self::LeSetScanParameters {
                scan_type,
                scan_interval,
                scan_window,
                own_address_type,
                filter_policy,
            } => {
                let mut params = Vec::with_capacity(7);
                params.push(scan_type);
                params.write_u16::<LittleEndian>(scan_interval).unwrap();
                params.write_u16::<LittleEndian>(scan_window).unwrap();
                params.push(own_address_type);
                params.push(filter_policy);
                params
            }

            Self::LeSetScanEnable {
                enable,
                filter_duplicates,
            } => {
                vec![enable as u8, filter_duplicates as u8]
            }
        }
    }

    /// Convert the command to a raw HCI packet
    pub fn to_packet(&self) -> Vec<u8> {
        let params = self.parameters();

        let mut packet = vec![HCI_COMMAND_PKT];
        packet.write_u16::<LittleEndian>(self.opcode()).unwrap();
        packet.push(params.len() as u8);
        packet.extend_from_slice(&params);
        packet
    }
}

/// HCI Event packet
#[derive(Debug, Clone)]
pub struct HciEvent {
    pub event_code: u8,
    pub parameter_total_length: u8,
    pub parameters: Vec<u8>,
}

impl HciEvent {
    /// Parse an HCI event from raw bytes (starting at the event code,
    /// after the packet indicator)
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 2 {
            return None;
        }

        let event_code = data[0];
        let parameter_total_length = data[1];

        if data.len() < (parameter_total_length as usize + 2) {
            return None;
        }

        let parameters = data[2..(parameter_total_length as usize + 2)].to_vec();

        Some(HciEvent {
            event_code,
            parameter_total_length,
            parameters,
        })
    }
}

/// Command Complete event parameters
#[derive(Debug, Clone, Copy)]
pub struct CommandComplete {
    pub num_packets: u8,
    pub opcode: u16,
    pub status: u8,
}

impl CommandComplete {
    /// Parse the common prefix of a Command Complete event's parameters
    pub fn parse(params: &[u8]) -> Option<Self> {
        if params.len() < 4 {
            return None;
        }

        let mut cursor = Cursor::new(params);
        let num_packets = cursor.read_u8().ok()?;
        let opcode = cursor.read_u16::<LittleEndian>().ok()?;
        let status = cursor.read_u8().ok()?;

        Some(Self {
            num_packets,
            opcode,
            status,
        })
    }
}

/// Command Status event parameters
#[derive(Debug, Clone, Copy)]
pub struct CommandStatus {
    pub status: u8,
    pub num_packets: u8,
    pub opcode: u16,
}

impl CommandStatus {
    pub fn parse(params: &[u8]) -> Option<Self> {
        if params.len() < 4 {
            return None;
        }

        let mut cursor = Cursor::new(params);
        let status = cursor.read_u8().ok()?;
        let num_packets = cursor.read_u8().ok()?;
        let opcode = cursor.read_u16::<LittleEndian>().ok()?;

        Some(Self {
            status,
            num_packets,
            opcode,
        })
    }
}

/// One LE Advertising Report, lifted out of a raw LE Meta event packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeAdvertisingReport {
    pub event_type: u8,
    pub address_type: u8,
    /// Device address in wire order (least significant byte first)
    pub address: [u8; 6],
    /// Raw EIR/advertising data payload
    pub data: Vec<u8>,
    /// Signal strength in dBm; +127 when the controller reports none
    pub rssi: i8,
}

impl LeAdvertisingReport {
    /// Extract the first advertising report from a raw event buffer as it
    /// comes off the socket, packet indicator included.
    ///
    /// Layout: indicator, event code, parameter length, subevent,
    /// report count, then per report the event type, address type, a
    /// 6-byte address, the data length, the data itself and a trailing
    /// RSSI byte. Returns `None` for anything that is not a well-formed
    /// advertising report, including buffers truncated at any boundary.
    pub fn from_raw(buf: &[u8]) -> Option<Self> {
        if buf.len() < 5 {
            return None;
        }
        if buf[0] != HCI_EVENT_PKT || buf[1] != EVT_LE_META_EVENT {
            return None;
        }
        if buf[3] != EVT_LE_ADVERTISING_REPORT {
            return None;
        }

        let num_reports = buf[4];
        if num_reports == 0 {
            return None;
        }

        // Only the first report in the event is extracted
        if buf.len() < 14 {
            return None;
        }

        let event_type = buf[5];
        let address_type = buf[6];

        let mut address = [0u8; 6];
        address.copy_from_slice(&buf[7..13]);

        let data_len = buf[13] as usize;
        if buf.len() < 14 + data_len + 1 {
            return None;
        }

        let data = buf[14..14 + data_len].to_vec();

        // 0x99 is the "RSSI not available" marker some controllers emit
        let raw_rssi = buf[14 + data_len];
        let rssi = if raw_rssi == 0x99 {
            127
        } else {
            raw_rssi as i8
        };

        Some(LeAdvertisingReport {
            event_type,
            address_type,
            address,
            data,
            rssi,
        })
    }
}
