//! HCI protocol constants
//!
//! This module contains constants used in the Bluetooth HCI protocol.

// HCI packet types
pub const HCI_COMMAND_PKT: u8 = 0x01;
pub const HCI_ACL_PKT: u8 = 0x02;
pub const HCI_SCO_PKT: u8 = 0x03;
pub const HCI_EVENT_PKT: u8 = 0x04;
pub const HCI_ISO_PKT: u8 = 0x05;

// Maximum size of one HCI event packet (indicator byte + header + parameters)
pub const HCI_MAX_EVENT_SIZE: usize = 260;

// Opcode group for LE controller commands
pub const OGF_LE: u8 = 0x08;

// LE command OCF values (OGF: 0x08)
pub const OCF_LE_SET_SCAN_PARAMETERS: u16 = 0x000B;
pub const OCF_LE_SET_SCAN_ENABLE: u16 = 0x000C;

// HCI events
pub const EVT_CMD_COMPLETE: u8 = 0x0E;
pub const EVT_CMD_STATUS: u8 = 0x0F;
pub const EVT_LE_META_EVENT: u8 = 0x3E;

// LE meta events
pub const EVT_LE_CONN_COMPLETE: u8 = 0x01;
pub const EVT_LE_ADVERTISING_REPORT: u8 = 0x02;

// LE scan types
pub const LE_SCAN_PASSIVE: u8 = 0x00;
pub const LE_SCAN_ACTIVE: u8 = 0x01;

// LE address types
pub const LE_PUBLIC_ADDRESS: u8 = 0x00;
pub const LE_RANDOM_ADDRESS: u8 = 0x01;
pub const LE_PUBLIC_IDENTITY_ADDRESS: u8 = 0x02;
pub const LE_RANDOM_IDENTITY_ADDRESS: u8 = 0x03;
