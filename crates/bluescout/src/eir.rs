//! EIR (Extended Inquiry Response) decoding
//!
//! This module decodes the length-prefixed TLV records BLE devices embed
//! in advertising data: device name, flags, service UUIDs, manufacturer
//! data and so on.

use bitflags::bitflags;
use std::collections::HashMap;

// EIR field type tags
pub const EIR_FLAGS: u8 = 0x01;
pub const EIR_UUID16_INCOMPLETE: u8 = 0x02;
pub const EIR_UUID16_COMPLETE: u8 = 0x03;
pub const EIR_UUID32_INCOMPLETE: u8 = 0x04;
pub const EIR_UUID32_COMPLETE: u8 = 0x05;
pub const EIR_UUID128_INCOMPLETE: u8 = 0x06;
pub const EIR_UUID128_COMPLETE: u8 = 0x07;
pub const EIR_NAME_SHORT: u8 = 0x08;
pub const EIR_NAME_COMPLETE: u8 = 0x09;
pub const EIR_TX_POWER: u8 = 0x0A;
pub const EIR_SOLICIT_UUID16: u8 = 0x14;
pub const EIR_SOLICIT_UUID128: u8 = 0x15;
pub const EIR_SERVICE_DATA_UUID16: u8 = 0x16;
pub const EIR_PUBLIC_TARGET_ADDRESS: u8 = 0x17;
pub const EIR_RANDOM_TARGET_ADDRESS: u8 = 0x18;
pub const EIR_APPEARANCE: u8 = 0x19;
pub const EIR_ADVERTISING_INTERVAL: u8 = 0x1A;
pub const EIR_SOLICIT_UUID32: u8 = 0x1F;
pub const EIR_SERVICE_DATA_UUID32: u8 = 0x20;
pub const EIR_SERVICE_DATA_UUID128: u8 = 0x21;
pub const EIR_MANUFACTURER_SPECIFIC: u8 = 0xFF;

bitflags! {
    /// Advertisement flags carried in the 0x01 EIR field
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AdFlags: u8 {
        const LE_LIMITED_DISCOVERABLE = 0x01;
        const LE_GENERAL_DISCOVERABLE = 0x02;
        const BR_EDR_NOT_SUPPORTED = 0x04;
        const SIMULTANEOUS_LE_BR_CONTROLLER = 0x08;
        const SIMULTANEOUS_LE_BR_HOST = 0x10;
    }
}

/// Decoded advertising data: the device name plus every field keyed by
/// its type tag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EirData {
    /// Device name from the first short or complete local name field,
    /// empty when the advertisement carries neither
    pub name: String,
    /// Raw field values keyed by type tag; the first occurrence of a
    /// tag wins
    pub fields: HashMap<u8, Vec<u8>>,
}

/// Decode a buffer of EIR records.
///
/// Each record is one length byte `L` followed by `L` bytes, of which
/// the first is the type tag. Decoding stops at a zero length byte or
/// at a record that would run past the end of the buffer; whatever was
/// accumulated up to that point is returned. Radio payloads are
/// routinely truncated mid-record, so this is not an error.
pub fn decode(data: &[u8]) -> EirData {
    let mut name = None;
    let mut fields = HashMap::new();

    let mut offset = 0;
    while offset < data.len() {
        let length = data[offset] as usize;
        if length == 0 {
            break;
        }
        if offset + 1 + length > data.len() {
            break;
        }

        let tag = data[offset + 1];
        let value = &data[offset + 2..offset + 1 + length];

        if name.is_none() && (tag == EIR_NAME_SHORT || tag == EIR_NAME_COMPLETE) {
            name = Some(String::from_utf8_lossy(value).into_owned());
        }

        fields.entry(tag).or_insert_with(|| value.to_vec());

        offset += 1 + length;
    }

    EirData {
        name: name.unwrap_or_default(),
        fields,
    }
}
