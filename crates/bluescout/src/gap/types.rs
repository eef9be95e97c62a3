use crate::eir::{AdFlags, EIR_FLAGS, EIR_MANUFACTURER_SPECIFIC, EIR_TX_POWER};
use crate::hci::constants::*;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    Public,
    Random,
    PublicIdentity,
    RandomIdentity,
}

impl From<u8> for AddressType {
    fn from(value: u8) -> Self {
        match value {
            LE_PUBLIC_ADDRESS => AddressType::Public,
            LE_RANDOM_ADDRESS => AddressType::Random,
            LE_PUBLIC_IDENTITY_ADDRESS => AddressType::PublicIdentity,
            LE_RANDOM_IDENTITY_ADDRESS => AddressType::RandomIdentity,
            _ => AddressType::Public,
        }
    }
}

impl From<AddressType> for u8 {
    fn from(value: AddressType) -> Self {
        match value {
            AddressType::Public => LE_PUBLIC_ADDRESS,
            AddressType::Random => LE_RANDOM_ADDRESS,
            AddressType::PublicIdentity => LE_PUBLIC_IDENTITY_ADDRESS,
            AddressType::RandomIdentity => LE_RANDOM_IDENTITY_ADDRESS,
        }
    }
}

/// A 6-byte Bluetooth device address, stored in wire order (least
/// significant byte first, as it appears in advertising reports)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BdAddr {
    pub bytes: [u8; 6],
}

impl BdAddr {
    pub fn new(bytes: [u8; 6]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() >= 6 {
            let mut bytes = [0u8; 6];
            bytes.copy_from_slice(&slice[0..6]);
            Some(Self { bytes })
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.bytes[5],
            self.bytes[4],
            self.bytes[3],
            self.bytes[2],
            self.bytes[1],
            self.bytes[0]
        )
    }
}

/// Error parsing a Bluetooth address string
#[derive(Debug, Clone, PartialEq)]
pub enum AddrParseError {
    InvalidLength,
    HexError(hex::FromHexError),
}

impl From<hex::FromHexError> for AddrParseError {
    fn from(err: hex::FromHexError) -> Self {
        AddrParseError::HexError(err)
    }
}

impl FromStr for BdAddr {
    type Err = AddrParseError;

    /// Parses `"AA:BB:CC:DD:EE:FF"`; separators are ignored, so the
    /// bare hex form works too
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s.chars().filter(|c| c.is_ascii_hexdigit()).collect();

        if cleaned.len() != 12 {
            return Err(AddrParseError::InvalidLength);
        }

        let mut display_order = [0u8; 6];
        hex::decode_to_slice(&cleaned, &mut display_order)?;

        display_order.reverse(); // Display order to wire order
        Ok(BdAddr::new(display_order))
    }
}

/// One decoded advertisement as received from a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub address: BdAddr,
    pub address_type: AddressType,
    /// Device name, empty when the advertisement carried none
    pub name: String,
    /// Signal strength in dBm, +127 when unavailable
    pub rssi: i8,
    /// Raw EIR field values keyed by type tag
    pub fields: HashMap<u8, Vec<u8>>,
}

impl Advertisement {
    /// Advertisement flags, when the flags field is present
    pub fn flags(&self) -> Option<AdFlags> {
        self.fields
            .get(&EIR_FLAGS)
            .and_then(|value| value.first())
            .map(|bits| AdFlags::from_bits_truncate(*bits))
    }

    /// Advertised TX power level in dBm
    pub fn tx_power(&self) -> Option<i8> {
        self.fields
            .get(&EIR_TX_POWER)
            .and_then(|value| value.first())
            .map(|raw| *raw as i8)
    }

    /// Manufacturer-specific data, company identifier included
    pub fn manufacturer_data(&self) -> Option<&[u8]> {
        self.fields
            .get(&EIR_MANUFACTURER_SPECIFIC)
            .map(|value| value.as_slice())
    }
}
