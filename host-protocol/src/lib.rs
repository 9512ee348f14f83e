// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Host to bootloader upload protocol.
//! The host opens a TCP connection to the bootloader and drives a fixed-length
//! exchange: a 4-byte start command, then either an identity record or an
//! image header followed by whole pages, a read-back of every page and a
//! final confirmation. There is no framing beyond the fixed lengths below.

#![no_std]
use serde::{Deserialize, Serialize};

#[cfg(test)]
mod tests;

/// Length of a start command.
pub const COMMAND_LEN: usize = 4;

/// Reply sent by the bootloader when it accepts a start command.
pub const VERSION_REPLY: &[u8; 6] = b"V1.0\r\n";

/// Length of the image header carrying the page count.
pub const HEADER_LEN: usize = 4;

/// Token the host sends once every page read back matched.
pub const CONFIRM: &[u8; 2] = b"OK";

/// Length of a serialized [`NetworkConfig`].
pub const NETWORK_CONFIG_LEN: usize = 18;

/// Commands accepted while the bootloader waits for a session to start.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Command {
    /// Upload a new firmware image
    Program,
    /// Replace the stored network identity
    SetIdentity,
}

impl Command {
    pub const fn as_bytes(self) -> &'static [u8; COMMAND_LEN] {
        match self {
            Command::Program => b"PROG",
            Command::SetIdentity => b"IPST",
        }
    }

    /// Decode a start command, `None` for anything unrecognized.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        match bytes {
            b"PROG" => Some(Command::Program),
            b"IPST" => Some(Command::SetIdentity),
            _ => None,
        }
    }
}

/// Image header sent right after `PROG` is acknowledged.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ImageHeader {
    /// Number of whole pages that follow
    pub pages: u32,
}

impl ImageHeader {
    pub const fn from_bytes(bytes: [u8; HEADER_LEN]) -> Self {
        Self {
            pages: u32::from_le_bytes(bytes),
        }
    }

    pub const fn to_bytes(self) -> [u8; HEADER_LEN] {
        self.pages.to_le_bytes()
    }
}

/// Network identity of the device.
/// Serialized with postcard, fixed-size byte arrays carry no length prefix so
/// the wire and storage record is exactly the four fields back to back.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq)]
pub struct NetworkConfig {
    pub gateway: [u8; 4],
    pub subnet_mask: [u8; 4],
    pub mac: [u8; 6],
    pub device_ip: [u8; 4],
}

impl NetworkConfig {
    /// Identity flashed at manufacture, used until the first `IPST`.
    pub const FACTORY: Self = Self {
        gateway: [10, 0, 0, 28],
        subnet_mask: [255, 255, 255, 0],
        mac: [0xDE, 0xAD, 0xBE, 0xEF, 0xFE, 0xED],
        device_ip: [10, 0, 0, 75],
    };

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }

    pub fn to_bytes(&self) -> Result<[u8; NETWORK_CONFIG_LEN], postcard::Error> {
        let mut buf = [0u8; NETWORK_CONFIG_LEN];
        let used = postcard::to_slice(self, &mut buf)?.len();
        if used != NETWORK_CONFIG_LEN {
            return Err(postcard::Error::SerializeBufferFull);
        }
        Ok(buf)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::FACTORY
    }
}
