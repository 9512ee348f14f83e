// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Driver for the WIZnet W5100 hardwired TCP/IP controller.
//!
//! The TCP stack runs inside the chip. This crate only moves bytes through
//! the per-socket circular buffers, keeps the buffer pointers up to date and
//! issues socket commands, all through single-byte register transactions on
//! a [`RegisterBus`].

#![no_std]

#[cfg(any(test, feature = "sim"))]
extern crate std;

mod fmt;

mod bus;
mod layout;
pub mod regs;
mod socket;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

#[cfg(test)]
mod tests;

pub use bus::{RegisterBus, SpiRegisterBus};
pub use layout::{MemoryLayout, Ring};
pub use socket::{Socket, SocketStatus};

use regs::*;

pub struct W5100<B> {
    bus: B,
    layout: MemoryLayout,
}

impl<B: RegisterBus> W5100<B> {
    /// Wrap a bus to a controller still in its power-on memory split.
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            layout: MemoryLayout::DEFAULT,
        }
    }

    pub fn release(self) -> B {
        self.bus
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn layout(&self) -> MemoryLayout {
        self.layout
    }

    /// Software reset. All registers go back to their power-on values.
    pub fn reset(&mut self) -> Result<(), B::Error> {
        self.bus.write(MR, MR_RST)?;
        self.layout = MemoryLayout::DEFAULT;
        Ok(())
    }

    /// Program the TX/RX memory split between the sockets.
    pub fn set_memory_layout(&mut self, layout: MemoryLayout) -> Result<(), B::Error> {
        self.bus.write(RMSR, layout.rmsr())?;
        self.bus.write(TMSR, layout.tmsr())?;
        self.layout = layout;
        Ok(())
    }

    /// Write the network identity, one byte per register: gateway, subnet
    /// mask, MAC address, then source IP. Must follow a reset and precede
    /// [`Self::listen`].
    pub fn configure_network(
        &mut self,
        gateway: &[u8; 4],
        subnet_mask: &[u8; 4],
        mac: &[u8; 6],
        device_ip: &[u8; 4],
    ) -> Result<(), B::Error> {
        self.write_block(GAR, gateway)?;
        self.write_block(SUBR, subnet_mask)?;
        self.write_block(SHAR, mac)?;
        self.write_block(SIPR, device_ip)
    }

    fn write_block(&mut self, address: u16, bytes: &[u8]) -> Result<(), B::Error> {
        for (i, byte) in bytes.iter().enumerate() {
            self.bus.write(address + i as u16, *byte)?;
        }
        Ok(())
    }

    /// Big-endian register pair.
    fn read_u16(&mut self, address: u16) -> Result<u16, B::Error> {
        let hi = self.bus.read(address)?;
        let lo = self.bus.read(address + 1)?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    fn write_u16(&mut self, address: u16, value: u16) -> Result<(), B::Error> {
        let [hi, lo] = value.to_be_bytes();
        self.bus.write(address, hi)?;
        self.bus.write(address + 1, lo)
    }
}
