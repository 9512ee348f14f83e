// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::regs::{BUFFER_MEMORY, RX_BASE, TX_BASE};
use crate::Socket;

/// One socket's circular buffer inside the controller's TX or RX memory.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Ring {
    pub base: u16,
    /// Always a power of two, or zero when the socket got no memory
    pub size: u16,
}

impl Ring {
    /// Register address of byte `i` past the free-running `pointer`.
    pub const fn address(&self, pointer: u16, i: u16) -> u16 {
        self.base + (pointer.wrapping_add(i) & self.size.wrapping_sub(1))
    }

    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// Split of the 8 KiB TX and RX memories between the four sockets, as
/// programmed through the TMSR/RMSR registers.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MemoryLayout {
    rmsr: u8,
    tmsr: u8,
    rx: [Ring; 4],
    tx: [Ring; 4],
}

impl MemoryLayout {
    /// Power-on split, 2 KiB per socket in each direction.
    pub const DEFAULT: Self = Self::from_registers(0x55, 0x55);

    /// All 8 KiB of each memory given to socket 0, the other sockets get none.
    pub const SINGLE_SOCKET: Self = Self::from_registers(0x03, 0x03);

    /// Decode the RMSR and TMSR values.
    /// Two bits per socket starting at socket 0 select 1, 2, 4 or 8 KiB.
    /// Memory is handed out in socket order, a socket that does not fit in
    /// what is left gets nothing.
    pub const fn from_registers(rmsr: u8, tmsr: u8) -> Self {
        Self {
            rmsr,
            tmsr,
            rx: split(RX_BASE, rmsr),
            tx: split(TX_BASE, tmsr),
        }
    }

    pub const fn rmsr(&self) -> u8 {
        self.rmsr
    }

    pub const fn tmsr(&self) -> u8 {
        self.tmsr
    }

    pub const fn rx(&self, socket: Socket) -> Ring {
        self.rx[socket.index()]
    }

    pub const fn tx(&self, socket: Socket) -> Ring {
        self.tx[socket.index()]
    }
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

const fn split(base: u16, reg: u8) -> [Ring; 4] {
    let mut rings = [Ring { base, size: 0 }; 4];
    let mut used: u16 = 0;
    let mut n = 0;
    while n < 4 {
        let size = 1024u16 << ((reg >> (2 * n)) & 0x03);
        if used + size <= BUFFER_MEMORY {
            rings[n] = Ring { base: base + used, size };
            used += size;
        } else {
            rings[n] = Ring { base: base + used, size: 0 };
        }
        n += 1;
    }
    rings
}
