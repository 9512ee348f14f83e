// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Byte-stream TCP sockets on top of the controller's circular buffers.
//!
//! Buffer pointers are free-running 16-bit values owned by the controller;
//! the ring offset is the pointer masked by the ring size. Pointers are only
//! moved by the explicit write-back + RECV/SEND command at the end of a
//! transfer, never by the copy itself, so a transfer interrupted by a bus
//! fault can simply be retried.

use crate::regs::*;
use crate::{RegisterBus, W5100};

/// One of the four hardware sockets.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Socket {
    S0,
    S1,
    S2,
    S3,
}

impl Socket {
    pub const ALL: [Socket; 4] = [Socket::S0, Socket::S1, Socket::S2, Socket::S3];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Address of a socket register.
    pub const fn register(self, offset: u16) -> u16 {
        SOCKET_BASE + self.index() as u16 * SOCKET_STRIDE + offset
    }
}

/// Decoded connection-status register.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SocketStatus {
    Closed,
    Init,
    Listen,
    Established,
    /// The peer closed its side of the connection
    CloseWait,
    /// Transitional or non-TCP states
    Other(u8),
}

impl From<u8> for SocketStatus {
    fn from(value: u8) -> Self {
        match value {
            SOCK_CLOSED => SocketStatus::Closed,
            SOCK_INIT => SocketStatus::Init,
            SOCK_LISTEN => SocketStatus::Listen,
            SOCK_ESTABLISHED => SocketStatus::Established,
            SOCK_CLOSE_WAIT => SocketStatus::CloseWait,
            other => SocketStatus::Other(other),
        }
    }
}

impl<B: RegisterBus> W5100<B> {
    /// Bytes waiting in the socket's receive buffer.
    pub fn rx_available(&mut self, socket: Socket) -> Result<u16, B::Error> {
        self.read_u16(socket.register(SN_RX_RSR))
    }

    /// Free space in the socket's transmit buffer.
    pub fn tx_free(&mut self, socket: Socket) -> Result<u16, B::Error> {
        self.read_u16(socket.register(SN_TX_FSR))
    }

    pub fn status(&mut self, socket: Socket) -> Result<SocketStatus, B::Error> {
        self.bus.read(socket.register(SN_SR)).map(SocketStatus::from)
    }

    /// Fill `buf` from the receive buffer and hand the space back to the
    /// controller.
    ///
    /// The caller checks [`Self::rx_available`] first. Asking for more than
    /// is buffered returns stale bytes from the ring rather than failing.
    pub fn receive(&mut self, socket: Socket, buf: &mut [u8]) -> Result<(), B::Error> {
        let ring = self.layout.rx(socket);
        if ring.is_empty() {
            warn!("receive on {} without rx memory", socket);
            return Ok(());
        }
        let len = buf.len() as u16;
        let pointer = self.read_u16(socket.register(SN_RX_RD))?;
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.bus.read(ring.address(pointer, i as u16))?;
        }
        self.write_u16(socket.register(SN_RX_RD), pointer.wrapping_add(len))?;
        self.command(socket, CMD_RECV)?;
        trace!("rx {} bytes at {=u16:#x}", len, pointer);
        Ok(())
    }

    /// Queue `data` for transmission.
    ///
    /// Returns 0 without touching the buffer unless the connection is
    /// established, otherwise the number of bytes queued. The caller checks
    /// [`Self::tx_free`] first; sending more overwrites unsent data.
    pub fn send(&mut self, socket: Socket, data: &[u8]) -> Result<usize, B::Error> {
        if self.status(socket)? != SocketStatus::Established {
            return Ok(0);
        }
        let ring = self.layout.tx(socket);
        if ring.is_empty() {
            warn!("send on {} without tx memory", socket);
            return Ok(0);
        }
        let len = data.len() as u16;
        let pointer = self.read_u16(socket.register(SN_TX_WR))?;
        for (i, byte) in data.iter().enumerate() {
            self.bus.write(ring.address(pointer, i as u16), *byte)?;
        }
        self.write_u16(socket.register(SN_TX_WR), pointer.wrapping_add(len))?;
        self.command(socket, CMD_SEND)?;
        trace!("tx {} bytes at {=u16:#x}", len, pointer);
        Ok(data.len())
    }

    /// Open the socket in TCP mode and wait for a peer on `port`.
    /// A connecting peer moves the socket to established on its own.
    pub fn listen(&mut self, socket: Socket, port: u16) -> Result<(), B::Error> {
        self.bus.write(socket.register(SN_MR), SN_MR_TCP)?;
        self.write_u16(socket.register(SN_PORT), port)?;
        self.command(socket, CMD_OPEN)?;
        self.command(socket, CMD_LISTEN)?;
        debug!("{} listening on port {}", socket, port);
        Ok(())
    }

    /// Drop the connection and release the socket.
    pub fn close(&mut self, socket: Socket) -> Result<(), B::Error> {
        self.command(socket, CMD_CLOSE)
    }

    fn command(&mut self, socket: Socket, cmd: u8) -> Result<(), B::Error> {
        self.bus.write(socket.register(SN_CR), cmd)
    }
}
