// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Register-level model of a W5100 for host tests.
//!
//! Models the register file, the socket command register, TCP connection
//! status and the RX/TX rings with free-running pointers. The "peer" side
//! (connect, push bytes, drain sent bytes, close) is driven by the test.

use crate::regs::*;
use crate::{MemoryLayout, RegisterBus, Socket, SocketStatus};
use core::convert::Infallible;
use std::vec;
use std::vec::Vec;

const ADDRESS_SPACE: usize = 0x8000;

#[derive(Default)]
struct Peer {
    /// Peer's write pointer into the device RX ring
    rx_write: u16,
    /// Last TX pointer the peer has consumed
    tx_read: u16,
    /// Bytes sent by the device and not yet drained by the test
    outbox: Vec<u8>,
    /// Keep sent bytes in the TX ring until [`SimW5100::release_tx`]
    stall_tx: bool,
}

pub struct SimW5100 {
    mem: Vec<u8>,
    peers: [Peer; 4],
    writes: Vec<(u16, u8)>,
}

impl Default for SimW5100 {
    fn default() -> Self {
        Self::new()
    }
}

impl SimW5100 {
    pub fn new() -> Self {
        let mut sim = Self {
            mem: vec![0; ADDRESS_SPACE],
            peers: Default::default(),
            writes: Vec::new(),
        };
        sim.power_on();
        sim
    }

    /// Every register write the driver issued, in order.
    pub fn writes(&self) -> &[(u16, u8)] {
        &self.writes
    }

    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }

    /// Raw register value, without side effects.
    pub fn peek(&self, address: u16) -> u8 {
        self.mem[address as usize]
    }

    pub fn peek_u16(&self, address: u16) -> u16 {
        u16::from_be_bytes([self.peek(address), self.peek(address + 1)])
    }

    pub fn status(&self, socket: Socket) -> SocketStatus {
        SocketStatus::from(self.peek(socket.register(SN_SR)))
    }

    /// Peer connects to a listening socket.
    pub fn connect(&mut self, socket: Socket) -> bool {
        if self.status(socket) != SocketStatus::Listen {
            return false;
        }
        self.set_status(socket, SOCK_ESTABLISHED);
        true
    }

    /// Peer closes its side of an established connection.
    pub fn disconnect(&mut self, socket: Socket) {
        if self.status(socket) == SocketStatus::Established {
            self.set_status(socket, SOCK_CLOSE_WAIT);
        }
    }

    /// Peer sends bytes. Returns how many fit in the RX ring.
    pub fn push(&mut self, socket: Socket, data: &[u8]) -> usize {
        if self.status(socket) != SocketStatus::Established {
            return 0;
        }
        let ring = self.layout().rx(socket);
        let pending = self.peek_u16(socket.register(SN_RX_RSR));
        let room = (ring.size - pending) as usize;
        let count = data.len().min(room);
        let peer = &mut self.peers[socket.index()];
        let start = peer.rx_write;
        peer.rx_write = start.wrapping_add(count as u16);
        for (i, byte) in data[..count].iter().enumerate() {
            self.mem[ring.address(start, i as u16) as usize] = *byte;
        }
        self.update_rx_size(socket);
        count
    }

    /// Drain everything the device sent so far.
    pub fn take_sent(&mut self, socket: Socket) -> Vec<u8> {
        core::mem::take(&mut self.peers[socket.index()].outbox)
    }

    /// Stop the peer from reading; sent bytes stay in the TX ring and the
    /// free-space register shrinks accordingly.
    pub fn stall_tx(&mut self, socket: Socket) {
        self.peers[socket.index()].stall_tx = true;
    }

    /// Let the peer read again and collect everything queued meanwhile.
    pub fn release_tx(&mut self, socket: Socket) {
        self.peers[socket.index()].stall_tx = false;
        self.transmit(socket);
    }

    /// Put the socket's free-running buffer pointers at arbitrary positions,
    /// with both rings empty.
    pub fn seed_pointers(&mut self, socket: Socket, rx: u16, tx: u16) {
        self.store_u16(socket.register(SN_RX_RD), rx);
        self.store_u16(socket.register(SN_TX_WR), tx);
        self.store_u16(socket.register(SN_TX_RD), tx);
        let peer = &mut self.peers[socket.index()];
        peer.rx_write = rx;
        peer.tx_read = tx;
        self.update_rx_size(socket);
        self.update_tx_free(socket);
    }

    fn layout(&self) -> MemoryLayout {
        MemoryLayout::from_registers(self.peek(RMSR), self.peek(TMSR))
    }

    fn power_on(&mut self) {
        self.mem.fill(0);
        self.peers = Default::default();
        self.mem[RMSR as usize] = MemoryLayout::DEFAULT.rmsr();
        self.mem[TMSR as usize] = MemoryLayout::DEFAULT.tmsr();
        for socket in Socket::ALL {
            self.update_tx_free(socket);
        }
    }

    fn set_status(&mut self, socket: Socket, status: u8) {
        self.mem[socket.register(SN_SR) as usize] = status;
    }

    fn store_u16(&mut self, address: u16, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.mem[address as usize] = hi;
        self.mem[address as usize + 1] = lo;
    }

    fn update_rx_size(&mut self, socket: Socket) {
        let read = self.peek_u16(socket.register(SN_RX_RD));
        let pending = self.peers[socket.index()].rx_write.wrapping_sub(read);
        self.store_u16(socket.register(SN_RX_RSR), pending);
    }

    fn update_tx_free(&mut self, socket: Socket) {
        let size = self.layout().tx(socket).size;
        let write = self.peek_u16(socket.register(SN_TX_WR));
        let queued = write.wrapping_sub(self.peers[socket.index()].tx_read);
        self.store_u16(socket.register(SN_TX_FSR), size.saturating_sub(queued));
    }

    fn transmit(&mut self, socket: Socket) {
        if self.peers[socket.index()].stall_tx {
            self.update_tx_free(socket);
            return;
        }
        let ring = self.layout().tx(socket);
        let write = self.peek_u16(socket.register(SN_TX_WR));
        let start = self.peers[socket.index()].tx_read;
        let count = write.wrapping_sub(start);
        let bytes: Vec<u8> = (0..count)
            .map(|i| self.mem[ring.address(start, i) as usize])
            .collect();
        let peer = &mut self.peers[socket.index()];
        peer.outbox.extend_from_slice(&bytes);
        peer.tx_read = write;
        self.store_u16(socket.register(SN_TX_RD), write);
        self.update_tx_free(socket);
    }

    fn execute(&mut self, socket: Socket, cmd: u8) {
        match cmd {
            CMD_OPEN => {
                if self.peek(socket.register(SN_MR)) & 0x0F == SN_MR_TCP {
                    self.set_status(socket, SOCK_INIT);
                    let rx = self.peek_u16(socket.register(SN_RX_RD));
                    let tx = self.peek_u16(socket.register(SN_TX_WR));
                    self.seed_pointers(socket, rx, tx);
                }
            }
            CMD_LISTEN => {
                if self.status(socket) == SocketStatus::Init {
                    self.set_status(socket, SOCK_LISTEN);
                }
            }
            CMD_DISCON | CMD_CLOSE => self.set_status(socket, SOCK_CLOSED),
            CMD_SEND => {
                if self.status(socket) == SocketStatus::Established {
                    self.transmit(socket);
                }
            }
            CMD_RECV => self.update_rx_size(socket),
            _ => {}
        }
        // The command register reads back as zero once accepted
        self.mem[socket.register(SN_CR) as usize] = 0;
    }
}

impl RegisterBus for SimW5100 {
    type Error = Infallible;

    fn read(&mut self, address: u16) -> Result<u8, Self::Error> {
        Ok(self.mem[address as usize % ADDRESS_SPACE])
    }

    fn write(&mut self, address: u16, value: u8) -> Result<(), Self::Error> {
        self.writes.push((address, value));
        let address = address as usize % ADDRESS_SPACE;
        if address == MR as usize && value & MR_RST != 0 {
            self.power_on();
            return Ok(());
        }
        self.mem[address] = value;
        if let Some(socket) = Socket::ALL
            .into_iter()
            .find(|s| s.register(SN_CR) as usize == address)
        {
            self.execute(socket, value);
        }
        Ok(())
    }
}
