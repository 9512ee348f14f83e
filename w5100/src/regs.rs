// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! W5100 register map.

/// SPI opcode for a register write
pub const OPCODE_WRITE: u8 = 0xF0;
/// SPI opcode for a register read
pub const OPCODE_READ: u8 = 0x0F;

// Common registers
pub const MR: u16 = 0x0000;
pub const GAR: u16 = 0x0001;
pub const SUBR: u16 = 0x0005;
pub const SHAR: u16 = 0x0009;
pub const SIPR: u16 = 0x000F;
pub const RMSR: u16 = 0x001A;
pub const TMSR: u16 = 0x001B;

/// Software reset bit of the mode register, self-clearing
pub const MR_RST: u8 = 0x80;

// Socket registers, relative to the socket block
pub const SOCKET_BASE: u16 = 0x0400;
pub const SOCKET_STRIDE: u16 = 0x0100;
pub const SN_MR: u16 = 0x00;
pub const SN_CR: u16 = 0x01;
pub const SN_SR: u16 = 0x03;
pub const SN_PORT: u16 = 0x04;
pub const SN_TX_FSR: u16 = 0x20;
pub const SN_TX_RD: u16 = 0x22;
pub const SN_TX_WR: u16 = 0x24;
pub const SN_RX_RSR: u16 = 0x26;
pub const SN_RX_RD: u16 = 0x28;

/// Socket mode: TCP
pub const SN_MR_TCP: u8 = 0x01;

// Socket commands
pub const CMD_OPEN: u8 = 0x01;
pub const CMD_LISTEN: u8 = 0x02;
pub const CMD_DISCON: u8 = 0x08;
pub const CMD_CLOSE: u8 = 0x10;
pub const CMD_SEND: u8 = 0x20;
pub const CMD_RECV: u8 = 0x40;

// Socket status values
pub const SOCK_CLOSED: u8 = 0x00;
pub const SOCK_INIT: u8 = 0x13;
pub const SOCK_LISTEN: u8 = 0x14;
pub const SOCK_ESTABLISHED: u8 = 0x17;
pub const SOCK_CLOSE_WAIT: u8 = 0x1C;

// Buffer memory
pub const TX_BASE: u16 = 0x4000;
pub const RX_BASE: u16 = 0x6000;
/// Size of each of the TX and RX memories shared by the four sockets
pub const BUFFER_MEMORY: u16 = 0x2000;
