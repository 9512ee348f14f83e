// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

use super::*;
use core::convert::Infallible;
use embedded_hal::spi::{ErrorType, Operation, SpiDevice};
use std::vec::Vec;

/// Records every chip-select frame as the bytes clocked out.
struct Recorder {
    frames: Vec<Vec<u8>>,
    reply: u8,
}

impl ErrorType for Recorder {
    type Error = Infallible;
}

impl SpiDevice for Recorder {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
        let mut frame = Vec::new();
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => frame.extend_from_slice(bytes),
                Operation::Read(buf) => {
                    for byte in buf.iter_mut() {
                        *byte = self.reply;
                        frame.push(0x00);
                    }
                }
                _ => panic!("unexpected spi operation"),
            }
        }
        self.frames.push(frame);
        Ok(())
    }
}

#[test]
fn spi_write_frame() {
    let mut bus = SpiRegisterBus::new(Recorder {
        frames: Vec::new(),
        reply: 0,
    });
    bus.write(0x0425, 0xA5).unwrap();

    let spi = bus.release();
    assert_eq!(spi.frames, [[0xF0, 0x04, 0x25, 0xA5]]);
}

#[test]
fn spi_read_frame() {
    let mut bus = SpiRegisterBus::new(Recorder {
        frames: Vec::new(),
        reply: 0x17,
    });
    assert_eq!(bus.read(0x0403).unwrap(), 0x17);

    let spi = bus.release();
    // opcode, address high byte first, then one dummy byte while reading
    assert_eq!(spi.frames, [[0x0F, 0x04, 0x03, 0x00]]);
}

#[test]
fn default_memory_split() {
    let layout = MemoryLayout::DEFAULT;
    for (n, socket) in Socket::ALL.into_iter().enumerate() {
        let offset = n as u16 * 0x0800;
        assert_eq!(layout.rx(socket), Ring { base: 0x6000 + offset, size: 0x0800 });
        assert_eq!(layout.tx(socket), Ring { base: 0x4000 + offset, size: 0x0800 });
    }
}

#[test]
fn single_socket_split() {
    let layout = MemoryLayout::SINGLE_SOCKET;
    assert_eq!(layout.rx(Socket::S0), Ring { base: 0x6000, size: 0x2000 });
    assert_eq!(layout.tx(Socket::S0), Ring { base: 0x4000, size: 0x2000 });
    for socket in [Socket::S1, Socket::S2, Socket::S3] {
        assert!(layout.rx(socket).is_empty());
        assert!(layout.tx(socket).is_empty());
    }
}

#[test]
fn uneven_split() {
    // 4K, 2K, 1K, 1K
    let layout = MemoryLayout::from_registers(0b00_00_01_10, 0x55);
    assert_eq!(layout.rx(Socket::S0), Ring { base: 0x6000, size: 0x1000 });
    assert_eq!(layout.rx(Socket::S1), Ring { base: 0x7000, size: 0x0800 });
    assert_eq!(layout.rx(Socket::S2), Ring { base: 0x7800, size: 0x0400 });
    assert_eq!(layout.rx(Socket::S3), Ring { base: 0x7C00, size: 0x0400 });
}

#[test]
fn ring_addressing_wraps() {
    let ring = Ring { base: 0x6000, size: 0x0800 };
    assert_eq!(ring.address(0x07FF, 0), 0x67FF);
    assert_eq!(ring.address(0x07FF, 1), 0x6000);
    assert_eq!(ring.address(0xFFFF, 2), 0x6001);
}

#[test]
fn socket_registers() {
    assert_eq!(Socket::S0.register(regs::SN_SR), 0x0403);
    assert_eq!(Socket::S2.register(regs::SN_RX_RD), 0x0628);
}

#[test]
fn status_decoding() {
    assert_eq!(SocketStatus::from(0x00), SocketStatus::Closed);
    assert_eq!(SocketStatus::from(0x13), SocketStatus::Init);
    assert_eq!(SocketStatus::from(0x14), SocketStatus::Listen);
    assert_eq!(SocketStatus::from(0x17), SocketStatus::Established);
    assert_eq!(SocketStatus::from(0x1C), SocketStatus::CloseWait);
    assert_eq!(SocketStatus::from(0x22), SocketStatus::Other(0x22));
}
