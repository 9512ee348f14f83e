// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::regs::{OPCODE_READ, OPCODE_WRITE};
use embedded_hal::spi::{Operation, SpiDevice};

/// Byte-wide access to the controller's 16-bit register address space.
///
/// Transactions are assumed to always complete; a stuck controller is not
/// detected here. `Error` only carries faults of the underlying link.
pub trait RegisterBus {
    type Error;

    fn read(&mut self, address: u16) -> Result<u8, Self::Error>;

    fn write(&mut self, address: u16, value: u8) -> Result<(), Self::Error>;
}

impl<T: RegisterBus + ?Sized> RegisterBus for &mut T {
    type Error = T::Error;

    fn read(&mut self, address: u16) -> Result<u8, Self::Error> {
        T::read(self, address)
    }

    fn write(&mut self, address: u16, value: u8) -> Result<(), Self::Error> {
        T::write(self, address, value)
    }
}

/// Register bus over an SPI device.
/// Chip select is owned by the `SpiDevice` and held for the whole
/// opcode + address + data frame.
pub struct SpiRegisterBus<SPI> {
    spi: SPI,
}

impl<SPI: SpiDevice> SpiRegisterBus<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI: SpiDevice> RegisterBus for SpiRegisterBus<SPI> {
    type Error = SPI::Error;

    fn read(&mut self, address: u16) -> Result<u8, Self::Error> {
        let [hi, lo] = address.to_be_bytes();
        let mut data = [0u8; 1];
        self.spi.transaction(&mut [
            Operation::Write(&[OPCODE_READ, hi, lo]),
            Operation::Read(&mut data),
        ])?;
        Ok(data[0])
    }

    fn write(&mut self, address: u16, value: u8) -> Result<(), Self::Error> {
        let [hi, lo] = address.to_be_bytes();
        self.spi.write(&[OPCODE_WRITE, hi, lo, value])
    }
}
