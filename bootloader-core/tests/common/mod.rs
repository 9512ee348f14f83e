// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

#![allow(dead_code)]

use bootloader_core::{Bootloader, FlashStorage, Indicator, Settings, State, Step};
use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};
use w5100::sim::SimW5100;
use w5100::{MemoryLayout, Socket};

/// Small geometry so scenarios stay readable: 512 byte pages, an eight page
/// application region starting at page 1, then the state page and the
/// record page.
pub const PAGE: usize = 512;
pub const APP_PAGES: u32 = 8;
pub const APP_BASE: u32 = PAGE as u32;
pub const STATE_BASE: u32 = APP_BASE + APP_PAGES * PAGE as u32;
pub const CONFIG_BASE: u32 = STATE_BASE + PAGE as u32;
pub const FLASH_LEN: usize = CONFIG_BASE as usize + PAGE;

/// NOR flash in RAM: writes can only clear bits, erases fill with 0xFF.
pub struct MemFlash {
    pub mem: Vec<u8>,
    /// Offsets of every page erase, in order
    pub erases: Vec<u32>,
    pub fail_writes: bool,
}

impl MemFlash {
    pub fn new() -> Self {
        Self {
            mem: vec![0xFF; FLASH_LEN],
            erases: Vec::new(),
            fail_writes: false,
        }
    }

    pub fn app_page(&self, index: u32) -> &[u8] {
        let start = (APP_BASE + index * PAGE as u32) as usize;
        &self.mem[start..start + PAGE]
    }

    pub fn config_erases(&self) -> usize {
        self.erases.iter().filter(|o| **o == CONFIG_BASE).count()
    }

    pub fn state_erases(&self) -> usize {
        self.erases.iter().filter(|o| **o == STATE_BASE).count()
    }

    pub fn state_slot(&self, slot: usize) -> u32 {
        let start = STATE_BASE as usize + slot * 4;
        let mut word = [0; 4];
        word.copy_from_slice(&self.mem[start..start + 4]);
        u32::from_le_bytes(word)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FlashFault(pub NorFlashErrorKind);

impl NorFlashError for FlashFault {
    fn kind(&self) -> NorFlashErrorKind {
        self.0
    }
}

impl ErrorType for MemFlash {
    type Error = FlashFault;
}

impl ReadNorFlash for MemFlash {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), FlashFault> {
        let start = offset as usize;
        let end = start + bytes.len();
        if end > self.mem.len() {
            return Err(FlashFault(NorFlashErrorKind::OutOfBounds));
        }
        bytes.copy_from_slice(&self.mem[start..end]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.mem.len()
    }
}

impl NorFlash for MemFlash {
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = PAGE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), FlashFault> {
        if from as usize % PAGE != 0 || to as usize % PAGE != 0 {
            return Err(FlashFault(NorFlashErrorKind::NotAligned));
        }
        if to as usize > self.mem.len() {
            return Err(FlashFault(NorFlashErrorKind::OutOfBounds));
        }
        for page in (from..to).step_by(PAGE) {
            self.erases.push(page);
        }
        self.mem[from as usize..to as usize].fill(0xFF);
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), FlashFault> {
        if self.fail_writes {
            return Err(FlashFault(NorFlashErrorKind::Other));
        }
        if offset as usize % Self::WRITE_SIZE != 0 || bytes.len() % Self::WRITE_SIZE != 0 {
            return Err(FlashFault(NorFlashErrorKind::NotAligned));
        }
        let start = offset as usize;
        if start + bytes.len() > self.mem.len() {
            return Err(FlashFault(NorFlashErrorKind::OutOfBounds));
        }
        for (cell, byte) in self.mem[start..].iter_mut().zip(bytes) {
            *cell &= *byte;
        }
        Ok(())
    }
}

pub fn storage() -> FlashStorage<MemFlash> {
    FlashStorage::new(MemFlash::new(), APP_BASE, APP_PAGES, STATE_BASE, CONFIG_BASE)
}

/// Records what the bootloader showed on its LED.
#[derive(Default)]
pub struct Blinker {
    pub toggles: usize,
    pub exits: usize,
}

impl Indicator for Blinker {
    fn toggle(&mut self) {
        self.toggles += 1;
    }

    fn signal_exit(&mut self) {
        self.exits += 1;
    }
}

pub type Device = Bootloader<SimW5100, FlashStorage<MemFlash>, Blinker, PAGE>;

/// A started bootloader and the peer on the other end of its socket.
pub struct Session {
    pub device: Device,
    outgoing: Vec<u8>,
    pub received: Vec<u8>,
}

impl Session {
    pub fn new() -> Self {
        Self::with(storage(), MemoryLayout::SINGLE_SOCKET)
    }

    pub fn with(storage: FlashStorage<MemFlash>, layout: MemoryLayout) -> Self {
        let settings = Settings {
            layout,
            ..Settings::default()
        };
        let mut device = Device::new(SimW5100::new(), storage, Blinker::default(), settings);
        device.start().unwrap();
        let mut session = Self {
            device,
            outgoing: Vec::new(),
            received: Vec::new(),
        };
        assert!(session.sim().connect(Socket::S0));
        session
    }

    pub fn sim(&mut self) -> &mut SimW5100 {
        self.device.chip_mut().bus_mut()
    }

    pub fn flash(&mut self) -> &mut MemFlash {
        self.device.storage_mut().flash_mut()
    }

    /// Queue bytes from the host. They enter the device as ring space allows.
    pub fn send(&mut self, bytes: &[u8]) {
        self.outgoing.extend_from_slice(bytes);
    }

    pub fn poll(&mut self, ticks: u32) -> Step {
        let outgoing = std::mem::take(&mut self.outgoing);
        let accepted = self.sim().push(Socket::S0, &outgoing);
        self.outgoing = outgoing[accepted..].to_vec();
        let step = self.device.poll(ticks);
        let sent = self.sim().take_sent(Socket::S0);
        self.received.extend(sent);
        step
    }

    /// Poll without elapsed time until `state` is reached or a hand-off.
    pub fn run_until(&mut self, state: State, limit: usize) -> Step {
        for _ in 0..limit {
            if self.device.state() == state {
                return Step::Continue;
            }
            if self.poll(0) == Step::HandOff {
                return Step::HandOff;
            }
        }
        assert_eq!(self.device.state(), state);
        Step::Continue
    }

    pub fn take_received(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.received)
    }
}

/// `count` distinguishable pages.
pub fn image(count: usize) -> Vec<u8> {
    (0..count * PAGE)
        .map(|i| (i / PAGE * 31 + i % 251) as u8)
        .collect()
}
