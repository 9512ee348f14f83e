// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Persistent state: the application pages, the configuration record and
//! the image state log.
//!
//! The configuration record lives at the start of its own flash page:
//!
//! | offset | len | content                                    |
//! |--------|-----|--------------------------------------------|
//! | 0      | 18  | [`NetworkConfig`], postcard encoded        |
//! | 18     | 2   | padding, left erased                       |
//!
//! The image state is a log of little endian words filling a second page.
//! The last programmed word is the current state. A change that only clears
//! bits is programmed over that word, any other change takes the next erased
//! slot. The state page is erased when the log is full, the configuration
//! page only when the identity changes.
//!
//! An erased record reads back as the factory identity, an erased log as a
//! blank image.

use core::fmt;

use embedded_storage::nor_flash::{NorFlash, NorFlashError, NorFlashErrorKind};
use host_protocol::{NetworkConfig, NETWORK_CONFIG_LEN};

/// Size of the configuration record.
pub const RECORD_LEN: usize = 20;
/// Size of one slot in the image state log.
pub const STATE_LEN: usize = 4;

/// State word of a confirmed image.
pub const IMAGE_VALID: u32 = 0x5A5A_5A5A;
/// State word of an interrupted or unconfirmed upload.
pub const IMAGE_INVALID: u32 = 0;
/// Erased flash, nothing was ever uploaded.
pub const IMAGE_BLANK: u32 = 0xFFFF_FFFF;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ImageState {
    Valid,
    Invalid,
    Blank,
}

impl ImageState {
    pub const fn word(self) -> u32 {
        match self {
            ImageState::Valid => IMAGE_VALID,
            ImageState::Invalid => IMAGE_INVALID,
            ImageState::Blank => IMAGE_BLANK,
        }
    }

    /// Anything but the exact valid or blank pattern counts as invalid.
    pub const fn from_word(word: u32) -> Self {
        match word {
            IMAGE_VALID => ImageState::Valid,
            IMAGE_BLANK => ImageState::Blank,
            _ => ImageState::Invalid,
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StorageError {
    /// Page index past the application region
    OutOfBounds,
    /// Buffer is not exactly one page, or not a multiple of the write unit
    Misaligned,
    /// Configuration record could not be encoded or decoded
    Encoding,
    /// The flash controller rejected the operation
    Flash,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::OutOfBounds => write!(f, "page outside the application region"),
            StorageError::Misaligned => write!(f, "buffer does not match the flash geometry"),
            StorageError::Encoding => write!(f, "malformed configuration record"),
            StorageError::Flash => write!(f, "flash operation failed"),
        }
    }
}

fn flash_error<E: NorFlashError>(e: E) -> StorageError {
    match e.kind() {
        NorFlashErrorKind::OutOfBounds => StorageError::OutOfBounds,
        NorFlashErrorKind::NotAligned => StorageError::Misaligned,
        _ => StorageError::Flash,
    }
}

/// Everything the update session persists.
pub trait Storage {
    /// Number of pages in the application region.
    fn page_count(&self) -> u32;

    /// Erase page `index` of the application region and write `page` to it.
    fn program_page(&mut self, index: u32, page: &[u8]) -> Result<(), StorageError>;

    fn read_page(&mut self, index: u32, page: &mut [u8]) -> Result<(), StorageError>;

    fn load_network(&mut self) -> Result<NetworkConfig, StorageError>;

    /// Persist the identity. The image state is carried over unchanged.
    fn store_network(&mut self, config: &NetworkConfig) -> Result<(), StorageError>;

    fn image_state(&mut self) -> Result<ImageState, StorageError>;

    /// Persist the image state. The identity is carried over unchanged.
    fn set_image_state(&mut self, state: ImageState) -> Result<(), StorageError>;

    /// An unreadable record counts as no valid image.
    fn is_image_valid(&mut self) -> bool {
        matches!(self.image_state(), Ok(ImageState::Valid))
    }

    fn set_image_valid(&mut self, valid: bool) -> Result<(), StorageError> {
        self.set_image_state(if valid {
            ImageState::Valid
        } else {
            ImageState::Invalid
        })
    }
}

/// [`Storage`] on a NOR flash holding the application region, the state page
/// and the configuration page. One application page is one erase unit.
pub struct FlashStorage<F> {
    flash: F,
    app_base: u32,
    page_count: u32,
    state_base: u32,
    config_base: u32,
}

impl<F: NorFlash> FlashStorage<F> {
    /// `app_base`, `state_base` and `config_base` are flash offsets, all
    /// erase aligned.
    pub fn new(
        flash: F,
        app_base: u32,
        page_count: u32,
        state_base: u32,
        config_base: u32,
    ) -> Self {
        Self {
            flash,
            app_base,
            page_count,
            state_base,
            config_base,
        }
    }

    pub fn release(self) -> F {
        self.flash
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    /// Number of words the state log holds before it is erased.
    pub fn state_slots() -> u32 {
        (F::ERASE_SIZE / STATE_LEN) as u32
    }

    fn page_offset(&self, index: u32, len: usize) -> Result<u32, StorageError> {
        if index >= self.page_count {
            return Err(StorageError::OutOfBounds);
        }
        if len != F::ERASE_SIZE || len % F::WRITE_SIZE != 0 {
            return Err(StorageError::Misaligned);
        }
        Ok(self.app_base + index * F::ERASE_SIZE as u32)
    }

    fn read_record(&mut self) -> Result<[u8; RECORD_LEN], StorageError> {
        let mut record = [0u8; RECORD_LEN];
        self.flash
            .read(self.config_base, &mut record)
            .map_err(flash_error)?;
        Ok(record)
    }

    /// Erase and write one region with interrupts masked, the CPU cannot
    /// fetch from flash while the controller is busy.
    fn erase_and_write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), StorageError> {
        let flash = &mut self.flash;
        critical_section::with(|_| {
            flash.erase(offset, offset + F::ERASE_SIZE as u32)?;
            flash.write(offset, bytes)
        })
        .map_err(flash_error)
    }

    fn write_word(&mut self, offset: u32, word: u32) -> Result<(), StorageError> {
        let flash = &mut self.flash;
        critical_section::with(|_| flash.write(offset, &word.to_le_bytes())).map_err(flash_error)
    }

    fn slot_offset(&self, slot: u32) -> u32 {
        self.state_base + slot * STATE_LEN as u32
    }

    /// Index and content of the last programmed slot of the state log.
    fn last_state(&mut self) -> Result<Option<(u32, u32)>, StorageError> {
        let mut last = None;
        for slot in 0..Self::state_slots() {
            let mut word = [0u8; STATE_LEN];
            self.flash
                .read(self.slot_offset(slot), &mut word)
                .map_err(flash_error)?;
            let word = u32::from_le_bytes(word);
            if word == IMAGE_BLANK {
                break;
            }
            last = Some((slot, word));
        }
        Ok(last)
    }
}

impl<F: NorFlash> Storage for FlashStorage<F> {
    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn program_page(&mut self, index: u32, page: &[u8]) -> Result<(), StorageError> {
        let offset = self.page_offset(index, page.len())?;
        self.erase_and_write(offset, page)
    }

    fn read_page(&mut self, index: u32, page: &mut [u8]) -> Result<(), StorageError> {
        let offset = self.page_offset(index, page.len())?;
        self.flash.read(offset, page).map_err(flash_error)
    }

    fn load_network(&mut self) -> Result<NetworkConfig, StorageError> {
        let record = self.read_record()?;
        let network = &record[..NETWORK_CONFIG_LEN];
        if network.iter().all(|b| *b == 0xFF) {
            return Ok(NetworkConfig::FACTORY);
        }
        NetworkConfig::from_bytes(network).map_err(|_| StorageError::Encoding)
    }

    fn store_network(&mut self, config: &NetworkConfig) -> Result<(), StorageError> {
        let encoded = config.to_bytes().map_err(|_| StorageError::Encoding)?;
        let mut record = self.read_record()?;
        if record[..NETWORK_CONFIG_LEN] == encoded {
            return Ok(());
        }
        if RECORD_LEN % F::WRITE_SIZE != 0 {
            return Err(StorageError::Misaligned);
        }
        record[..NETWORK_CONFIG_LEN].copy_from_slice(&encoded);
        record[NETWORK_CONFIG_LEN..].fill(0xFF);
        self.erase_and_write(self.config_base, &record)
    }

    fn image_state(&mut self) -> Result<ImageState, StorageError> {
        Ok(match self.last_state()? {
            Some((_, word)) => ImageState::from_word(word),
            None => ImageState::Blank,
        })
    }

    fn set_image_state(&mut self, state: ImageState) -> Result<(), StorageError> {
        if STATE_LEN % F::WRITE_SIZE != 0 {
            return Err(StorageError::Misaligned);
        }
        let last = self.last_state()?;
        let current = last.map_or(IMAGE_BLANK, |(_, word)| word);
        let next = state.word();
        if current == next {
            return Ok(());
        }
        if state == ImageState::Blank {
            let flash = &mut self.flash;
            let (from, to) = (self.state_base, self.state_base + F::ERASE_SIZE as u32);
            return critical_section::with(|_| flash.erase(from, to)).map_err(flash_error);
        }
        let slot = match last {
            // NOR programming only clears bits.
            Some((slot, word)) if next & !word == 0 => slot,
            Some((slot, _)) => slot + 1,
            None => 0,
        };
        if slot < Self::state_slots() {
            return self.write_word(self.slot_offset(slot), next);
        }
        debug!("state log full, erasing");
        self.erase_and_write(self.state_base, &next.to_le_bytes())
    }
}

const fn place<const N: usize>(
    mut record: [u8; RECORD_LEN],
    at: usize,
    bytes: [u8; N],
) -> [u8; RECORD_LEN] {
    let mut i = 0;
    while i < N {
        record[at + i] = bytes[i];
        i += 1;
    }
    record
}

/// Configuration record as shipped: the factory identity.
pub const fn factory_record() -> [u8; RECORD_LEN] {
    let config = NetworkConfig::FACTORY;
    let record = place([0xFF; RECORD_LEN], 0, config.gateway);
    let record = place(record, 4, config.subnet_mask);
    let record = place(record, 8, config.mac);
    place(record, 14, config.device_ip)
}
