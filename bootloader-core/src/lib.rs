// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Network firmware update session.
//!
//! Everything here is independent of the MCU: the controller is reached
//! through a [`w5100::RegisterBus`], flash through [`embedded_storage`] and
//! the status LED through [`embedded_hal`]. The target binary only wires
//! peripherals together, feeds elapsed seconds into [`Bootloader::poll`] and
//! jumps to the application once it returns [`Step::HandOff`].

#![no_std]

mod fmt;

mod countdown;
mod indicator;
mod machine;
mod storage;


pub use countdown::Countdown;
pub use indicator::{Indicator, Led, EXIT_BLINKS};
pub use machine::{Bootloader, Settings, State, Step};
pub use storage::{
    factory_record, FlashStorage, ImageState, Storage, StorageError, IMAGE_BLANK, IMAGE_INVALID,
    IMAGE_VALID, RECORD_LEN, STATE_LEN,
};
