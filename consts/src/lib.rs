// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Memory map and session parameters shared by the bootloader, its build
//! script and the host uploader.

#![no_std]

/// Size of a flash page in bytes.
/// This is the erase granularity of the nRF52805 NVMC and the unit the
/// bootloader receives, programs and reads back in one step.
pub const FLASH_PAGE: u32 = 4096;

/// Start of the application image in flash.
/// The Nordic MBR occupies the first page, the application follows directly.
pub const BASE_APP_ADDR: u32 = 0x1000;

/// Start of the page holding the image state log. Kept apart from the
/// identity so confirming an upload never erases the network settings.
pub const STATE_ADDR: u32 = 0x25000;

/// Start of the configuration page holding the network identity record.
/// It is never touched by firmware page writes.
pub const CONFIG_ADDR: u32 = 0x26000;

/// Start of the bootloader in flash, published to the MBR through UICR.
pub const BASE_BOOTLOADER_ADDR: u32 = 0x27000;

/// Total flash size of the nRF52805.
pub const FLASH_SIZE: u32 = 192 * 1024;

/// Number of firmware pages available to the application.
pub const APP_PAGES: u32 = (STATE_ADDR - BASE_APP_ADDR) / FLASH_PAGE;

/// TCP port the bootloader listens on.
pub const LISTEN_PORT: u16 = 13005;

/// Seconds without forward progress before a session is abandoned.
pub const SESSION_TIMEOUT_SECS: u8 = 10;

const _: () = assert!(BASE_APP_ADDR % FLASH_PAGE == 0);
const _: () = assert!(STATE_ADDR % FLASH_PAGE == 0);
const _: () = assert!(STATE_ADDR + FLASH_PAGE <= CONFIG_ADDR);
const _: () = assert!(CONFIG_ADDR % FLASH_PAGE == 0);
const _: () = assert!(CONFIG_ADDR + FLASH_PAGE <= BASE_BOOTLOADER_ADDR);
