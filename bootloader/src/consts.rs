// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

use bootloader_core::{factory_record, IMAGE_INVALID, RECORD_LEN};
pub use consts::{
    APP_PAGES, BASE_APP_ADDR, BASE_BOOTLOADER_ADDR, CONFIG_ADDR, FLASH_PAGE, STATE_ADDR,
};

/// Start address of the bootloader, read by the MBR from UICR at reset.
#[used]
#[link_section = ".mbr_uicr_bootloader_addr"]
pub static BOOTLOADER_ADDR: u32 = BASE_BOOTLOADER_ADDR;

/// Configuration record as flashed together with the bootloader: the
/// factory network identity.
#[used]
#[link_section = ".boot_config"]
pub static FACTORY_CONFIG: [u8; RECORD_LEN] = factory_record();

/// First entry of the image state log: no valid application.
#[used]
#[link_section = ".boot_state"]
pub static FACTORY_STATE: u32 = IMAGE_INVALID;

/// Page buffer size, one NVMC erase page.
pub const PAGE: usize = FLASH_PAGE as usize;

/// The W5100 needs this long after power-on before it accepts commands.
pub const CONTROLLER_STARTUP_MS: u64 = 200;
