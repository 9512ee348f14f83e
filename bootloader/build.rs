// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Generates `memory.x` from the shared memory map and puts it on the
//! linker search path.
//!
//! Besides the bootloader's own flash and RAM, the image carries three
//! sections outside its partition: the image state page, seeded with an
//! invalid image, the configuration page, seeded with the factory record,
//! and the MBR's UICR word pointing at the bootloader.

use consts::{BASE_BOOTLOADER_ADDR, CONFIG_ADDR, FLASH_PAGE, FLASH_SIZE, STATE_ADDR};
use std::env;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

fn main() {
    let memory_x_content = format!(
        r##"
        BASE_BOOTLOADER_ADDR = {:#X};
        STATE_ADDR = {:#X};
        CONFIG_ADDR = {:#X};

        MEMORY
        {{
            /* NOTE 1 K = 1 KiBi = 1024 bytes */
            /* The bootloader sits at the top of flash, right above the configuration page */
            FLASH (rx) : ORIGIN = BASE_BOOTLOADER_ADDR, LENGTH = {:#X} - BASE_BOOTLOADER_ADDR
            STATE (r) : ORIGIN = STATE_ADDR, LENGTH = {:#X}
            CONFIG (r) : ORIGIN = CONFIG_ADDR, LENGTH = {:#X}
            RAM : ORIGIN = 0x20000008, LENGTH = 24K - 8
            mbr_uicr_bootloader_addr (r) : ORIGIN = 0x10001014, LENGTH = 0x4
        }}

        SECTIONS {{
            .boot_state : {{
                KEEP(*(.boot_state))
                . = ALIGN(4);
            }} > STATE

            .boot_config : {{
                KEEP(*(.boot_config))
                . = ALIGN(4);
            }} > CONFIG

            .mbr_uicr_bootloader_addr :  {{
                KEEP(*(.mbr_uicr_bootloader_addr))
                . = ALIGN(4);
            }} > mbr_uicr_bootloader_addr
        }};
        "##,
        BASE_BOOTLOADER_ADDR, STATE_ADDR, CONFIG_ADDR, FLASH_SIZE, FLASH_PAGE, FLASH_PAGE
    );
    let out = &PathBuf::from(env::var_os("OUT_DIR").unwrap());
    File::create(out.join("memory.x"))
        .unwrap()
        .write_all(memory_x_content.as_bytes())
        .unwrap();
    println!("cargo:rustc-link-search={}", out.display());

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../consts/src/lib.rs");

    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
}
