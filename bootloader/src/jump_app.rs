// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later
use crate::consts::BASE_APP_ADDR;
use cortex_m::peripheral::NVIC;
use defmt::info;
use embassy_nrf::interrupt::Interrupt;
use nrf52805_pac as pac;

/// Boots the application placed right after the MBR.
///
/// # Safety
///
/// All bootloader peripherals must be released. This modifies the stack
/// pointer and reset vector and will run whatever is programmed at
/// [`BASE_APP_ADDR`].
pub unsafe fn jump_to_app() -> ! {
    use nrf_softdevice_mbr as mbr;

    // Disable active interrupts
    NVIC::mask(Interrupt::SPIM0_SPIS0_SPI0);
    NVIC::mask(Interrupt::RTC1);

    // Stop the time driver so the application starts from a quiet RTC1.
    let rtc = &*pac::RTC1::ptr();
    rtc.tasks_stop.write(|w| w.bits(1));
    rtc.intenclr.write(|w| w.bits(0xFFFF_FFFF));
    rtc.evtenclr.write(|w| w.bits(0xFFFF_FFFF));
    NVIC::unpend(Interrupt::RTC1);

    critical_section::with(|_| {
        let mut cmd = mbr::sd_mbr_command_t {
            command: mbr::NRF_MBR_COMMANDS_SD_MBR_COMMAND_IRQ_FORWARD_ADDRESS_SET,
            params: mbr::sd_mbr_command_t__bindgen_ty_1 {
                irq_forward_address_set: mbr::sd_mbr_command_irq_forward_address_set_t {
                    address: BASE_APP_ADDR,
                },
            },
        };
        let ret = mbr::sd_mbr_command(&mut cmd);

        info!("ret forward irq mbr result {}", ret);

        let msp = *(BASE_APP_ADDR as *const u32);
        let rv = *((BASE_APP_ADDR + 4) as *const u32);

        info!("msp = {=u32:x}, rv = {=u32:x}", msp, rv);

        // These instructions perform the following operations:
        //
        // * Modify control register to use MSP as stack pointer (clear spsel bit)
        // * Synchronize instruction barrier
        // * Initialize stack pointer from the application vector table
        // * Set link register to not return (0xFF)
        // * Jump to the application reset vector
        core::arch::asm!(
            "mrs {tmp}, CONTROL",
            "bics {tmp}, {spsel}",
            "msr CONTROL, {tmp}",
            "isb",
            "msr MSP, {msp}",
            "mov lr, {new_lr}",
            "bx {rv}",
            // `out(reg) _` is not permitted in a `noreturn` asm! call,
            // so instead use `in(reg) 0` and don't restore it afterwards.
            tmp = in(reg) 0,
            spsel = in(reg) 2,
            new_lr = in(reg) 0xFFFFFFFFu32,
            msp = in(reg) msp,
            rv = in(reg) rv,
            options(noreturn),
        );
    })
}
