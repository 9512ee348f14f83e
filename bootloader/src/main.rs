// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]
#![no_main]
mod consts;
mod jump_app;

#[cfg(feature = "debug")]
use defmt_rtt as _;
// global logger
use embassy_nrf as _;
// time driver
use panic_probe as _;

use bootloader_core::{Bootloader, FlashStorage, Led, Settings, Step};
use crate::consts::{
    APP_PAGES, BASE_APP_ADDR, CONFIG_ADDR, CONTROLLER_STARTUP_MS, PAGE, STATE_ADDR,
};
use defmt::{info, unwrap, warn};
use embassy_executor::Spawner;
use embassy_nrf::gpio::{Level, Output, OutputDrive};
use embassy_nrf::nvmc::Nvmc;
use embassy_nrf::{bind_interrupts, peripherals, spim};
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::{with_timeout, Delay, Duration, Instant, Timer};
use embedded_hal_bus::spi::ExclusiveDevice;
use jump_app::jump_to_app;
use w5100::SpiRegisterBus;

bind_interrupts!(struct Irqs {
    SPIM0_SPIS0_SPI0 => spim::InterruptHandler<peripherals::SPI0>;
});

#[cfg(not(feature = "debug"))]
mod dummy_logging {
    #[defmt::global_logger]
    struct Logger;

    unsafe impl defmt::Logger for Logger {
        fn acquire() {}

        unsafe fn flush() {}

        unsafe fn release() {}

        unsafe fn write(_bytes: &[u8]) {}
    }
}

/// Elapsed seconds not yet handed to the session.
static TICKS: Channel<ThreadModeRawMutex, (), 4> = Channel::new();

/// Raised when a session ends, the next second is counted from here.
static RESTART: Signal<ThreadModeRawMutex, ()> = Signal::new();

const SECOND: Duration = Duration::from_secs(1);

#[embassy_executor::task]
async fn tick_task() -> ! {
    let mut next = Instant::now() + SECOND;
    loop {
        let wait = next.saturating_duration_since(Instant::now());
        match with_timeout(wait, RESTART.wait()).await {
            Ok(()) => next = Instant::now() + SECOND,
            Err(_) => {
                next += SECOND;
                if TICKS.try_send(()).is_err() {
                    warn!("tick dropped");
                }
            }
        }
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_nrf::init(Default::default());
    info!("Bootloader start");

    let mut config_spi = spim::Config::default();
    config_spi.frequency = spim::Frequency::M8;
    config_spi.mode = spim::MODE_0;
    let spi = spim::Spim::new(p.SPI0, Irqs, p.P0_14, p.P0_12, p.P0_16, config_spi);
    let cs = Output::new(p.P0_18, Level::High, OutputDrive::Standard);
    let spi = unwrap!(ExclusiveDevice::new(spi, cs, Delay));

    let flash = FlashStorage::new(
        Nvmc::new(p.NVMC),
        BASE_APP_ADDR,
        APP_PAGES,
        STATE_ADDR,
        CONFIG_ADDR,
    );
    let led = Led::new(Output::new(p.P0_20, Level::Low, OutputDrive::Standard), Delay);

    // Give the controller time to come out of power-on reset
    Timer::after_millis(CONTROLLER_STARTUP_MS).await;

    let mut boot: Bootloader<_, _, _, PAGE> =
        Bootloader::new(SpiRegisterBus::new(spi), flash, led, Settings::default());
    while boot.start().is_err() {
        warn!("Controller setup failed, retrying");
        Timer::after_millis(CONTROLLER_STARTUP_MS).await;
    }

    unwrap!(spawner.spawn(tick_task()));

    loop {
        let mut ticks = 0;
        while TICKS.try_receive().is_ok() {
            ticks += 1;
        }
        match boot.poll(ticks) {
            Step::HandOff => break,
            Step::SessionEnded => {
                // The exit pattern blocks the executor, drop the seconds it took
                while TICKS.try_receive().is_ok() {}
                RESTART.signal(());
            }
            Step::Continue => {}
        }
        Timer::after_millis(1).await;
    }

    info!("Jumping to application");
    let (bus, storage, led) = boot.release();
    drop(bus.release());
    drop(storage.release());
    drop(led.release());
    unsafe {
        jump_to_app();
    }
}
