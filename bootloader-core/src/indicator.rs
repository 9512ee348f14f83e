// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::StatefulOutputPin;

/// On/off cycles of the exit pattern.
pub const EXIT_BLINKS: usize = 10;
const EXIT_HALF_PERIOD_MS: u32 = 100;

/// Status output of the bootloader.
pub trait Indicator {
    /// Heartbeat, once per elapsed second while a session is alive.
    fn toggle(&mut self);

    /// Shown once whenever a session ends.
    fn signal_exit(&mut self);
}

/// Single LED: heartbeat toggles it, the exit pattern blinks it quickly.
pub struct Led<P, D> {
    pin: P,
    delay: D,
}

impl<P: StatefulOutputPin, D: DelayNs> Led<P, D> {
    pub fn new(pin: P, delay: D) -> Self {
        Self { pin, delay }
    }

    pub fn release(self) -> (P, D) {
        (self.pin, self.delay)
    }
}

// Pin errors are ignored.
impl<P: StatefulOutputPin, D: DelayNs> Indicator for Led<P, D> {
    fn toggle(&mut self) {
        let _ = self.pin.toggle();
    }

    fn signal_exit(&mut self) {
        for _ in 0..EXIT_BLINKS {
            let _ = self.pin.set_high();
            self.delay.delay_ms(EXIT_HALF_PERIOD_MS);
            let _ = self.pin.set_low();
            self.delay.delay_ms(EXIT_HALF_PERIOD_MS);
        }
    }
}
