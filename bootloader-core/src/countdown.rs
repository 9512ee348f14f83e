// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

/// Whole-second session timeout.
///
/// Counts down once per elapsed second and stops at zero. The session is
/// over as soon as it reads zero, whichever way it got there.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Countdown {
    remaining: u8,
    period: u8,
}

impl Countdown {
    /// Start armed with `period` seconds left.
    pub const fn new(period: u8) -> Self {
        Self {
            remaining: period,
            period,
        }
    }

    pub fn restart(&mut self) {
        self.remaining = self.period;
    }

    /// Force the session to end on the next poll.
    pub fn expire(&mut self) {
        self.remaining = 0;
    }

    pub const fn remaining(&self) -> u8 {
        self.remaining
    }

    pub const fn is_expired(&self) -> bool {
        self.remaining == 0
    }

    /// Account for one elapsed second. Returns whether the count moved.
    pub fn tick(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}
