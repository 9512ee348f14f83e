// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Upload session state machine.
//!
//! ```text
//! WaitStart --PROG--> Header --> Programming --> Verify --> Confirm --> End
//!     |                                                                 |
//!     +--IPST--> IpSet --> WaitStart (countdown expired)                |
//!     ^                                                                 |
//!     +------------------------- no valid image ------------------------+
//! ```
//!
//! Every state only acts once enough bytes are buffered in the controller,
//! otherwise it returns and is polled again. The countdown forces `End`
//! from any state when it reaches zero.

use host_protocol::{
    Command, ImageHeader, NetworkConfig, COMMAND_LEN, CONFIRM, HEADER_LEN, NETWORK_CONFIG_LEN,
    VERSION_REPLY,
};
use w5100::{MemoryLayout, RegisterBus, Socket, SocketStatus, W5100};

use crate::countdown::Countdown;
use crate::indicator::Indicator;
use crate::storage::{Storage, StorageError};

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
    /// Listening for a start command
    WaitStart,
    /// Waiting for the identity record
    IpSet,
    /// Waiting for the image header
    Header,
    /// Receiving pages into flash
    Programming,
    /// Sending every page back
    Verify,
    /// Waiting for the host's verdict
    Confirm,
    /// Session over, decide between hand-off and another session
    End,
}

/// Outcome of one [`Bootloader::poll`].
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Step {
    /// Keep polling
    Continue,
    /// The session ended without a valid image and a new one began with a
    /// full countdown. Time spent before this return belongs to the old one.
    SessionEnded,
    /// A valid image is in place, release the peripherals and start it
    HandOff,
}

/// Where and how long the bootloader listens.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Settings {
    pub socket: Socket,
    pub port: u16,
    /// Must give `socket` rings of at least one page
    pub layout: MemoryLayout,
    /// Seconds without progress before a session is dropped
    pub timeout_secs: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            socket: Socket::S0,
            port: consts::LISTEN_PORT,
            layout: MemoryLayout::SINGLE_SOCKET,
            timeout_secs: consts::SESSION_TIMEOUT_SECS,
        }
    }
}

enum Fault {
    Bus,
    Storage(StorageError),
}

impl From<StorageError> for Fault {
    fn from(e: StorageError) -> Self {
        Fault::Storage(e)
    }
}

/// The update session. `PAGE` is the flash page size, also the unit of
/// transfer for programming and verification.
pub struct Bootloader<B, S, I, const PAGE: usize> {
    chip: W5100<B>,
    storage: S,
    indicator: I,
    settings: Settings,
    state: State,
    countdown: Countdown,
    pages: u32,
    page_index: u32,
    page: [u8; PAGE],
}

impl<B, S, I, const PAGE: usize> Bootloader<B, S, I, PAGE>
where
    B: RegisterBus,
    S: Storage,
    I: Indicator,
{
    pub fn new(bus: B, storage: S, indicator: I, settings: Settings) -> Self {
        Self {
            chip: W5100::new(bus),
            storage,
            indicator,
            settings,
            state: State::WaitStart,
            countdown: Countdown::new(settings.timeout_secs),
            pages: 0,
            page_index: 0,
            page: [0xFF; PAGE],
        }
    }

    /// Reset the controller, apply the stored identity and start listening.
    /// Returns the identity in use.
    pub fn start(&mut self) -> Result<NetworkConfig, B::Error> {
        let network = match self.storage.load_network() {
            Ok(network) => network,
            Err(e) => {
                warn!("unreadable identity ({}), using factory defaults", e);
                NetworkConfig::FACTORY
            }
        };
        let socket = self.settings.socket;
        if (self.settings.layout.rx(socket).size as usize) < PAGE
            || (self.settings.layout.tx(socket).size as usize) < PAGE
        {
            warn!("socket buffers smaller than a {} byte page", PAGE);
        }

        self.chip.reset()?;
        self.chip.set_memory_layout(self.settings.layout)?;
        self.chip.configure_network(
            &network.gateway,
            &network.subnet_mask,
            &network.mac,
            &network.device_ip,
        )?;
        self.chip.listen(socket, self.settings.port)?;
        self.state = State::WaitStart;
        self.countdown.restart();
        info!(
            "listening on {}.{}.{}.{}:{}",
            network.device_ip[0],
            network.device_ip[1],
            network.device_ip[2],
            network.device_ip[3],
            self.settings.port
        );
        Ok(network)
    }

    /// Advance the session by at most one state. `ticks` is the number of
    /// whole seconds elapsed since the previous call.
    pub fn poll(&mut self, ticks: u32) -> Step {
        for _ in 0..ticks {
            if self.countdown.tick() {
                self.indicator.toggle();
            }
        }
        if self.countdown.is_expired() && self.state != State::End {
            info!("session ended in {}", self.state);
            self.state = State::End;
            self.indicator.signal_exit();
        }

        match self.step() {
            Ok(step) => step,
            Err(Fault::Bus) => {
                warn!("register access failed in {}", self.state);
                Step::Continue
            }
            Err(Fault::Storage(e)) => {
                warn!("storage failed in {}: {}", self.state, e);
                self.state = State::End;
                Step::Continue
            }
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Page count announced by the current upload.
    pub fn pages(&self) -> u32 {
        self.pages
    }

    /// Next page to program or verify.
    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    pub fn remaining_secs(&self) -> u8 {
        self.countdown.remaining()
    }

    pub fn chip_mut(&mut self) -> &mut W5100<B> {
        &mut self.chip
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    pub fn release(self) -> (B, S, I) {
        (self.chip.release(), self.storage, self.indicator)
    }

    fn step(&mut self) -> Result<Step, Fault> {
        match self.state {
            State::WaitStart => self.wait_start()?,
            State::IpSet => self.ip_set()?,
            State::Header => self.header()?,
            State::Programming => self.programming()?,
            State::Verify => self.verify()?,
            State::Confirm => self.confirm()?,
            State::End => return Ok(self.end()),
        }
        Ok(Step::Continue)
    }

    fn rx_available(&mut self) -> Result<usize, Fault> {
        let available = self
            .chip
            .rx_available(self.settings.socket)
            .map_err(|_| Fault::Bus)?;
        Ok(available as usize)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<(), Fault> {
        self.chip
            .receive(self.settings.socket, buf)
            .map_err(|_| Fault::Bus)
    }

    fn wait_start(&mut self) -> Result<(), Fault> {
        let socket = self.settings.socket;
        if self.rx_available()? < COMMAND_LEN {
            let status = self.chip.status(socket).map_err(|_| Fault::Bus)?;
            if matches!(status, SocketStatus::Closed | SocketStatus::CloseWait) {
                debug!("socket {}, listening again", status);
                self.chip.close(socket).map_err(|_| Fault::Bus)?;
                self.chip
                    .listen(socket, self.settings.port)
                    .map_err(|_| Fault::Bus)?;
            }
            return Ok(());
        }

        let mut raw = [0u8; COMMAND_LEN];
        self.receive(&mut raw)?;
        let Some(command) = Command::parse(&raw) else {
            debug!("ignoring unknown command {:x}", raw);
            return Ok(());
        };
        self.chip
            .send(socket, VERSION_REPLY)
            .map_err(|_| Fault::Bus)?;
        info!("{} session started", command);
        self.pages = 0;
        self.page_index = 0;
        self.countdown.restart();
        self.state = match command {
            Command::Program => State::Header,
            Command::SetIdentity => State::IpSet,
        };
        Ok(())
    }

    fn ip_set(&mut self) -> Result<(), Fault> {
        if self.rx_available()? < NETWORK_CONFIG_LEN {
            return Ok(());
        }
        let mut raw = [0u8; NETWORK_CONFIG_LEN];
        self.receive(&mut raw)?;
        let network = NetworkConfig::from_bytes(&raw).map_err(|_| StorageError::Encoding)?;
        self.storage.store_network(&network)?;
        info!("identity stored, applied on next start");
        self.countdown.expire();
        self.state = State::WaitStart;
        Ok(())
    }

    fn header(&mut self) -> Result<(), Fault> {
        if self.rx_available()? < HEADER_LEN {
            return Ok(());
        }
        let mut raw = [0u8; HEADER_LEN];
        self.receive(&mut raw)?;
        let header = ImageHeader::from_bytes(raw);
        if header.pages > self.storage.page_count() {
            warn!(
                "image of {} pages exceeds the {} page region",
                header.pages,
                self.storage.page_count()
            );
        }
        self.storage.set_image_valid(false)?;
        info!("receiving {} pages", header.pages);
        self.pages = header.pages;
        self.page_index = 0;
        self.countdown.restart();
        self.state = State::Programming;
        Ok(())
    }

    fn programming(&mut self) -> Result<(), Fault> {
        if self.page_index < self.pages && self.rx_available()? >= PAGE {
            self.chip
                .receive(self.settings.socket, &mut self.page)
                .map_err(|_| Fault::Bus)?;
            self.storage.program_page(self.page_index, &self.page)?;
            trace!("programmed page {}", self.page_index);
            self.page_index += 1;
        }
        if self.page_index >= self.pages {
            debug!("all {} pages programmed", self.pages);
            self.page_index = 0;
            self.countdown.restart();
            self.state = State::Verify;
        }
        Ok(())
    }

    fn verify(&mut self) -> Result<(), Fault> {
        let socket = self.settings.socket;
        if self.page_index < self.pages {
            let free = self.chip.tx_free(socket).map_err(|_| Fault::Bus)?;
            if free as usize >= PAGE {
                self.storage.read_page(self.page_index, &mut self.page)?;
                let sent = self.chip.send(socket, &self.page).map_err(|_| Fault::Bus)?;
                if sent == 0 {
                    warn!("connection lost verifying page {}", self.page_index);
                    self.state = State::End;
                    return Ok(());
                }
                trace!("sent page {}", self.page_index);
                self.page_index += 1;
            }
        }
        if self.page_index >= self.pages {
            debug!("all {} pages sent back", self.pages);
            self.countdown.restart();
            self.state = State::Confirm;
        }
        Ok(())
    }

    fn confirm(&mut self) -> Result<(), Fault> {
        if self.rx_available()? < CONFIRM.len() {
            return Ok(());
        }
        let mut token = [0u8; 2];
        self.receive(&mut token)?;
        if &token != CONFIRM {
            debug!("unexpected confirmation {:x}", token);
            return Ok(());
        }
        self.storage.set_image_valid(true)?;
        info!("image confirmed");
        self.countdown.restart();
        self.state = State::End;
        Ok(())
    }

    fn end(&mut self) -> Step {
        if self.storage.is_image_valid() {
            info!("starting application");
            return Step::HandOff;
        }
        info!("no valid image, waiting for an upload");
        self.countdown.restart();
        self.state = State::WaitStart;
        Step::SessionEnded
    }
}
