// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Host side of the network update protocol.
//!
//! Both operations run over any byte stream, a `TcpStream` in the CLI and
//! an in-memory duplex in tests.

use std::time::Duration;

use host_protocol::{
    Command, ImageHeader, NetworkConfig, CONFIRM, NETWORK_CONFIG_LEN, VERSION_REPLY,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;


#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    /// The device did not answer within the configured time
    Timeout,
    /// Start command answered with something other than the version line
    UnexpectedReply(Vec<u8>),
    ImageTooLarge { pages: u32, max: u32 },
    /// Read-back differs from the uploaded image, starting at `page`
    VerifyMismatch { page: u32 },
    Encoding(postcard::Error),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "connection error: {e}"),
            Error::Timeout => write!(f, "device did not respond in time"),
            Error::UnexpectedReply(reply) => write!(f, "unexpected reply {reply:02x?}"),
            Error::ImageTooLarge { pages, max } => {
                write!(f, "image needs {pages} pages, the device holds {max}")
            }
            Error::VerifyMismatch { page } => write!(f, "read-back mismatch in page {page}"),
            Error::Encoding(e) => write!(f, "cannot encode identity: {e}"),
        }
    }
}

impl std::error::Error for Error {}

#[derive(Clone, Copy, Debug)]
pub struct Options {
    /// Flash page size of the device
    pub page_size: usize,
    /// Pages available for the application
    pub max_pages: u32,
    /// Longest wait for any single reply
    pub reply_timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            page_size: consts::FLASH_PAGE as usize,
            max_pages: consts::APP_PAGES,
            reply_timeout: Duration::from_secs(consts::SESSION_TIMEOUT_SECS.into()),
        }
    }
}

/// Pad `image` with erased bytes up to a whole number of pages.
pub fn pad_image(image: &[u8], page_size: usize) -> Vec<u8> {
    let mut padded = image.to_vec();
    let tail = padded.len() % page_size;
    if tail != 0 {
        padded.resize(padded.len() + page_size - tail, 0xFF);
    }
    padded
}

/// Parse `aa:bb:cc:dd:ee:ff`, `-` separators are accepted too.
pub fn parse_mac(s: &str) -> Result<[u8; 6], String> {
    let mut mac = [0u8; 6];
    let mut parts = s.split([':', '-']);
    for byte in mac.iter_mut() {
        let part = parts.next().ok_or_else(|| format!("{s}: too few octets"))?;
        *byte = u8::from_str_radix(part, 16).map_err(|_| format!("{s}: bad octet {part:?}"))?;
    }
    if parts.next().is_some() {
        return Err(format!("{s}: too many octets"));
    }
    Ok(mac)
}

async fn read_exact_within<S>(stream: &mut S, buf: &mut [u8], limit: Duration) -> Result<(), Error>
where
    S: AsyncRead + Unpin,
{
    match timeout(limit, stream.read_exact(buf)).await {
        Ok(read) => {
            read?;
            Ok(())
        }
        Err(_) => Err(Error::Timeout),
    }
}

async fn start<S>(stream: &mut S, command: Command, options: &Options) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(command.as_bytes()).await?;
    stream.flush().await?;
    let mut reply = [0u8; VERSION_REPLY.len()];
    read_exact_within(stream, &mut reply, options.reply_timeout).await?;
    if &reply != VERSION_REPLY {
        return Err(Error::UnexpectedReply(reply.to_vec()));
    }
    log::debug!("device accepted {command:?}");
    Ok(())
}

/// Upload `image`, check the read-back and confirm it. The device starts
/// the new image once the confirmation arrives.
///
/// On a read-back mismatch nothing is confirmed, the device times out and
/// keeps the image marked invalid.
pub async fn upload<S>(stream: &mut S, image: &[u8], options: &Options) -> Result<u32, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let padded = pad_image(image, options.page_size);
    let pages = (padded.len() / options.page_size) as u32;
    if pages > options.max_pages {
        return Err(Error::ImageTooLarge {
            pages,
            max: options.max_pages,
        });
    }

    start(stream, Command::Program, options).await?;
    stream.write_all(&ImageHeader { pages }.to_bytes()).await?;
    log::info!("sending {pages} pages");
    for (i, page) in padded.chunks(options.page_size).enumerate() {
        stream.write_all(page).await?;
        log::debug!("page {i} sent");
    }
    stream.flush().await?;

    let mut back = vec![0u8; options.page_size];
    for (i, page) in padded.chunks(options.page_size).enumerate() {
        read_exact_within(stream, &mut back, options.reply_timeout).await?;
        if back != page {
            log::warn!("page {i} differs after programming");
            return Err(Error::VerifyMismatch { page: i as u32 });
        }
    }
    log::info!("read-back matches, confirming");
    stream.write_all(CONFIRM).await?;
    stream.flush().await?;
    Ok(pages)
}

/// Store a new network identity. It takes effect after the device restarts.
pub async fn set_identity<S>(
    stream: &mut S,
    identity: &NetworkConfig,
    options: &Options,
) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let record: [u8; NETWORK_CONFIG_LEN] = identity.to_bytes().map_err(Error::Encoding)?;
    start(stream, Command::SetIdentity, options).await?;
    stream.write_all(&record).await?;
    stream.flush().await?;
    Ok(())
}
