// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::error::Error;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use host_client::{parse_mac, set_identity, upload, Options};
use host_protocol::NetworkConfig;
use tokio::net::TcpStream;

const FACTORY_IP: [u8; 4] = NetworkConfig::FACTORY.device_ip;

#[derive(Debug, Parser)]
struct Args {
    /// Device address
    #[arg(short, long, default_value_t = Ipv4Addr::from(FACTORY_IP))]
    addr: Ipv4Addr,
    #[arg(short, long, default_value_t = consts::LISTEN_PORT)]
    port: u16,
    /// Flash page size of the device in bytes
    #[arg(long, default_value_t = consts::FLASH_PAGE as usize)]
    page_size: usize,
    /// Seconds to wait for each reply
    #[arg(short, long, default_value_t = consts::SESSION_TIMEOUT_SECS.into())]
    timeout: u64,
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Upload a raw application image and start it
    Flash { image: PathBuf },
    /// Store a new network identity, applied on the next device restart
    SetIp {
        #[arg(long)]
        gateway: Ipv4Addr,
        #[arg(long)]
        subnet: Ipv4Addr,
        #[arg(long, value_parser = parse_mac)]
        mac: [u8; 6],
        #[arg(long)]
        ip: Ipv4Addr,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();

    let args = Args::parse();
    let options = Options {
        page_size: args.page_size,
        reply_timeout: Duration::from_secs(args.timeout),
        ..Options::default()
    };

    println!("Connecting to {}:{}...", args.addr, args.port);
    let mut stream = TcpStream::connect((args.addr, args.port)).await?;
    stream.set_nodelay(true)?;

    match args.command {
        Cmd::Flash { image } => {
            let image = std::fs::read(&image)?;
            let pages = upload(&mut stream, &image, &options).await?;
            println!("Image of {pages} pages verified and confirmed");
        }
        Cmd::SetIp {
            gateway,
            subnet,
            mac,
            ip,
        } => {
            let identity = NetworkConfig {
                gateway: gateway.octets(),
                subnet_mask: subnet.octets(),
                mac,
                device_ip: ip.octets(),
            };
            set_identity(&mut stream, &identity, &options).await?;
            println!("Identity stored, device will answer on {ip} after restart");
        }
    }

    Ok(())
}
