// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

use super::*;

#[test]
fn start_commands() {
    assert_eq!(Command::parse(b"PROG"), Some(Command::Program));
    assert_eq!(Command::parse(b"IPST"), Some(Command::SetIdentity));
    assert_eq!(Command::parse(b"prog"), None);
    assert_eq!(Command::parse(b"PRO"), None);
    assert_eq!(Command::parse(b"OK\r\n"), None);

    for cmd in [Command::Program, Command::SetIdentity] {
        assert_eq!(Command::parse(cmd.as_bytes()), Some(cmd));
    }
}

#[test]
fn header_is_little_endian() {
    assert_eq!(ImageHeader::from_bytes([0x02, 0x00, 0x00, 0x00]).pages, 2);
    assert_eq!(
        ImageHeader::from_bytes([0x78, 0x56, 0x34, 0x12]).pages,
        0x1234_5678
    );
    assert_eq!(ImageHeader { pages: 37 }.to_bytes(), [37, 0, 0, 0]);
}

#[test]
fn identity_record_layout() {
    let config = NetworkConfig {
        gateway: [192, 168, 1, 1],
        subnet_mask: [255, 255, 0, 0],
        mac: [0x02, 0x11, 0x22, 0x33, 0x44, 0x55],
        device_ip: [192, 168, 1, 50],
    };
    let bytes = config.to_bytes().unwrap();

    assert_eq!(&bytes[0..4], &config.gateway);
    assert_eq!(&bytes[4..8], &config.subnet_mask);
    assert_eq!(&bytes[8..14], &config.mac);
    assert_eq!(&bytes[14..18], &config.device_ip);
    assert_eq!(NetworkConfig::from_bytes(&bytes).unwrap(), config);
}

#[test]
fn identity_record_too_short() {
    let bytes = NetworkConfig::FACTORY.to_bytes().unwrap();
    assert!(NetworkConfig::from_bytes(&bytes[..17]).is_err());
}

#[test]
fn factory_identity() {
    let config = NetworkConfig::default();
    assert_eq!(config.gateway, [10, 0, 0, 28]);
    assert_eq!(config.subnet_mask, [255, 255, 255, 0]);
    assert_eq!(config.mac, [0xDE, 0xAD, 0xBE, 0xEF, 0xFE, 0xED]);
    assert_eq!(config.device_ip, [10, 0, 0, 75]);
}
