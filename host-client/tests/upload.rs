// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::time::Duration;

use host_client::{set_identity, upload, Error, Options};
use host_protocol::{NetworkConfig, VERSION_REPLY};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

const PAGE: usize = 64;

fn options() -> Options {
    Options {
        page_size: PAGE,
        max_pages: 4,
        reply_timeout: Duration::from_millis(500),
    }
}

/// Device side of an upload. `corrupt` flips a byte of that page on the way
/// back. Returns the received pages and whether `OK` arrived.
async fn device(mut link: DuplexStream, corrupt: Option<usize>) -> (Vec<u8>, bool) {
    let mut command = [0u8; 4];
    link.read_exact(&mut command).await.unwrap();
    assert_eq!(&command, b"PROG");
    link.write_all(VERSION_REPLY).await.unwrap();

    let mut header = [0u8; 4];
    link.read_exact(&mut header).await.unwrap();
    let pages = u32::from_le_bytes(header) as usize;
    let mut image = vec![0u8; pages * PAGE];
    link.read_exact(&mut image).await.unwrap();

    let mut back = image.clone();
    if let Some(page) = corrupt {
        back[page * PAGE] ^= 0x01;
    }
    link.write_all(&back).await.unwrap();

    let mut confirm = [0u8; 2];
    let confirmed = match link.read_exact(&mut confirm).await {
        Ok(_) => &confirm == b"OK",
        Err(_) => false,
    };
    (image, confirmed)
}

#[tokio::test]
async fn upload_pads_and_confirms() {
    let (mut host, link) = duplex(4096);
    let device = tokio::spawn(device(link, None));

    let image: Vec<u8> = (0..PAGE as u32 + 10).map(|i| i as u8).collect();
    let pages = upload(&mut host, &image, &options()).await.unwrap();
    drop(host);
    assert_eq!(pages, 2);

    let (received, confirmed) = device.await.unwrap();
    assert!(confirmed);
    assert_eq!(received.len(), 2 * PAGE);
    assert_eq!(received[..image.len()], image);
    assert!(received[image.len()..].iter().all(|b| *b == 0xFF));
}

#[tokio::test]
async fn mismatch_is_not_confirmed() {
    let (mut host, link) = duplex(4096);
    let device = tokio::spawn(device(link, Some(1)));

    let image = vec![0x42; 3 * PAGE];
    let result = upload(&mut host, &image, &options()).await;
    drop(host);
    assert!(matches!(result, Err(Error::VerifyMismatch { page: 1 })));

    let (_, confirmed) = device.await.unwrap();
    assert!(!confirmed);
}

#[tokio::test]
async fn oversized_image_is_refused_before_connecting() {
    let (mut host, mut link) = duplex(64);
    let image = vec![0; 5 * PAGE];
    let result = upload(&mut host, &image, &options()).await;
    assert!(matches!(
        result,
        Err(Error::ImageTooLarge { pages: 5, max: 4 })
    ));
    drop(host);
    let mut rest = Vec::new();
    link.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn wrong_greeting_is_rejected() {
    let (mut host, mut link) = duplex(64);
    let device = tokio::spawn(async move {
        let mut command = [0u8; 4];
        link.read_exact(&mut command).await.unwrap();
        link.write_all(b"V2.0\r\n").await.unwrap();
        link
    });
    let result = upload(&mut host, &[0; PAGE], &options()).await;
    match result {
        Err(Error::UnexpectedReply(reply)) => assert_eq!(reply, b"V2.0\r\n"),
        other => panic!("unexpected {other:?}"),
    }
    device.await.unwrap();
}

#[tokio::test]
async fn silent_device_times_out() {
    let (mut host, _link) = duplex(64);
    let result = upload(&mut host, &[0; PAGE], &options()).await;
    assert!(matches!(result, Err(Error::Timeout)));
}

#[tokio::test]
async fn identity_record_follows_greeting() {
    let identity = NetworkConfig {
        gateway: [192, 168, 0, 1],
        subnet_mask: [255, 255, 255, 0],
        mac: [2, 0, 0, 0, 0, 7],
        device_ip: [192, 168, 0, 7],
    };
    let (mut host, mut link) = duplex(64);
    let device = tokio::spawn(async move {
        let mut command = [0u8; 4];
        link.read_exact(&mut command).await.unwrap();
        assert_eq!(&command, b"IPST");
        link.write_all(VERSION_REPLY).await.unwrap();
        let mut record = [0u8; 18];
        link.read_exact(&mut record).await.unwrap();
        record
    });

    set_identity(&mut host, &identity, &options()).await.unwrap();
    let record = device.await.unwrap();
    assert_eq!(record[..4], [192, 168, 0, 1]);
    assert_eq!(record[8..14], [2, 0, 0, 0, 0, 7]);
    assert_eq!(NetworkConfig::from_bytes(&record).unwrap(), identity);
}
