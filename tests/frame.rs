// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy

use rstest::rstest;
use swtpm::{
    frame::{encode_response, read_command, read_header, read_response},
    FrameError,
};

const READ_PUBLIC: [u8; 14] = [
    0x80, 0x01, 0x00, 0x00, 0x00, 0x0e, 0x00, 0x00, 0x01, 0x73, 0x80, 0x00, 0x00, 0x01,
];

#[test]
fn test_read_command() {
    let request = read_command(&mut READ_PUBLIC.as_slice()).unwrap();
    assert_eq!(request.header.tag, 0x8001);
    assert_eq!(request.header.size, 14);
    assert_eq!(request.header.command_code, 0x0000_0173);
    assert_eq!(request.payload, vec![0x80, 0x00, 0x00, 0x01]);
    assert_eq!(request.header.to_bytes(), READ_PUBLIC[..10]);
}

#[test]
fn test_read_header_leaves_payload() {
    let mut stream = READ_PUBLIC.as_slice();
    let header = read_header(&mut stream).unwrap();
    assert_eq!(header.payload_len(), 4);
    assert_eq!(stream, &READ_PUBLIC[10..]);
}

#[test]
fn test_read_header_on_empty_stream_is_closed() {
    let mut stream: &[u8] = &[];
    assert!(matches!(read_header(&mut stream), Err(FrameError::Closed)));
}

#[rstest]
#[case(&READ_PUBLIC[..5], 10, 5)]
#[case(&READ_PUBLIC[..12], 4, 2)]
#[case(&READ_PUBLIC[..10], 4, 0)]
fn test_read_command_truncated(
    #[case] input: &[u8],
    #[case] expected_len: usize,
    #[case] actual_len: usize,
) {
    let mut stream = input;
    match read_command(&mut stream) {
        Err(FrameError::TruncatedRead { expected, actual }) => {
            assert_eq!(expected, expected_len);
            assert_eq!(actual, actual_len);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[rstest]
#[case(9)]
#[case(0)]
#[case(4097)]
#[case(0xffff_ffff)]
fn test_read_header_invalid_size(#[case] size: u32) {
    let mut frame = vec![0x80, 0x01];
    frame.extend_from_slice(&size.to_be_bytes());
    frame.extend_from_slice(&0x0000_0173u32.to_be_bytes());
    let mut stream = frame.as_slice();
    assert!(matches!(
        read_header(&mut stream),
        Err(FrameError::InvalidHeader(s)) if s == size
    ));
}

#[test]
fn test_encode_response_without_body() {
    let frame = encode_response(0x8001, 1, &[]);
    assert_eq!(
        frame,
        vec![0x80, 0x01, 0x00, 0x00, 0x00, 0x0a, 0x00, 0x00, 0x00, 0x01]
    );
}

#[test]
fn test_encode_response_computes_size() {
    let frame = encode_response(0x8001, 0, &[0xaa, 0xbb, 0xcc]);
    assert_eq!(&frame[2..6], &13u32.to_be_bytes());
    let (header, body) = read_response(&mut frame.as_slice()).unwrap();
    assert_eq!(header.response_code, 0);
    assert_eq!(body, vec![0xaa, 0xbb, 0xcc]);
}
