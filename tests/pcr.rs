// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy
// Copyright (c) 2024-2025 Jarkko Sakkinen

use rstest::rstest;
use swtpm::{
    constants::TpmAlgId,
    marshal::TpmReader,
    pcr::{pcr_selection_decode, pcr_selection_encode, PcrSelection},
    MarshalError,
};

#[rstest]
#[case(
    vec![PcrSelection::new(TpmAlgId::SHA256, [0, 1, 2])],
    vec![0, 0, 0, 1, 0x00, 0x0b, 3, 0x07, 0x00, 0x00]
)]
#[case(
    vec![
        PcrSelection::new(TpmAlgId::SHA1, [7, 8]),
        PcrSelection::new(TpmAlgId::SHA256, [23]),
    ],
    vec![
        0, 0, 0, 2, 0x00, 0x04, 3, 0x80, 0x01, 0x00, 0x00, 0x0b, 3, 0x00, 0x00, 0x80,
    ]
)]
#[case(
    vec![PcrSelection::new(TpmAlgId::SHA1, [0, 1, 2, 3, 4])],
    vec![0, 0, 0, 1, 0x00, 0x04, 3, 0b0001_1111, 0x00, 0x00]
)]
#[case(
    vec![PcrSelection::new(TpmAlgId::SHA256, [23])],
    vec![0, 0, 0, 1, 0x00, 0x0b, 3, 0x00, 0x00, 0x80]
)]
#[case(vec![], vec![0, 0, 0, 0])]
fn test_pcr_selection_encode(#[case] selections: Vec<PcrSelection>, #[case] expected: Vec<u8>) {
    assert_eq!(pcr_selection_encode(&selections).unwrap(), expected);
}

#[rstest]
#[case(vec![PcrSelection::new(TpmAlgId::SHA1, [])])]
#[case(vec![
    PcrSelection::new(TpmAlgId::SHA1, [0, 1]),
    PcrSelection::new(TpmAlgId::SHA256, []),
])]
#[case(vec![
    PcrSelection::new(TpmAlgId::SHA1, []),
    PcrSelection::new(TpmAlgId::SHA256, [40]),
])]
fn test_pcr_selection_empty_bank_collapses(#[case] selections: Vec<PcrSelection>) {
    assert_eq!(pcr_selection_encode(&selections).unwrap(), vec![0, 0, 0, 0]);
}

#[test]
fn test_pcr_selection_index_out_of_range() {
    let selections = [PcrSelection::new(TpmAlgId::SHA256, [0, 24])];
    assert_eq!(
        pcr_selection_encode(&selections),
        Err(MarshalError::PcrIndexOutOfRange(24))
    );
}

#[test]
fn test_pcr_selection_decode_wider_select() {
    let wire = [0, 0, 0, 1, 0x00, 0x0b, 4, 0x01, 0x00, 0x00, 0x80];
    let mut reader = TpmReader::new(&wire);
    let selections = pcr_selection_decode(&mut reader).unwrap();
    assert_eq!(
        selections,
        vec![PcrSelection::new(TpmAlgId::SHA256, [0, 31])]
    );
    assert_eq!(reader.remaining(), 0);
}

#[test]
fn test_pcr_selection_decode_truncated() {
    let wire = [0, 0, 0, 2, 0x00, 0x0b, 3, 0xff, 0xff, 0xff];
    let mut reader = TpmReader::new(&wire);
    assert!(matches!(
        pcr_selection_decode(&mut reader),
        Err(MarshalError::Underflow { .. })
    ));
}
