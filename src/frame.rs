// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy

//! TPM2 command and response framing.
//!
//! Both headers share the same ten byte layout: a `u16` tag, a `u32` total
//! frame size including the header, and a `u32` command or response code.

use crate::{
    constants::{TPM_HEADER_SIZE, TPM_MAX_COMMAND_SIZE},
    error::FrameError,
};
use std::io::{self, Read};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHeader {
    pub tag: u16,
    pub size: u32,
    pub command_code: u32,
}

impl CommandHeader {
    /// Number of payload bytes following the header.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        (self.size as usize).saturating_sub(TPM_HEADER_SIZE)
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; TPM_HEADER_SIZE] {
        header_bytes(self.tag, self.size, self.command_code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub tag: u16,
    pub size: u32,
    pub response_code: u32,
}

impl ResponseHeader {
    #[must_use]
    pub fn body_len(&self) -> usize {
        (self.size as usize).saturating_sub(TPM_HEADER_SIZE)
    }
}

/// A decoded inbound command frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub header: CommandHeader,
    pub payload: Vec<u8>,
}

/// Reads until `buf` is full or the stream ends, returning the byte count.
fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Fills `buf` from the stream.
///
/// If `frame_start` is set and the stream ends before the first byte, the
/// peer closed the connection between frames and `FrameError::Closed` is
/// returned. Any other short read is `FrameError::TruncatedRead`.
///
/// # Errors
///
/// Returns a `FrameError` on I/O failure or a short read.
pub fn read_exact_frame<R: Read + ?Sized>(
    reader: &mut R,
    buf: &mut [u8],
    frame_start: bool,
) -> Result<(), FrameError> {
    let expected = buf.len();
    match read_full(reader, buf)? {
        n if n == expected => Ok(()),
        0 if frame_start => Err(FrameError::Closed),
        actual => Err(FrameError::TruncatedRead { expected, actual }),
    }
}

fn header_bytes(tag: u16, size: u32, code: u32) -> [u8; TPM_HEADER_SIZE] {
    let mut bytes = [0u8; TPM_HEADER_SIZE];
    bytes[0..2].copy_from_slice(&tag.to_be_bytes());
    bytes[2..6].copy_from_slice(&size.to_be_bytes());
    bytes[6..10].copy_from_slice(&code.to_be_bytes());
    bytes
}

fn read_raw_header<R: Read + ?Sized>(reader: &mut R) -> Result<(u16, u32, u32), FrameError> {
    let mut header = [0u8; TPM_HEADER_SIZE];
    read_exact_frame(reader, &mut header, true)?;

    let tag = u16::from_be_bytes([header[0], header[1]]);
    let size = u32::from_be_bytes([header[2], header[3], header[4], header[5]]);
    let code = u32::from_be_bytes([header[6], header[7], header[8], header[9]]);

    if (size as usize) < TPM_HEADER_SIZE || size as usize > TPM_MAX_COMMAND_SIZE {
        return Err(FrameError::InvalidHeader(size));
    }
    Ok((tag, size, code))
}

fn read_body<R: Read + ?Sized>(reader: &mut R, len: usize) -> Result<Vec<u8>, FrameError> {
    let mut body = vec![0u8; len];
    if len > 0 {
        read_exact_frame(reader, &mut body, false)?;
    }
    Ok(body)
}

/// Reads a command header from the stream.
///
/// # Errors
///
/// Returns `FrameError::TruncatedRead` on a short read and
/// `FrameError::InvalidHeader` if the declared size cannot hold the header or
/// exceeds `TPM_MAX_COMMAND_SIZE`.
pub fn read_header<R: Read + ?Sized>(reader: &mut R) -> Result<CommandHeader, FrameError> {
    let (tag, size, command_code) = read_raw_header(reader)?;
    Ok(CommandHeader {
        tag,
        size,
        command_code,
    })
}

/// Reads exactly the payload declared by `header`.
///
/// # Errors
///
/// Returns `FrameError::TruncatedRead` if the stream ends early.
pub fn read_payload<R: Read + ?Sized>(
    reader: &mut R,
    header: &CommandHeader,
) -> Result<Vec<u8>, FrameError> {
    read_body(reader, header.payload_len())
}

/// Reads one complete command frame.
///
/// # Errors
///
/// Returns a `FrameError` if the header or the payload cannot be read.
pub fn read_command<R: Read + ?Sized>(reader: &mut R) -> Result<CommandRequest, FrameError> {
    let header = read_header(reader)?;
    let payload = read_payload(reader, &header)?;
    Ok(CommandRequest { header, payload })
}

/// Reads one complete response frame.
///
/// # Errors
///
/// Returns a `FrameError` if the header or the body cannot be read.
pub fn read_response<R: Read + ?Sized>(
    reader: &mut R,
) -> Result<(ResponseHeader, Vec<u8>), FrameError> {
    let (tag, size, response_code) = read_raw_header(reader)?;
    let header = ResponseHeader {
        tag,
        size,
        response_code,
    };
    let body = read_body(reader, header.body_len())?;
    Ok((header, body))
}

#[allow(clippy::cast_possible_truncation)]
fn encode_frame(tag: u16, code: u32, body: &[u8]) -> Vec<u8> {
    let size = (TPM_HEADER_SIZE + body.len()) as u32;
    let mut frame = Vec::with_capacity(TPM_HEADER_SIZE + body.len());
    frame.extend_from_slice(&header_bytes(tag, size, code));
    frame.extend_from_slice(body);
    frame
}

/// Encodes a command frame. The size field is computed from `body`.
#[must_use]
pub fn encode_command(tag: u16, command_code: u32, body: &[u8]) -> Vec<u8> {
    encode_frame(tag, command_code, body)
}

/// Encodes a response frame.
///
/// The size field is always recomputed from the length of `body`, and an
/// empty body adds no bytes after the header.
#[must_use]
pub fn encode_response(tag: u16, response_code: u32, body: &[u8]) -> Vec<u8> {
    encode_frame(tag, response_code, body)
}
