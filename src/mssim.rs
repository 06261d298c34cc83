// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy

//! MSSIM simulator socket protocol.
//!
//! The command channel wraps TPM2 frames:
//!
//! ```text
//! request:  command(u32) locality(u8) size(u32) payload[size]
//! response: size(u32) body[size] result(u32)
//! ```
//!
//! The platform channel carries a bare `u32` command and is answered with a
//! `u32` status.

use crate::{
    constants::TPM_MAX_COMMAND_SIZE,
    error::FrameError,
    frame::read_exact_frame,
};
use std::io::{Read, Write};

pub const MSSIM_RC_SUCCESS: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MssimCommand {
    SignalPowerOn = 1,
    SignalPowerOff = 2,
    SendCommand = 8,
    SignalNvOn = 11,
    SessionEnd = 20,
}

impl TryFrom<u32> for MssimCommand {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::SignalPowerOn),
            2 => Ok(Self::SignalPowerOff),
            8 => Ok(Self::SendCommand),
            11 => Ok(Self::SignalNvOn),
            20 => Ok(Self::SessionEnd),
            _ => Err(value),
        }
    }
}

/// A command channel request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MssimRequest {
    pub command: u32,
    pub locality: u8,
    pub payload: Vec<u8>,
}

impl MssimRequest {
    #[must_use]
    pub fn is_session_end(&self) -> bool {
        self.command == MssimCommand::SessionEnd as u32
    }
}

fn read_u32<R: Read + ?Sized>(reader: &mut R, frame_start: bool) -> Result<u32, FrameError> {
    let mut bytes = [0u8; 4];
    read_exact_frame(reader, &mut bytes, frame_start)?;
    Ok(u32::from_be_bytes(bytes))
}

/// Reads one command channel request.
///
/// `TPM_SESSION_END` is sent without locality and payload, and is returned as
/// a request with an empty payload.
///
/// # Errors
///
/// Returns `FrameError::TruncatedRead` on a short read and
/// `FrameError::PayloadTooLarge` if the declared payload exceeds
/// `TPM_MAX_COMMAND_SIZE`.
pub fn read_request<R: Read + ?Sized>(reader: &mut R) -> Result<MssimRequest, FrameError> {
    let command = read_u32(reader, true)?;
    if command == MssimCommand::SessionEnd as u32 {
        return Ok(MssimRequest {
            command,
            locality: 0,
            payload: Vec::new(),
        });
    }

    let mut locality = [0u8; 1];
    read_exact_frame(reader, &mut locality, false)?;

    let size = read_u32(reader, false)?;
    if size as usize > TPM_MAX_COMMAND_SIZE {
        return Err(FrameError::PayloadTooLarge(size));
    }
    let mut payload = vec![0u8; size as usize];
    if size > 0 {
        read_exact_frame(reader, &mut payload, false)?;
    }

    Ok(MssimRequest {
        command,
        locality: locality[0],
        payload,
    })
}

/// Encodes a command channel request.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn encode_request(command: u32, locality: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(9 + payload.len());
    frame.extend_from_slice(&command.to_be_bytes());
    frame.push(locality);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Encodes a command channel response: body size, body, result code.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn encode_response(result_code: u32, body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(8 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(body);
    frame.extend_from_slice(&result_code.to_be_bytes());
    frame
}

/// Reads one command channel response, returning the result code and body.
///
/// # Errors
///
/// Returns a `FrameError` on a short read or an oversized body.
pub fn read_response<R: Read + ?Sized>(reader: &mut R) -> Result<(u32, Vec<u8>), FrameError> {
    let size = read_u32(reader, true)?;
    if size as usize > TPM_MAX_COMMAND_SIZE {
        return Err(FrameError::PayloadTooLarge(size));
    }
    let mut body = vec![0u8; size as usize];
    if size > 0 {
        read_exact_frame(reader, &mut body, false)?;
    }
    let result_code = read_u32(reader, false)?;
    Ok((result_code, body))
}

/// Reads one platform channel command.
///
/// # Errors
///
/// Returns a `FrameError` if the command cannot be read.
pub fn read_platform_command<R: Read + ?Sized>(reader: &mut R) -> Result<u32, FrameError> {
    read_u32(reader, true)
}

/// Acknowledges a platform channel command with a success status.
///
/// # Errors
///
/// Returns `FrameError::Io` if the status cannot be written.
pub fn write_ack<W: Write + ?Sized>(writer: &mut W) -> Result<(), FrameError> {
    writer.write_all(&MSSIM_RC_SUCCESS.to_be_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Reads the status of a platform channel command.
///
/// # Errors
///
/// Returns a `FrameError` if the status cannot be read.
pub fn read_platform_status<R: Read + ?Sized>(reader: &mut R) -> Result<u32, FrameError> {
    read_u32(reader, true)
}
