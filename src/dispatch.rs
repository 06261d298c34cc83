// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy

//! Routes decoded commands to a [`TpmCommands`] engine and packs the results.

use crate::{
    constants::{
        TpmCc, TPM_CAP_PCRS, TPM_HEADER_SIZE, TPM_MAX_COMMAND_SIZE, TPM_RC_GENERIC_FAILURE,
        TPM_RC_SUCCESS, TPM_ST_NO_SESSIONS,
    },
    error::{CommandError, FrameError},
    frame::{encode_response, read_command, CommandHeader},
    handler::TpmCommands,
    marshal::{build_to_vec, TpmParse, TpmReader},
    message::{
        GetCapabilityCommand, GetCapabilityResponse, NvReadPublicCommand, NvReadPublicResponse,
        ReadPublicCommand, StartAuthSessionCommand,
    },
};
use log::{debug, trace};
use std::io::Read;

/// Unpacks the parameters of a command, invokes the engine and returns the
/// marshalled response parameters.
///
/// Trailing payload bytes beyond the parameters of a command are ignored.
///
/// # Errors
///
/// Returns a `CommandError` if the command code is unknown, the payload is
/// malformed, or the engine fails the command.
pub fn dispatch<T: TpmCommands + ?Sized>(
    header: &CommandHeader,
    payload: &[u8],
    commands: &T,
) -> Result<Vec<u8>, CommandError> {
    let cc = TpmCc::try_from(header.command_code).map_err(CommandError::UnsupportedCommand)?;
    debug!("{cc}");

    let mut reader = TpmReader::new(payload);
    let body = match cc {
        TpmCc::ReadPublic => {
            let cmd = ReadPublicCommand::parse(&mut reader)?;
            let resp = commands.read_public(cmd.object_handle)?;
            build_to_vec(&resp)?
        }
        TpmCc::NvReadPublic => {
            let cmd = NvReadPublicCommand::parse(&mut reader)?;
            let nv_public = commands.nv_read_public(cmd.nv_index)?;
            build_to_vec(&NvReadPublicResponse { nv_public })?
        }
        TpmCc::GetCapability => {
            let cmd = GetCapabilityCommand::parse(&mut reader)?;
            if cmd.cap != TPM_CAP_PCRS {
                return Err(CommandError::UnsupportedCapability(cmd.cap));
            }
            let pcrs = commands.get_capability_pcrs(cmd.property_count, cmd.property)?;
            build_to_vec(&GetCapabilityResponse {
                more_data: false,
                pcrs,
            })?
        }
        TpmCc::StartAuthSession => {
            let cmd = StartAuthSessionCommand::parse(&mut reader)?;
            let resp = commands.start_auth_session(&cmd)?;
            build_to_vec(&resp)?
        }
    };
    Ok(body)
}

/// Wraps a dispatch result into a response frame.
///
/// Every command-level error becomes a response carrying
/// `TPM_RC_GENERIC_FAILURE` and no body.
#[must_use]
pub fn pack_response(result: Result<Vec<u8>, CommandError>) -> Vec<u8> {
    match result {
        Ok(body) if body.len() <= TPM_MAX_COMMAND_SIZE - TPM_HEADER_SIZE => {
            encode_response(TPM_ST_NO_SESSIONS, TPM_RC_SUCCESS, &body)
        }
        Ok(body) => {
            debug!("response body of {} bytes does not fit a frame", body.len());
            encode_response(TPM_ST_NO_SESSIONS, TPM_RC_GENERIC_FAILURE, &[])
        }
        Err(e) => {
            debug!("{e}");
            encode_response(TPM_ST_NO_SESSIONS, TPM_RC_GENERIC_FAILURE, &[])
        }
    }
}

/// Reads one command frame from `reader`, executes it and returns the
/// complete response frame.
///
/// # Errors
///
/// Returns a `FrameError` only if the command frame cannot be read. Command
/// failures are reported inside the returned response.
pub fn process_command<R: Read + ?Sized, T: TpmCommands + ?Sized>(
    reader: &mut R,
    commands: &T,
) -> Result<Vec<u8>, FrameError> {
    let request = read_command(reader)?;
    trace!(
        "command: {}{}",
        hex::encode(request.header.to_bytes()),
        hex::encode(&request.payload)
    );
    let response = pack_response(dispatch(&request.header, &request.payload, commands));
    trace!("response: {}", hex::encode(&response));
    Ok(response)
}
