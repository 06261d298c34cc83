// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy
// Copyright (c) 2024-2025 Jarkko Sakkinen

use crate::{
    constants::{TpmCc, TPM_CAP_PCRS, TPM_RC_SUCCESS, TPM_ST_NO_SESSIONS},
    error::ClientError,
    frame::{encode_command, read_response},
    marshal::{build_to_vec, parse_from_slice, TpmBuild, TpmParse},
    message::{
        GetCapabilityCommand, GetCapabilityResponse, NvPublic, NvReadPublicCommand,
        NvReadPublicResponse, ReadPublicCommand, ReadPublicResponse, StartAuthSessionCommand,
        StartAuthSessionResponse,
    },
    pcr::PcrSelection,
    transport::Transport,
};
use log::trace;

/// A client issuing TPM2 commands over a [`Transport`].
#[derive(Debug)]
pub struct TpmDevice<T: Transport> {
    transport: T,
}

impl<T: Transport> TpmDevice<T> {
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    #[must_use]
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Sends a command to the TPM and waits for the response, returning the
    /// response parameters.
    ///
    /// # Errors
    ///
    /// This function will return an error if building the command fails, I/O
    /// with the transport fails, or the TPM itself returns an error.
    pub fn execute<C: TpmBuild + ?Sized>(
        &mut self,
        cc: TpmCc,
        command: &C,
    ) -> Result<Vec<u8>, ClientError> {
        let body = build_to_vec(command)?;
        let command_bytes = encode_command(TPM_ST_NO_SESSIONS, cc as u32, &body);
        trace!("command: {}", hex::encode(&command_bytes));
        self.transport.send(&command_bytes)?;

        let resp_buf = self.transport.receive()?;
        trace!("response: {}", hex::encode(&resp_buf));
        let (header, body) = read_response(&mut resp_buf.as_slice())?;
        if header.response_code != TPM_RC_SUCCESS {
            return Err(ClientError::TpmRc(header.response_code));
        }
        Ok(body)
    }

    fn call<C: TpmBuild, R: TpmParse>(&mut self, cc: TpmCc, command: &C) -> Result<R, ClientError> {
        let body = self.execute(cc, command)?;
        Ok(parse_from_slice(&body)?)
    }

    /// # Errors
    ///
    /// Returns a `ClientError` if the command fails.
    pub fn read_public(&mut self, object_handle: u32) -> Result<ReadPublicResponse, ClientError> {
        self.call(TpmCc::ReadPublic, &ReadPublicCommand { object_handle })
    }

    /// # Errors
    ///
    /// Returns a `ClientError` if the command fails.
    pub fn nv_read_public(&mut self, nv_index: u32) -> Result<NvPublic, ClientError> {
        let resp: NvReadPublicResponse =
            self.call(TpmCc::NvReadPublic, &NvReadPublicCommand { nv_index })?;
        Ok(resp.nv_public)
    }

    /// Fetches the allocated PCR banks, returning the selections and the
    /// `moreData` flag.
    ///
    /// # Errors
    ///
    /// Returns a `ClientError` if the command fails or the TPM returns a
    /// different capability.
    pub fn get_capability_pcrs(
        &mut self,
        property: u32,
        property_count: u32,
    ) -> Result<(Vec<PcrSelection>, bool), ClientError> {
        let cmd = GetCapabilityCommand {
            cap: TPM_CAP_PCRS,
            property,
            property_count,
        };
        let resp: GetCapabilityResponse = self.call(TpmCc::GetCapability, &cmd)?;
        Ok((resp.pcrs, resp.more_data))
    }

    /// # Errors
    ///
    /// Returns a `ClientError` if the command fails.
    pub fn start_auth_session(
        &mut self,
        cmd: &StartAuthSessionCommand,
    ) -> Result<StartAuthSessionResponse, ClientError> {
        self.call(TpmCc::StartAuthSession, cmd)
    }
}
