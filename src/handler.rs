// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy

use crate::{
    error::CommandError,
    message::{NvPublic, ReadPublicResponse, StartAuthSessionCommand, StartAuthSessionResponse},
    pcr::PcrSelection,
};

/// The command engine behind the dispatcher.
///
/// A single instance is shared by every connection, so implementations must
/// be safe to call concurrently and guard their own state.
pub trait TpmCommands: Send + Sync {
    /// Executes `TPM2_ReadPublic`.
    ///
    /// # Errors
    ///
    /// Returns a `CommandError` if the object cannot be read.
    fn read_public(&self, object_handle: u32) -> Result<ReadPublicResponse, CommandError>;

    /// Executes `TPM2_NV_ReadPublic`.
    ///
    /// # Errors
    ///
    /// Returns a `CommandError` if the index cannot be read.
    fn nv_read_public(&self, nv_index: u32) -> Result<NvPublic, CommandError>;

    /// Executes `TPM2_GetCapability` for `TPM_CAP_PCRS`.
    ///
    /// # Errors
    ///
    /// Returns a `CommandError` if the banks cannot be reported.
    fn get_capability_pcrs(
        &self,
        property_count: u32,
        property: u32,
    ) -> Result<Vec<PcrSelection>, CommandError>;

    /// Executes `TPM2_StartAuthSession`.
    ///
    /// # Errors
    ///
    /// Returns a `CommandError` if the session cannot be started.
    fn start_auth_session(
        &self,
        cmd: &StartAuthSessionCommand,
    ) -> Result<StartAuthSessionResponse, CommandError>;
}

/// A command engine that fails every command with
/// `CommandError::NotImplemented`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unimplemented;

impl TpmCommands for Unimplemented {
    fn read_public(&self, _object_handle: u32) -> Result<ReadPublicResponse, CommandError> {
        Err(CommandError::NotImplemented)
    }

    fn nv_read_public(&self, _nv_index: u32) -> Result<NvPublic, CommandError> {
        Err(CommandError::NotImplemented)
    }

    fn get_capability_pcrs(
        &self,
        _property_count: u32,
        _property: u32,
    ) -> Result<Vec<PcrSelection>, CommandError> {
        Err(CommandError::NotImplemented)
    }

    fn start_auth_session(
        &self,
        _cmd: &StartAuthSessionCommand,
    ) -> Result<StartAuthSessionResponse, CommandError> {
        Err(CommandError::NotImplemented)
    }
}
