// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy
// Copyright (c) 2024-2025 Jarkko Sakkinen

//! A software TPM 2.0 stand-in serving raw TCP and MSSIM transports.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]

pub mod config;
pub mod constants;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod handler;
pub mod marshal;
pub mod message;
pub mod mocktpm;
pub mod mssim;
pub mod pcr;
pub mod server;
pub mod transport;

pub use crate::{
    device::TpmDevice,
    dispatch::{dispatch, pack_response, process_command},
    error::{ClientError, CommandError, ConfigError, FrameError, MarshalError, ServerError},
    handler::{TpmCommands, Unimplemented},
    mocktpm::MockTpm,
    server::{CancellationToken, TcpServer},
};
