// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy

use std::io::Error as IoError;
use thiserror::Error;

/// Errors raised by the packing primitives.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MarshalError {
    #[error("buffer underflow: need {needed} bytes, {remaining} remaining")]
    Underflow { needed: usize, remaining: usize },

    #[error("buffer of {0} bytes does not fit a size field")]
    Capacity(usize),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("PCR index {0} is out of range")]
    PcrIndexOutOfRange(u32),
}

/// Transport-tier errors. Any of these terminates the connection.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("connection closed")]
    Closed,

    #[error("truncated read: expected {expected} bytes, got {actual}")]
    TruncatedRead { expected: usize, actual: usize },

    #[error("invalid header size: {0}")]
    InvalidHeader(u32),

    #[error("payload too large: {0}")]
    PayloadTooLarge(u32),

    #[error("I/O: {0}")]
    Io(#[from] IoError),
}

/// Command-tier errors. These are reported in-band as a failure response.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command {0:#010x} is not supported")]
    UnsupportedCommand(u32),

    #[error("capability {0:#010x} is not supported")]
    UnsupportedCapability(u32),

    #[error("malformed command: {0}")]
    Marshal(#[from] MarshalError),

    #[error("not implemented")]
    NotImplemented,

    #[error("handle {0:#010x} not found")]
    Handle(u32),

    #[error("{0}")]
    Value(String),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("'{0}': {1}")]
    Bind(String, #[source] IoError),

    #[error("I/O: {0}")]
    Io(#[from] IoError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("frame: {0}")]
    Frame(#[from] FrameError),

    #[error("marshal: {0}")]
    Marshal(#[from] MarshalError),

    #[error("MSSIM result code {0:#010x}")]
    MssimRc(u32),

    #[error("TPM response code {0:#010x}")]
    TpmRc(u32),

    #[error("TPM unexpected: {0}")]
    UnexpectedResponse(String),
}

impl From<IoError> for ClientError {
    fn from(err: IoError) -> Self {
        ClientError::Frame(FrameError::Io(err))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Args(#[from] lexopt::Error),

    #[error("help requested")]
    Help,

    #[error("invalid log level '{0}'")]
    LogLevel(String),

    #[error("invalid command engine '{0}'")]
    Commands(String),

    #[error("port {0} leaves no room for the platform channel")]
    Port(u16),
}
