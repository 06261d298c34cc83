// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy

use crate::error::ConfigError;
use lexopt::prelude::*;
use log::LevelFilter;
use std::{ffi::OsString, str::FromStr};

pub const DEFAULT_PORT: u16 = 2321;

pub const USAGE: &str = "\
Usage: swtpm [OPTIONS]

Options:
  --port <PORT>          TCP port of the TPM listener [default: 2321]
  --mssim                Serve the MSSIM command channel on PORT and the
                         platform channel on PORT+1
  --commands <ENGINE>    Command engine: mock, unimplemented [default: mock]
  --log-level <LEVEL>    off, error, warn, info, debug, trace
  --help                 Print help
";

/// Command engine served to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandsKind {
    #[default]
    Mock,
    Unimplemented,
}

impl FromStr for CommandsKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mock" => Ok(Self::Mock),
            "unimplemented" => Ok(Self::Unimplemented),
            _ => Err(ConfigError::Commands(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub mssim: bool,
    pub commands: CommandsKind,
    pub log_level: Option<LevelFilter>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            mssim: false,
            commands: CommandsKind::default(),
            log_level: None,
        }
    }
}

impl Config {
    /// Parses the process arguments.
    ///
    /// # Errors
    ///
    /// See [`Config::parse_args`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::parse_parser(lexopt::Parser::from_env())
    }

    /// Parses `args`, which must not include the program name.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Help` for `--help` and another `ConfigError` for
    /// an unknown option or an invalid value.
    pub fn parse_args<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator,
        I::Item: Into<OsString>,
    {
        Self::parse_parser(lexopt::Parser::from_args(args))
    }

    fn parse_parser(mut parser: lexopt::Parser) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        while let Some(arg) = parser.next()? {
            match arg {
                Long("port") => config.port = parser.value()?.parse()?,
                Long("mssim") => config.mssim = true,
                Long("commands") => config.commands = parser.value()?.string()?.parse()?,
                Long("log-level") => {
                    let value = parser.value()?.string()?;
                    let level = LevelFilter::from_str(&value)
                        .map_err(|_| ConfigError::LogLevel(value))?;
                    config.log_level = Some(level);
                }
                Long("help") => return Err(ConfigError::Help),
                _ => return Err(arg.unexpected().into()),
            }
        }
        if config.mssim {
            config.platform_port()?;
        }
        Ok(config)
    }

    /// Port of the MSSIM platform channel.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Port` if `port + 1` does not fit a port number.
    pub fn platform_port(&self) -> Result<u16, ConfigError> {
        self.port
            .checked_add(1)
            .ok_or(ConfigError::Port(self.port))
    }
}
