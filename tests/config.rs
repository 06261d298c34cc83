// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy

use log::LevelFilter;
use rstest::rstest;
use swtpm::{
    config::{CommandsKind, Config},
    ConfigError,
};

#[test]
fn test_defaults() {
    let config = Config::parse_args(Vec::<String>::new()).unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.port, 2321);
    assert!(!config.mssim);
    assert_eq!(config.commands, CommandsKind::Mock);
    assert_eq!(config.log_level, None);
}

#[test]
fn test_all_options() {
    let config = Config::parse_args([
        "--port",
        "3000",
        "--mssim",
        "--commands",
        "unimplemented",
        "--log-level=debug",
    ])
    .unwrap();
    assert_eq!(config.port, 3000);
    assert!(config.mssim);
    assert_eq!(config.platform_port().unwrap(), 3001);
    assert_eq!(config.commands, CommandsKind::Unimplemented);
    assert_eq!(config.log_level, Some(LevelFilter::Debug));
}

#[rstest]
#[case(&["--help"], "help")]
#[case(&["--commands", "real"], "commands")]
#[case(&["--log-level", "loud"], "log-level")]
#[case(&["--port", "65536"], "args")]
#[case(&["--port"], "args")]
#[case(&["--verbose"], "args")]
#[case(&["--mssim", "--port", "65535"], "port")]
fn test_invalid(#[case] args: &[&str], #[case] kind: &str) {
    let err = Config::parse_args(args.iter().copied()).unwrap_err();
    let actual = match err {
        ConfigError::Help => "help",
        ConfigError::Commands(_) => "commands",
        ConfigError::LogLevel(_) => "log-level",
        ConfigError::Args(_) => "args",
        ConfigError::Port(_) => "port",
    };
    assert_eq!(actual, kind);
}

#[test]
fn test_max_port_without_mssim() {
    let config = Config::parse_args(["--port", "65535"]).unwrap();
    assert!(config.platform_port().is_err());
}
