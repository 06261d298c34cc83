// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2024-2025 Jarkko Sakkinen
// Copyright (c) 2025 Opinsys Oy

use log::{error, info};
use std::sync::Arc;
use swtpm::{
    config::{CommandsKind, Config, USAGE},
    server::{serve_mssim, RawService},
    CancellationToken, ConfigError, MockTpm, ServerError, TcpServer, TpmCommands, Unimplemented,
};

fn run(config: &Config) -> Result<(), ServerError> {
    let commands: Arc<dyn TpmCommands> = match config.commands {
        CommandsKind::Mock => Arc::new(MockTpm::new()),
        CommandsKind::Unimplemented => Arc::new(Unimplemented),
    };
    info!("command engine: {:?}", config.commands);

    let token = CancellationToken::new();
    let server = TcpServer::bind(&format!("localhost:{}", config.port))?;
    if config.mssim {
        let platform = TcpServer::bind(&format!("localhost:{}", config.platform_port()?))?;
        serve_mssim(server, platform, commands, &token)
    } else {
        server.serve(&Arc::new(RawService::new(commands)), &token)
    }
}

fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(ConfigError::Help) => {
            println!("{USAGE}");
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("{err}\n\n{USAGE}");
            std::process::exit(2);
        }
    };

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    logger.format_timestamp_micros();
    if let Some(level) = config.log_level {
        logger.filter_level(level);
    }
    logger.init();

    if let Err(err) = run(&config) {
        error!("{err}");
        std::process::exit(1);
    }
}
