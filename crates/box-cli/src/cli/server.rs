//! # boxd
//!
//! Server entry point: flags, configuration, logging, signals, runtime.

use clap::Parser;
use std::path::PathBuf;

use box_core::config::{example_config, PORT_ENV};
use box_core::{LogLevel, LogTarget, ProtocolMode, ServerConfig, ServerOverrides, TransportMode};
use box_lib::{install_signal_handlers, received_signal, refuse_root, Server};
use box_protocol::ErrorKind;

use super::{logging, output, parse_port_arg, EXIT_CONFIG, EXIT_FAILURE};

/// boxd - box queue server
#[derive(Parser, Debug)]
#[command(
    name = "boxd",
    version = env!("CARGO_PKG_VERSION"),
    about = "Queue server speaking the box v1 protocol over UDP",
    after_help = "Environment:\n  BOXD_PORT   default UDP port when --port is not given\n\n\
        Files:\n  ~/.box/boxd.toml         configuration\n  \
        ~/.box/run/boxd.socket   admin socket (send \"status\")",
    styles = output::styles(),
)]
pub struct ServerArgs {
    /// UDP port to listen on
    #[arg(long, value_parser = parse_port_arg)]
    pub port: Option<u16>,

    /// trace, debug, info, warn or error
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// stderr, syslog, oslog, eventlog or file:<path>
    #[arg(long, value_name = "TARGET")]
    pub log_target: Option<LogTarget>,

    /// simple or v1
    #[arg(long)]
    pub protocol: Option<ProtocolMode>,

    /// clear or noise
    #[arg(long)]
    pub transport: Option<TransportMode>,

    /// Server static public key (PEM or hex)
    #[arg(long, value_name = "PEM")]
    pub cert: Option<PathBuf>,

    /// Static private key (PEM or hex)
    #[arg(long, value_name = "PEM")]
    pub key: Option<PathBuf>,

    /// Identity associated with the pre-shared key
    #[arg(long, value_name = "ID")]
    pub pre_share_key_identity: Option<String>,

    /// Pre-shared secret for the secure transport
    #[arg(long, value_name = "ASCII")]
    pub pre_share_key: Option<String>,

    /// Print an example boxd.toml and exit
    #[arg(long)]
    pub print_config: bool,

    /// Runtime directory (defaults to ~/.box)
    #[arg(long, hide = true)]
    pub base_dir: Option<PathBuf>,
}

impl ServerArgs {
    pub fn overrides(&self) -> ServerOverrides {
        ServerOverrides {
            port: self.port,
            log_level: self.log_level,
            log_target: self.log_target.clone(),
            protocol: self.protocol,
            transport: self.transport,
            cert: self.cert.clone(),
            key: self.key.clone(),
            pre_share_key_identity: self.pre_share_key_identity.clone(),
            pre_share_key: self.pre_share_key.clone(),
        }
    }

    /// Layer the config file, `BOXD_PORT` and these flags
    pub fn resolve(&self, env_port: Option<&str>) -> Result<ServerConfig, box_core::ConfigError> {
        ServerConfig::load(self.base_dir.clone(), env_port, &self.overrides())
    }
}

/// Run `boxd`, returning the process exit status
pub fn run() -> i32 {
    let args = ServerArgs::parse();

    if args.print_config {
        print!("{}", example_config());
        return 0;
    }

    if let Err(e) = refuse_root() {
        output::print_error(e);
        return EXIT_FAILURE;
    }

    let env_port = std::env::var(PORT_ENV).ok();
    let config = match args.resolve(env_port.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            output::print_error(e);
            return EXIT_CONFIG;
        }
    };

    if let Err(e) = logging::init(config.log_level, &config.log_target) {
        output::print_error(format!("cannot open log target {}: {}", config.log_target, e));
        return EXIT_CONFIG;
    }
    config.warn_ignored_keys();

    install_signal_handlers();

    let server = match Server::start(config) {
        Ok(server) => server,
        Err(e) => {
            log::error!("Startup failed: {}", e);
            output::print_error(&e);
            return match e.kind() {
                ErrorKind::Configuration => EXIT_CONFIG,
                _ => EXIT_FAILURE,
            };
        }
    };

    server.run_until_stopped();

    match received_signal() {
        Some(signal) => -signal,
        None => 0,
    }
}
