//! # box
//!
//! Client entry point: probe, optional secure session, HELLO, one command.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use box_core::config::default_timeout_ms;
use box_core::crypto::load_key;
use box_core::{ClientConfig, CommandTransports, LogLevel, LogTarget, NoisePattern, TransportMode};
use box_lib::{Client, Reply};
use box_protocol::{BoxError, DEFAULT_PORT};

use super::{logging, output, parse_port_arg, EXIT_CONFIG, EXIT_FAILURE};

/// box - client for the box queue server
#[derive(Parser, Debug)]
#[command(
    name = "box",
    version = env!("CARGO_PKG_VERSION"),
    about = "Send requests to a boxd server",
    after_help = "Examples:\n  \
        box ping\n  \
        box put jobs '{\"id\":1}' --content-type application/json\n  \
        box --transport noise --pre-share-key s3cret get jobs\n  \
        box --transport-put noise --pre-share-key s3cret put jobs data",
    styles = output::styles(),
)]
pub struct ClientArgs {
    /// Server host name or address
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server UDP port
    #[arg(long, value_parser = parse_port_arg, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// clear or noise
    #[arg(long, default_value = "clear")]
    pub transport: TransportMode,

    /// Transport for PUT (defaults to --transport)
    #[arg(long, value_name = "MODE")]
    pub transport_put: Option<TransportMode>,

    /// Transport for GET and DELETE (defaults to --transport)
    #[arg(long, value_name = "MODE")]
    pub transport_get: Option<TransportMode>,

    /// Transport for STATUS (defaults to --transport)
    #[arg(long, value_name = "MODE")]
    pub transport_status: Option<TransportMode>,

    /// Pre-shared secret for the secure transport
    #[arg(long, value_name = "ASCII")]
    pub pre_share_key: Option<String>,

    /// nk or ik
    #[arg(long, default_value = "nk")]
    pub noise_pattern: NoisePattern,

    /// Server static public key (PEM or hex)
    #[arg(long, value_name = "PEM")]
    pub cert: Option<PathBuf>,

    /// Client static private key (PEM or hex)
    #[arg(long, value_name = "PEM")]
    pub key: Option<PathBuf>,

    /// Reply timeout in milliseconds
    #[arg(long, default_value_t = default_timeout_ms())]
    pub timeout_ms: u64,

    /// trace, debug, info, warn or error
    #[arg(long, default_value = "warn")]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: ClientCommand,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ClientCommand {
    /// Check the server is alive (STATUS)
    Ping,
    /// Exchange HELLO
    Hello,
    /// Store data under a queue
    Put {
        queue: String,
        data: String,
        #[arg(long, default_value = "text/plain")]
        content_type: String,
    },
    /// Fetch the newest object in a queue
    Get { queue: String },
    /// Remove a queue's newest object
    Delete { queue: String },
}

impl ClientArgs {
    /// Client configuration described by these flags
    pub fn client_config(&self) -> Result<ClientConfig, BoxError> {
        let mut config = ClientConfig::new(&self.host, self.port);
        config.transport = self.transport;
        config.command_transports = CommandTransports {
            put: self.transport_put,
            get: self.transport_get,
            status: self.transport_status,
        };
        config.timeout = Duration::from_millis(self.timeout_ms);
        config.security.pattern = self.noise_pattern;

        if let Some(ref psk) = self.pre_share_key {
            config
                .security
                .set_pre_shared_key(psk)
                .map_err(|e| BoxError::Config(e.to_string()))?;
        }
        if let Some(ref path) = self.cert {
            let key = load_key(path).map_err(|e| BoxError::Config(e.to_string()))?;
            config.security = config.security.with_server_static_public(*key);
        }
        if let Some(ref path) = self.key {
            let key = load_key(path).map_err(|e| BoxError::Config(e.to_string()))?;
            config.security = config.security.with_client_static_private(*key);
        }
        Ok(config)
    }
}

fn execute(client: &mut Client, command: &ClientCommand) -> Result<Reply, BoxError> {
    match command {
        ClientCommand::Ping => client.ping(),
        ClientCommand::Hello => client.hello(),
        ClientCommand::Put {
            queue,
            data,
            content_type,
        } => client.put(queue, content_type, data.as_bytes()),
        ClientCommand::Get { queue } => client.get(queue),
        ClientCommand::Delete { queue } => client.delete(queue),
    }
}

fn session(args: &ClientArgs) -> Result<Reply, BoxError> {
    let config = args.client_config()?;
    let needs_session = config.needs_session();
    let mut client = Client::connect(config)?;

    client.probe()?;
    if needs_session {
        client.establish_session()?;
    }
    if args.command != ClientCommand::Hello {
        client.hello()?;
    }
    let reply = execute(&mut client, &args.command);
    client.close();
    reply
}

/// Run `box`, returning the process exit status
pub fn run() -> i32 {
    let args = ClientArgs::parse();

    if let Err(e) = logging::init(args.log_level, &LogTarget::Stderr) {
        output::print_error(e);
        return EXIT_CONFIG;
    }

    match session(&args) {
        Ok(reply) => {
            if output::print_reply(&reply) {
                0
            } else {
                EXIT_FAILURE
            }
        }
        Err(e) => {
            output::print_error(&e);
            match e {
                BoxError::Config(_) => EXIT_CONFIG,
                _ => EXIT_FAILURE,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_put() {
        let args = ClientArgs::try_parse_from([
            "box",
            "--port",
            "9000",
            "put",
            "jobs",
            "payload",
            "--content-type",
            "application/json",
        ])
        .unwrap();
        assert_eq!(args.port, 9000);
        assert_eq!(args.transport, TransportMode::Clear);
        assert_eq!(
            args.command,
            ClientCommand::Put {
                queue: "jobs".into(),
                data: "payload".into(),
                content_type: "application/json".into(),
            }
        );
    }

    #[test]
    fn test_noise_config() {
        let args = ClientArgs::try_parse_from([
            "box",
            "--transport",
            "noise",
            "--pre-share-key",
            "psk123",
            "--noise-pattern",
            "ik",
            "--timeout-ms",
            "50",
            "ping",
        ])
        .unwrap();
        let config = args.client_config().unwrap();
        assert!(config.needs_session());
        assert!(config.security.has_secret());
        assert_eq!(config.security.pattern, NoisePattern::Ik);
        assert_eq!(config.timeout, Duration::from_millis(50));
    }

    #[test]
    fn test_per_command_transports() {
        let args = ClientArgs::try_parse_from([
            "box",
            "--transport-put",
            "noise",
            "--transport-status",
            "clear",
            "--pre-share-key",
            "psk123",
            "ping",
        ])
        .unwrap();
        let config = args.client_config().unwrap();
        assert_eq!(config.put_transport(), TransportMode::Noise);
        assert_eq!(config.get_transport(), TransportMode::Clear);
        assert_eq!(config.status_transport(), TransportMode::Clear);
        assert!(config.needs_session());
    }

    #[test]
    fn test_long_pre_shared_key_rejected() {
        let long = "k".repeat(65);
        let args =
            ClientArgs::try_parse_from(["box", "--pre-share-key", long.as_str(), "ping"]).unwrap();
        assert!(matches!(args.client_config(), Err(BoxError::Config(_))));
    }

    #[test]
    fn test_missing_key_file() {
        let args =
            ClientArgs::try_parse_from(["box", "--key", "/nonexistent/client.pem", "ping"]).unwrap();
        assert!(matches!(args.client_config(), Err(BoxError::Config(_))));
    }
}
