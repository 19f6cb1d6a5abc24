//! # Server Runtime
//!
//! Three runloops and an admin thread around one UDP socket:
//!
//! ```text
//!  UDP ──► input ──(Datagram / Plaintext)──► main ──(SendClear / SendSecure)──► output ──► UDP
//!           │  decrypts                      state machine, store              encrypts
//!           └──────────────(Attach sender)─────────────────────────────────────►
//!  admin socket ──(Admin)──► main
//! ```
//!
//! Only the input thread reads the socket and decrypts; only the output
//! thread writes and encrypts. The state machine runs on the main thread.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use box_core::{QueueArchive, SecurityConfig, ServerConfig, Store, TransportMode};
use box_protocol::{is_secure_frame, BoxError};

use super::events::{InputEvent, MainEvent, OutputEvent};
use super::state::{Channel, ServerStateMachine};
use crate::platform::{
    admin_reply, ensure_private_dir, is_running, send_datagram, AdminListener, AdminThread,
    UdpEndpoint,
};
use crate::runloop::{Runloop, RunloopHandle};
use crate::transport::{TransportReceiver, TransportSender, TransportSession};
use crate::VERSION;

/// Receive wait per `DrainOne` when there is no reactor
const DRAIN_POLL_MS: i32 = 100;
/// Shutdown flag check interval
const SIGNAL_POLL: Duration = Duration::from_millis(100);

// ═══════════════════════════════════════════════════════════════════════════
// NETWORK INPUT
// ═══════════════════════════════════════════════════════════════════════════

struct InputWorker {
    endpoint: UdpEndpoint,
    transport: TransportMode,
    security: SecurityConfig,
    receiver: Option<TransportReceiver>,
    main: RunloopHandle<MainEvent>,
    output: RunloopHandle<OutputEvent>,
    input: RunloopHandle<InputEvent>,
}

impl InputWorker {
    fn handle(&mut self, event: InputEvent) {
        match event {
            InputEvent::Readable => loop {
                match self.endpoint.try_recv() {
                    Ok(Some((peer, bytes))) => self.route(peer, bytes),
                    Ok(None) => break,
                    Err(e) => {
                        log::warn!("UDP receive failed: {}", e);
                        break;
                    }
                }
            },
            InputEvent::DrainOne => {
                match self.endpoint.recv_timeout(DRAIN_POLL_MS) {
                    Ok(Some((peer, bytes))) => self.route(peer, bytes),
                    Ok(None) => {}
                    Err(e) => log::warn!("UDP receive failed: {}", e),
                }
                if let Err(e) = self.input.post(InputEvent::DrainOne) {
                    log::debug!("Input polling ended: {}", e);
                }
            }
        }
    }

    fn ensure_session(&mut self, peer: SocketAddr) {
        if self.transport != TransportMode::Noise || self.receiver.is_some() {
            return;
        }
        match TransportSession::new(self.endpoint.socket(), peer, &self.security) {
            Ok(session) => {
                let (sender, receiver) = session.split();
                if let Err(e) = self.output.post(OutputEvent::Attach(sender)) {
                    log::warn!("Cannot hand session to output: {}", e);
                    return;
                }
                log::info!("Secure session bound to {}", peer);
                self.receiver = Some(receiver);
            }
            Err(e) => log::warn!("Cannot create secure session for {}: {}", peer, e),
        }
    }

    fn route(&mut self, peer: SocketAddr, bytes: Vec<u8>) {
        self.ensure_session(peer);

        let event = match self.receiver {
            Some(ref mut receiver) if is_secure_frame(&bytes) => {
                if receiver.peer() != peer {
                    log::warn!("Secure datagram from {} but session is bound to {}", peer, receiver.peer());
                    return;
                }
                match receiver.open(&bytes) {
                    Ok(plaintext) => MainEvent::Plaintext {
                        peer,
                        bytes: plaintext,
                    },
                    Err(e) if e.is_replay() => {
                        log::warn!("Dropping replayed frame from {}: {}", peer, e);
                        return;
                    }
                    Err(e) => {
                        log::warn!("Dropping secure datagram from {}: {}", peer, e);
                        return;
                    }
                }
            }
            _ => MainEvent::Datagram { peer, bytes },
        };

        if let Err(e) = self.main.post(event) {
            log::warn!("Dropping datagram from {}: {}", peer, e);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// MAIN
// ═══════════════════════════════════════════════════════════════════════════

struct MainWorker {
    machine: ServerStateMachine,
    output: RunloopHandle<OutputEvent>,
}

impl MainWorker {
    fn handle(&mut self, event: MainEvent) {
        let reply = match event {
            MainEvent::Datagram { peer, bytes } => self
                .machine
                .handle(peer, &bytes, Channel::Clear)
                .map(|bytes| OutputEvent::SendClear { peer, bytes }),
            MainEvent::Plaintext { peer, bytes } => self
                .machine
                .handle(peer, &bytes, Channel::Secure)
                .map(|bytes| OutputEvent::SendSecure { bytes }),
            MainEvent::Admin(request) => {
                let body = admin_reply(&request.line, VERSION);
                if let Err(e) = request.reply(&body) {
                    log::warn!("Admin reply failed: {}", e);
                }
                None
            }
        };

        if let Some(reply) = reply {
            if let Err(e) = self.output.post(reply) {
                log::warn!("Dropping reply: {}", e);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// NETWORK OUTPUT
// ═══════════════════════════════════════════════════════════════════════════

struct OutputWorker {
    socket: Arc<UdpSocket>,
    sender: Option<TransportSender>,
}

impl OutputWorker {
    fn handle(&mut self, event: OutputEvent) {
        match event {
            OutputEvent::SendClear { peer, bytes } => {
                if let Err(e) = send_datagram(&self.socket, &bytes, peer) {
                    log::warn!("Send to {} failed: {}", peer, e);
                }
            }
            OutputEvent::SendSecure { bytes } => match self.sender {
                Some(ref mut sender) => {
                    if let Err(e) = sender.send(&bytes) {
                        log::warn!("Secure send to {} failed: {}", sender.peer(), e);
                    }
                }
                None => log::warn!("No secure session; dropping {} byte reply", bytes.len()),
            },
            OutputEvent::Attach(sender) => {
                log::debug!("Output attached to session with {}", sender.peer());
                self.sender = Some(sender);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SERVER
// ═══════════════════════════════════════════════════════════════════════════

pub struct Server {
    config: Arc<ServerConfig>,
    store: Arc<Store>,
    local_addr: SocketAddr,
    input: Runloop<InputEvent>,
    output: Runloop<OutputEvent>,
    main: Runloop<MainEvent>,
    admin: Option<AdminThread>,
}

impl Server {
    /// Prepare the runtime directories, bind, and start every thread
    pub fn start(config: ServerConfig) -> Result<Self, BoxError> {
        let config = Arc::new(config);
        log::info!("Starting boxd v{}", VERSION);

        ensure_private_dir(&config.base_dir)?;
        ensure_private_dir(&config.run_dir())?;

        let store = if config.persist {
            Arc::new(Store::with_archive(QueueArchive::open(config.queues_dir())?)?)
        } else {
            Arc::new(Store::new())
        };

        let endpoint = UdpEndpoint::bind(config.listen_addr())?;
        let local_addr = endpoint.local_addr()?;
        let socket = endpoint.socket();
        let endpoint_fd = endpoint.fd();

        let mut main: Runloop<MainEvent> = Runloop::new("main");
        let mut output: Runloop<OutputEvent> = Runloop::new("net-output");
        let mut input: Runloop<InputEvent> = if config.use_reactor {
            Runloop::with_reactor("net-input")
        } else {
            Runloop::new("net-input")
        };

        let mut main_worker = MainWorker {
            machine: ServerStateMachine::new(config.clone(), store.clone()),
            output: output.handle(),
        };
        let mut output_worker = OutputWorker {
            socket,
            sender: None,
        };
        let mut input_worker = InputWorker {
            endpoint,
            transport: config.transport,
            security: config.security.clone(),
            receiver: None,
            main: main.handle(),
            output: output.handle(),
            input: input.handle(),
        };

        main.start(move |event| main_worker.handle(event))?;
        output.start(move |event| output_worker.handle(event))?;

        let reactor_ready = input.has_reactor()
            && match input.add_fd(endpoint_fd, InputEvent::Readable) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("Cannot watch UDP socket: {}; falling back to polling", e);
                    false
                }
            };
        if reactor_ready {
            log::debug!("Input driven by reactor");
        } else {
            log::debug!("Input driven by polling");
            input.post(InputEvent::DrainOne)?;
        }
        input.start(move |event| input_worker.handle(event))?;

        let main_handle = main.handle();
        let admin = AdminListener::bind(&config.admin_socket_path())
            .map_err(|e| BoxError::Fatal(format!("cannot bind admin socket: {}", e)))?
            .spawn(move |request| {
                if let Err(e) = main_handle.post(MainEvent::Admin(request)) {
                    log::warn!("Dropping admin request: {}", e);
                }
            })?;

        log::info!(
            "Listening on {} (protocol {:?}, transport {:?})",
            local_addr,
            config.protocol,
            config.transport
        );

        Ok(Server {
            config,
            store,
            local_addr,
            input,
            output,
            main,
            admin: Some(admin),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Block until a signal clears the running flag, then shut down
    pub fn run_until_stopped(self) {
        while is_running() {
            thread::sleep(SIGNAL_POLL);
        }
        log::info!("Shutdown requested");
        self.shutdown();
    }

    /// Stop admin, then input, output and main; join every thread
    pub fn shutdown(mut self) {
        if let Some(mut admin) = self.admin.take() {
            admin.shutdown();
        }
        self.input.stop();
        self.output.stop();
        self.main.stop();
        self.input.join();
        self.output.join();
        self.main.join();
        log::info!("boxd stopped");
    }
}
