//! End-to-end exchanges with a live server over loopback.

#![cfg(unix)]

use std::io::{Read, Write};
use std::net::{SocketAddr, UdpSocket};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use box_core::{ClientConfig, CommandTransports, SecurityConfig, ServerConfig, TransportMode};
use box_lib::{Client, Reply, Server, TransportSession, VERSION};
use box_protocol::{Command, PutPayload, StatusCode, StatusPayload, V1Frame};

fn start_server(base: &Path, configure: impl FnOnce(&mut ServerConfig)) -> Server {
    let mut config = ServerConfig::new(base.join(".box"));
    config.bind_addr = "127.0.0.1".parse().unwrap();
    config.port = 0;
    configure(&mut config);
    Server::start(config).unwrap()
}

fn raw_socket() -> UdpSocket {
    let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
    sock.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    sock
}

fn roundtrip(sock: &UdpSocket, server: SocketAddr, bytes: &[u8]) -> Vec<u8> {
    sock.send_to(bytes, server).unwrap();
    let mut buf = vec![0u8; 65536];
    let (len, from) = sock.recv_from(&mut buf).unwrap();
    assert_eq!(from, server);
    buf.truncate(len);
    buf
}

fn exchange(sock: &UdpSocket, server: SocketAddr, frame: V1Frame) -> V1Frame {
    V1Frame::unpack(&roundtrip(sock, server, &frame.pack().unwrap())).unwrap()
}

fn client_for(server: &Server) -> ClientConfig {
    let mut config = ClientConfig::new("127.0.0.1", server.local_addr().port());
    config.timeout = Duration::from_secs(2);
    config
}

#[test]
fn test_handshake_and_commands() {
    let dir = tempfile::tempdir().unwrap();
    let server = start_server(dir.path(), |_| {});
    let addr = server.local_addr();
    let sock = raw_socket();

    // probe
    let reply = roundtrip(&sock, addr, b"hello");
    assert_eq!(
        reply,
        [
            0x42, 0x01, 0x00, 0x00, 0x00, 0x14, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x01
        ]
    );

    // HELLO echo
    let reply = exchange(&sock, addr, V1Frame::hello(10, StatusCode::Ok, &[1]).unwrap());
    assert_eq!(reply.command, Command::Hello);
    assert_eq!(reply.request_id, 11);

    // PUT then GET
    let reply = exchange(&sock, addr, V1Frame::put(20, "q1", "text/plain", b"abc").unwrap());
    assert_eq!(reply.request_id, 21);
    let status: StatusPayload = reply.decode().unwrap();
    assert_eq!(status.status, StatusCode::Ok);
    assert_eq!(status.message, "stored");

    let reply = exchange(&sock, addr, V1Frame::get(22, "q1").unwrap());
    assert_eq!(reply.command, Command::Put);
    assert_eq!(reply.request_id, 23);
    let put: PutPayload = reply.decode().unwrap();
    assert_eq!(put.queue, "q1");
    assert_eq!(put.content_type, "text/plain");
    assert_eq!(put.data, b"abc");

    // unknown command
    let reply = exchange(&sock, addr, V1Frame::new(Command::from_u32(999), 30, vec![]));
    assert_eq!(reply.request_id, 31);
    let status: StatusPayload = reply.decode().unwrap();
    assert_eq!(status.status.as_u8(), 5);
    assert_eq!(status.message, "unknown-command");

    server.shutdown();
}

#[test]
fn test_admin_status() {
    let dir = tempfile::tempdir().unwrap();
    let server = start_server(dir.path(), |_| {});
    let socket_path = server.config().admin_socket_path();
    assert!(socket_path.exists());

    let mut stream = UnixStream::connect(&socket_path).unwrap();
    stream.write_all(b"status\n").unwrap();
    let mut reply = String::new();
    stream.read_to_string(&mut reply).unwrap();
    assert_eq!(reply, format!("{{\"status\":\"ok\",\"version\":\"{}\"}}\n", VERSION));

    let mut stream = UnixStream::connect(&socket_path).unwrap();
    stream.write_all(b"restart\n").unwrap();
    let mut reply = String::new();
    stream.read_to_string(&mut reply).unwrap();
    assert_eq!(reply, "unknown-command\n");

    server.shutdown();
    assert!(!socket_path.exists());
}

#[test]
fn test_client_clear_session() {
    let dir = tempfile::tempdir().unwrap();
    let server = start_server(dir.path(), |_| {});
    let mut client = Client::connect(client_for(&server)).unwrap();

    let hello = client.probe().unwrap();
    assert_eq!(hello.versions, vec![1]);
    assert!(client.hello().unwrap().is_ok());

    match client.ping().unwrap() {
        Reply::Status(status) => assert_eq!(status.message, "pong"),
        other => panic!("unexpected {:?}", other),
    }

    assert!(client.put("jobs", "application/json", b"{}").unwrap().is_ok());
    match client.get("jobs").unwrap() {
        Reply::Object(object) => assert_eq!(object.data, b"{}"),
        other => panic!("unexpected {:?}", other),
    }
    assert!(client.delete("jobs").unwrap().is_ok());
    let missing = client.get("jobs").unwrap();
    assert_eq!(missing.status(), StatusCode::BadRequest);

    client.close();
    server.shutdown();
}

#[test]
fn test_client_noise_session() {
    let dir = tempfile::tempdir().unwrap();
    let security = SecurityConfig::default().with_pre_shared_key(b"psk123");
    let server_security = security.clone();
    let server = start_server(dir.path(), move |config| {
        config.transport = TransportMode::Noise;
        config.security = server_security;
    });

    let mut config = client_for(&server);
    config.transport = TransportMode::Noise;
    config.security = security;
    let mut client = Client::connect(config).unwrap();

    client.probe().unwrap();
    client.establish_session().unwrap();
    assert!(client.has_session());

    match client.ping().unwrap() {
        Reply::Status(status) => assert_eq!(status.message, "pong"),
        other => panic!("unexpected {:?}", other),
    }
    assert!(client.put("secret", "text/plain", b"hidden").unwrap().is_ok());
    match client.get("secret").unwrap() {
        Reply::Object(object) => assert_eq!(object.data, b"hidden"),
        other => panic!("unexpected {:?}", other),
    }

    server.shutdown();
}

#[test]
fn test_replayed_secure_datagram_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let security = SecurityConfig::default().with_pre_shared_key(b"psk123");
    let server_security = security.clone();
    let server = start_server(dir.path(), move |config| {
        config.transport = TransportMode::Noise;
        config.security = server_security;
    });
    let addr = server.local_addr();
    let sock = Arc::new(raw_socket());

    let hello = V1Frame::unpack(&roundtrip(&sock, addr, b"hello")).unwrap();
    assert_eq!(hello.command, Command::Hello);

    let mut session = TransportSession::new(sock.clone(), addr, &security).unwrap();
    let ping = V1Frame::new(Command::Status, 4, vec![]).pack().unwrap();
    let sealed = session.seal(&ping).unwrap();

    let reply = V1Frame::unpack(&session.open(&roundtrip(&sock, addr, &sealed)).unwrap()).unwrap();
    assert_eq!(reply.request_id, 5);
    let status: StatusPayload = reply.decode().unwrap();
    assert_eq!(status.message, "pong");

    // same counter again: no reply
    sock.set_read_timeout(Some(Duration::from_millis(300))).unwrap();
    sock.send_to(&sealed, addr).unwrap();
    let mut buf = vec![0u8; 2048];
    let err = sock.recv_from(&mut buf).unwrap_err();
    assert!(matches!(
        err.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    ));

    // the session is still usable afterwards
    sock.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let ping = V1Frame::new(Command::Status, 6, vec![]).pack().unwrap();
    let sealed = session.seal(&ping).unwrap();
    let reply = V1Frame::unpack(&session.open(&roundtrip(&sock, addr, &sealed)).unwrap()).unwrap();
    assert_eq!(reply.request_id, 7);

    server.shutdown();
}

#[test]
fn test_clear_put_refused_when_noise_required() {
    let dir = tempfile::tempdir().unwrap();
    let server = start_server(dir.path(), |config| {
        config.command_transports = CommandTransports {
            put: Some(TransportMode::Noise),
            ..Default::default()
        };
    });
    let mut client = Client::connect(client_for(&server)).unwrap();
    client.probe().unwrap();

    match client.put("q", "text/plain", b"x").unwrap() {
        Reply::Status(status) => {
            assert_eq!(status.status, StatusCode::Forbidden);
            assert_eq!(status.message, "secure-transport-required");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(server.store().is_empty());

    server.shutdown();
}

#[test]
fn test_polling_input() {
    let dir = tempfile::tempdir().unwrap();
    let server = start_server(dir.path(), |config| config.use_reactor = false);
    let sock = raw_socket();
    let addr = server.local_addr();

    let reply = V1Frame::unpack(&roundtrip(&sock, addr, b"hello")).unwrap();
    assert_eq!(reply.command, Command::Hello);
    let reply = exchange(&sock, addr, V1Frame::new(Command::Status, 4, vec![]));
    let status: StatusPayload = reply.decode().unwrap();
    assert_eq!(status.message, "pong");

    server.shutdown();
}

#[test]
fn test_queues_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let server = start_server(dir.path(), |_| {});
    let mut client = Client::connect(client_for(&server)).unwrap();
    client.probe().unwrap();
    assert!(client.put("orders", "text/csv", b"a,b").unwrap().is_ok());
    server.shutdown();

    assert!(dir.path().join(".box/queues/orders/latest.id").exists());

    let server = start_server(dir.path(), |_| {});
    let mut client = Client::connect(client_for(&server)).unwrap();
    client.probe().unwrap();
    match client.get("orders").unwrap() {
        Reply::Object(object) => {
            assert_eq!(object.content_type, "text/csv");
            assert_eq!(object.data, b"a,b");
        }
        other => panic!("unexpected {:?}", other),
    }
    server.shutdown();
}
