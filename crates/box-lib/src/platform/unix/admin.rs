//! # Admin Channel (Unix)
//!
//! Local stream socket answering one request line per connection. The
//! listener only reads; requests are handed to a callback (the server posts
//! them to its main runloop) and the reply is written from there.

use serde::Serialize;
use std::fs;
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use box_protocol::ADMIN_MAX_REQUEST;

use super::network::poll_readable;
use super::process::restrict_file;

/// Accept loop wakes this often to check for shutdown
const ACCEPT_POLL_MS: i32 = 200;
const CLIENT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Reply body for `status`
#[derive(Debug, Serialize)]
pub struct AdminStatus<'a> {
    pub status: &'a str,
    pub version: &'a str,
}

/// Full reply line for a request line
pub fn admin_reply(line: &str, version: &str) -> String {
    match line.trim() {
        "status" => {
            let body = AdminStatus {
                status: "ok",
                version,
            };
            match serde_json::to_string(&body) {
                Ok(json) => json + "\n",
                Err(e) => {
                    log::error!("Failed to encode admin status: {}", e);
                    "unknown-command\n".to_string()
                }
            }
        }
        _ => "unknown-command\n".to_string(),
    }
}

/// One connected admin client and the line it sent
#[derive(Debug)]
pub struct AdminRequest {
    pub line: String,
    stream: UnixStream,
}

impl AdminRequest {
    /// Write `body` and close the connection
    pub fn reply(mut self, body: &str) -> io::Result<()> {
        self.stream.write_all(body.as_bytes())?;
        self.stream.flush()?;
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
        Ok(())
    }
}

/// Read at most `ADMIN_MAX_REQUEST` bytes, stopping at a newline
fn read_request_line(stream: &mut UnixStream) -> io::Result<String> {
    let mut buf = Vec::with_capacity(ADMIN_MAX_REQUEST);
    let mut chunk = [0u8; ADMIN_MAX_REQUEST];
    while buf.len() < ADMIN_MAX_REQUEST {
        let want = ADMIN_MAX_REQUEST - buf.len();
        let n = match stream.read(&mut chunk[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            buf.truncate(pos);
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buf).trim_end_matches('\r').to_string())
}

pub struct AdminListener {
    listener: UnixListener,
    path: PathBuf,
}

impl AdminListener {
    /// Bind at `path` (replacing a stale socket) with mode 0600
    pub fn bind(path: &Path) -> io::Result<Self> {
        if path.exists() {
            log::debug!("Removing stale admin socket {}", path.display());
            fs::remove_file(path)?;
        }
        let listener = UnixListener::bind(path)?;
        restrict_file(path)?;
        listener.set_nonblocking(true)?;
        log::info!("Admin socket listening on {}", path.display());
        Ok(AdminListener {
            listener,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serve on a dedicated thread until the returned handle is shut down
    pub fn spawn<F>(self, mut on_request: F) -> io::Result<AdminThread>
    where
        F: FnMut(AdminRequest) + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();
        let path = self.path.clone();
        let handle = thread::Builder::new()
            .name("admin".to_string())
            .spawn(move || self.serve(&flag, &mut on_request))?;
        Ok(AdminThread {
            shutdown,
            handle: Some(handle),
            path,
        })
    }

    fn serve<F: FnMut(AdminRequest)>(self, shutdown: &AtomicBool, on_request: &mut F) {
        let fd = self.listener.as_raw_fd();
        while !shutdown.load(Ordering::SeqCst) {
            match poll_readable(fd, ACCEPT_POLL_MS) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => {
                    log::warn!("Admin poll failed: {}", e);
                    continue;
                }
            }
            let mut stream = match self.listener.accept() {
                Ok((stream, _)) => stream,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => {
                    log::warn!("Admin accept failed: {}", e);
                    continue;
                }
            };
            if let Err(e) = stream
                .set_nonblocking(false)
                .and_then(|_| stream.set_read_timeout(Some(CLIENT_READ_TIMEOUT)))
            {
                log::warn!("Admin client setup failed: {}", e);
                continue;
            }
            match read_request_line(&mut stream) {
                Ok(line) => {
                    log::debug!("Admin request: {:?}", line);
                    on_request(AdminRequest { line, stream });
                }
                Err(e) => log::warn!("Admin read failed: {}", e),
            }
        }
        log::debug!("Admin listener stopped");
    }
}

/// Running admin listener
pub struct AdminThread {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    path: PathBuf,
}

impl AdminThread {
    /// Stop accepting, join the thread and remove the socket file
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Admin thread panicked");
            }
            if let Err(e) = fs::remove_file(&self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    log::warn!("Failed to remove {}: {}", self.path.display(), e);
                }
            }
        }
    }
}

impl Drop for AdminThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_admin_reply() {
        assert_eq!(
            admin_reply("status", "1.2.3"),
            "{\"status\":\"ok\",\"version\":\"1.2.3\"}\n"
        );
        assert_eq!(admin_reply(" status ", "1"), "{\"status\":\"ok\",\"version\":\"1\"}\n");
        assert_eq!(admin_reply("reboot", "1"), "unknown-command\n");
        assert_eq!(admin_reply("", "1"), "unknown-command\n");
    }

    #[test]
    fn test_listener_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin.socket");
        let listener = AdminListener::bind(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        let mut admin = listener
            .spawn(|req: AdminRequest| {
                let body = admin_reply(&req.line, "test");
                req.reply(&body).unwrap();
            })
            .unwrap();

        let mut client = UnixStream::connect(&path).unwrap();
        client.write_all(b"status\n").unwrap();
        let mut reply = String::new();
        client.read_to_string(&mut reply).unwrap();
        assert_eq!(reply, "{\"status\":\"ok\",\"version\":\"test\"}\n");

        admin.shutdown();
        assert!(!path.exists());
    }

    #[test]
    fn test_request_line_is_capped() {
        let (mut a, mut b) = UnixStream::pair().unwrap();
        a.write_all(&[b'x'; 300]).unwrap();
        let line = read_request_line(&mut b).unwrap();
        assert_eq!(line.len(), ADMIN_MAX_REQUEST);
    }
}
