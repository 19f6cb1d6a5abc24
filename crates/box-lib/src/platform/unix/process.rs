//! # Process Helpers (Unix)
//!
//! Signal-driven shutdown flag, root refusal, and private runtime
//! directories.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use box_protocol::BoxError;

static RUNNING: AtomicBool = AtomicBool::new(true);
static LAST_SIGNAL: AtomicI32 = AtomicI32::new(0);

/// Route SIGINT and SIGTERM to the shutdown flag
pub fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGINT, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGTERM, signal_handler as libc::sighandler_t);
    }
}

extern "C" fn signal_handler(signal: libc::c_int) {
    LAST_SIGNAL.store(signal, Ordering::SeqCst);
    RUNNING.store(false, Ordering::SeqCst);
}

#[inline]
pub fn is_running() -> bool {
    RUNNING.load(Ordering::SeqCst)
}

/// Clear the flag as a signal would
pub fn request_shutdown() {
    RUNNING.store(false, Ordering::SeqCst);
}

/// Signal that cleared the flag, if any
pub fn received_signal() -> Option<i32> {
    match LAST_SIGNAL.load(Ordering::SeqCst) {
        0 => None,
        signal => Some(signal),
    }
}

/// Effective uid is 0
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

pub fn refuse_root() -> Result<(), BoxError> {
    if is_root() {
        return Err(BoxError::Fatal("refusing to run as root".to_string()));
    }
    Ok(())
}

/// Create `path` (and parents) and restrict it to the owner
pub fn ensure_private_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
}

/// Restrict a file to owner read/write
pub fn restrict_file(path: &Path) -> io::Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}
