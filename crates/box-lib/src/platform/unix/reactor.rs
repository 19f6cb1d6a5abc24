//! # Reactor (Unix)
//!
//! Readiness notification for runloops: epoll + eventfd on Linux/Android,
//! kqueue + self-pipe on the BSDs and Apple platforms. Elsewhere
//! `Reactor::new` reports `ReactorUnavailable` and callers fall back to
//! polling.

use std::io;
use std::os::unix::io::RawFd;

use box_protocol::RunloopError;

const MAX_EVENTS: usize = 16;

#[inline]
fn cvt(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// EPOLL
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(any(target_os = "linux", target_os = "android"))]
mod backend {
    use super::*;

    pub struct Reactor {
        epoll_fd: RawFd,
        wake_fd: RawFd,
    }

    impl Reactor {
        pub fn new() -> Result<Self, RunloopError> {
            let epoll_fd = cvt(unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) })?;
            let wake_fd = match cvt(unsafe {
                libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC)
            }) {
                Ok(fd) => fd,
                Err(e) => {
                    unsafe { libc::close(epoll_fd) };
                    return Err(e.into());
                }
            };
            let reactor = Reactor { epoll_fd, wake_fd };
            reactor.add(wake_fd)?;
            log::debug!("epoll reactor ready (epoll={}, eventfd={})", epoll_fd, wake_fd);
            Ok(reactor)
        }

        fn add(&self, fd: RawFd) -> io::Result<()> {
            let mut event = libc::epoll_event {
                events: libc::EPOLLIN as u32,
                u64: fd as u64,
            };
            cvt(unsafe { libc::epoll_ctl(self.epoll_fd, libc::EPOLL_CTL_ADD, fd, &mut event) })?;
            Ok(())
        }

        pub fn register(&self, fd: RawFd) -> Result<(), RunloopError> {
            Ok(self.add(fd)?)
        }

        pub fn wake(&self) {
            let one: u64 = 1;
            unsafe {
                libc::write(
                    self.wake_fd,
                    &one as *const u64 as *const libc::c_void,
                    std::mem::size_of::<u64>(),
                );
            }
        }

        pub fn wait(&self, timeout_ms: i32) -> Result<Vec<RawFd>, RunloopError> {
            let mut events: [libc::epoll_event; MAX_EVENTS] = unsafe { std::mem::zeroed() };
            let n = unsafe {
                libc::epoll_wait(
                    self.epoll_fd,
                    events.as_mut_ptr(),
                    MAX_EVENTS as libc::c_int,
                    timeout_ms,
                )
            };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    return Ok(Vec::new());
                }
                return Err(err.into());
            }

            let mut ready = Vec::new();
            for event in &events[..n as usize] {
                let fd = event.u64 as RawFd;
                if fd == self.wake_fd {
                    let mut counter: u64 = 0;
                    unsafe {
                        libc::read(
                            self.wake_fd,
                            &mut counter as *mut u64 as *mut libc::c_void,
                            std::mem::size_of::<u64>(),
                        );
                    }
                } else {
                    ready.push(fd);
                }
            }
            Ok(ready)
        }
    }

    impl Drop for Reactor {
        fn drop(&mut self) {
            unsafe {
                libc::close(self.wake_fd);
                libc::close(self.epoll_fd);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// KQUEUE
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
mod backend {
    use super::*;

    pub struct Reactor {
        kqueue_fd: RawFd,
        pipe_read: RawFd,
        pipe_write: RawFd,
    }

    fn set_nonblocking_cloexec(fd: RawFd) -> io::Result<()> {
        unsafe {
            let flags = cvt(libc::fcntl(fd, libc::F_GETFL))?;
            cvt(libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK))?;
            cvt(libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC))?;
        }
        Ok(())
    }

    impl Reactor {
        pub fn new() -> Result<Self, RunloopError> {
            let kqueue_fd = cvt(unsafe { libc::kqueue() })?;
            let mut fds = [0 as libc::c_int; 2];
            if let Err(e) = cvt(unsafe { libc::pipe(fds.as_mut_ptr()) }) {
                unsafe { libc::close(kqueue_fd) };
                return Err(e.into());
            }
            let reactor = Reactor {
                kqueue_fd,
                pipe_read: fds[0],
                pipe_write: fds[1],
            };
            set_nonblocking_cloexec(reactor.pipe_read)?;
            set_nonblocking_cloexec(reactor.pipe_write)?;
            reactor.add(reactor.pipe_read)?;
            log::debug!("kqueue reactor ready (kqueue={})", kqueue_fd);
            Ok(reactor)
        }

        fn add(&self, fd: RawFd) -> io::Result<()> {
            let mut change: libc::kevent = unsafe { std::mem::zeroed() };
            change.ident = fd as libc::uintptr_t;
            change.filter = libc::EVFILT_READ;
            change.flags = libc::EV_ADD | libc::EV_ENABLE;
            cvt(unsafe {
                libc::kevent(
                    self.kqueue_fd,
                    &change,
                    1,
                    std::ptr::null_mut(),
                    0,
                    std::ptr::null(),
                )
            })?;
            Ok(())
        }

        pub fn register(&self, fd: RawFd) -> Result<(), RunloopError> {
            Ok(self.add(fd)?)
        }

        pub fn wake(&self) {
            let byte = 1u8;
            unsafe {
                libc::write(self.pipe_write, &byte as *const u8 as *const libc::c_void, 1);
            }
        }

        pub fn wait(&self, timeout_ms: i32) -> Result<Vec<RawFd>, RunloopError> {
            let mut events: [libc::kevent; MAX_EVENTS] = unsafe { std::mem::zeroed() };
            let timeout = libc::timespec {
                tv_sec: (timeout_ms / 1000) as libc::time_t,
                tv_nsec: ((timeout_ms % 1000) * 1_000_000) as libc::c_long,
            };
            let timeout_ptr = if timeout_ms < 0 {
                std::ptr::null()
            } else {
                &timeout as *const libc::timespec
            };
            let n = unsafe {
                libc::kevent(
                    self.kqueue_fd,
                    std::ptr::null(),
                    0,
                    events.as_mut_ptr(),
                    MAX_EVENTS as libc::c_int,
                    timeout_ptr,
                )
            };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    return Ok(Vec::new());
                }
                return Err(err.into());
            }

            let mut ready = Vec::new();
            for event in &events[..n as usize] {
                let fd = event.ident as RawFd;
                if fd == self.pipe_read {
                    let mut sink = [0u8; 64];
                    while unsafe {
                        libc::read(
                            self.pipe_read,
                            sink.as_mut_ptr() as *mut libc::c_void,
                            sink.len(),
                        )
                    } > 0
                    {}
                } else {
                    ready.push(fd);
                }
            }
            Ok(ready)
        }
    }

    impl Drop for Reactor {
        fn drop(&mut self) {
            unsafe {
                libc::close(self.pipe_read);
                libc::close(self.pipe_write);
                libc::close(self.kqueue_fd);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// NO BACKEND
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "dragonfly"
)))]
mod backend {
    use super::*;

    pub struct Reactor {
        _private: (),
    }

    impl Reactor {
        pub fn new() -> Result<Self, RunloopError> {
            Err(RunloopError::ReactorUnavailable)
        }

        pub fn register(&self, _fd: RawFd) -> Result<(), RunloopError> {
            Err(RunloopError::ReactorUnavailable)
        }

        pub fn wake(&self) {}

        pub fn wait(&self, _timeout_ms: i32) -> Result<Vec<RawFd>, RunloopError> {
            Err(RunloopError::ReactorUnavailable)
        }
    }
}

pub use backend::Reactor;
