//! # Runloop
//!
//! Bounded FIFO of typed events drained by a single consumer.
//!
//! - `post` fails when the queue is full or a stop has been requested; the
//!   rejected event is handed back.
//! - `stop` always enqueues, evicting the oldest event when full. Events
//!   ahead of it are still handled; afterwards the consumer exits.
//! - `hard_stop` drops everything queued and exits at once.
//! - With a reactor, registered descriptors post a copy of their template
//!   event when readable. Posting wakes the reactor so queued work and
//!   descriptor readiness interleave.
//!
//! Payloads are owned by the queue until handled; anything left over is
//! dropped exactly once.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::os::unix::io::RawFd;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use box_protocol::{BoxError, RunloopError, RUNLOOP_CAPACITY};

use crate::platform::Reactor;

/// Consumer lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    /// A stop marker was consumed; remaining events are being handled
    Draining,
    Stopped,
}

/// An event the runloop refused, returned to the caller
pub struct PostError<E> {
    pub reason: RunloopError,
    pub event: E,
}

impl<E> PostError<E> {
    pub fn into_event(self) -> E {
        self.event
    }
}

impl<E> fmt::Debug for PostError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostError")
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

impl<E> fmt::Display for PostError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "post rejected: {}", self.reason)
    }
}

impl<E> From<PostError<E>> for RunloopError {
    fn from(e: PostError<E>) -> Self {
        e.reason
    }
}

impl<E> From<PostError<E>> for BoxError {
    fn from(e: PostError<E>) -> Self {
        BoxError::Runloop(e.reason)
    }
}

enum Item<E> {
    Event(E),
    Stop,
}

type Template<E> = Box<dyn Fn() -> E + Send>;

struct State<E> {
    queue: VecDeque<Item<E>>,
    phase: Phase,
    stop_queued: bool,
    sources: Vec<(RawFd, Template<E>)>,
}

struct Shared<E> {
    name: String,
    capacity: usize,
    state: Mutex<State<E>>,
    ready: Condvar,
    reactor: Option<Reactor>,
}

enum Next<E> {
    Item(Item<E>),
    WaitReactor,
    Exit,
}

impl<E: Send + 'static> Shared<E> {
    fn wake(&self) {
        self.ready.notify_all();
        if let Some(ref reactor) = self.reactor {
            reactor.wake();
        }
    }

    fn post(&self, event: E) -> Result<(), PostError<E>> {
        {
            let mut state = self.state.lock();
            if state.stop_queued || state.phase != Phase::Running {
                return Err(PostError {
                    reason: RunloopError::Stopped,
                    event,
                });
            }
            if state.queue.len() >= self.capacity {
                return Err(PostError {
                    reason: RunloopError::QueueFull,
                    event,
                });
            }
            state.queue.push_back(Item::Event(event));
        }
        self.wake();
        Ok(())
    }

    fn stop(&self) {
        let evicted = {
            let mut state = self.state.lock();
            if state.stop_queued || state.phase == Phase::Stopped {
                return;
            }
            let evicted = if state.queue.len() >= self.capacity {
                state.queue.pop_front()
            } else {
                None
            };
            state.queue.push_back(Item::Stop);
            state.stop_queued = true;
            evicted
        };
        if evicted.is_some() {
            log::warn!("{}: queue full, dropped oldest event to enqueue stop", self.name);
        }
        drop(evicted);
        self.wake();
    }

    fn hard_stop(&self) {
        let discarded = {
            let mut state = self.state.lock();
            state.phase = Phase::Stopped;
            state.stop_queued = true;
            std::mem::take(&mut state.queue)
        };
        if !discarded.is_empty() {
            log::debug!("{}: hard stop discarded {} event(s)", self.name, discarded.len());
        }
        drop(discarded);
        self.wake();
    }

    fn next(&self) -> Next<E> {
        let mut state = self.state.lock();
        loop {
            if state.phase == Phase::Stopped {
                return Next::Exit;
            }
            if let Some(item) = state.queue.pop_front() {
                return Next::Item(item);
            }
            if state.phase == Phase::Draining {
                state.phase = Phase::Stopped;
                return Next::Exit;
            }
            if self.reactor.is_some() && !state.sources.is_empty() {
                return Next::WaitReactor;
            }
            self.ready.wait(&mut state);
        }
    }

    fn poll_reactor(&self, reactor: &Reactor) {
        let ready = match reactor.wait(-1) {
            Ok(ready) => ready,
            Err(e) => {
                log::warn!("{}: reactor wait failed: {}", self.name, e);
                thread::sleep(std::time::Duration::from_millis(10));
                return;
            }
        };
        if ready.is_empty() {
            return;
        }

        let mut state = self.state.lock();
        if state.stop_queued {
            return;
        }
        for fd in ready {
            let event = match state.sources.iter().find(|(src, _)| *src == fd) {
                Some((_, template)) => template(),
                None => continue,
            };
            if state.queue.len() >= self.capacity {
                log::warn!("{}: queue full, readiness on fd {} dropped", self.name, fd);
                continue;
            }
            state.queue.push_back(Item::Event(event));
        }
    }

    fn run<H: FnMut(E)>(&self, handler: &mut H) {
        log::debug!("{}: consumer started", self.name);
        loop {
            match self.next() {
                Next::Item(Item::Event(event)) => handler(event),
                Next::Item(Item::Stop) => {
                    let mut state = self.state.lock();
                    if state.phase == Phase::Running {
                        state.phase = Phase::Draining;
                    }
                    log::debug!("{}: stop received, draining", self.name);
                }
                Next::WaitReactor => {
                    if let Some(ref reactor) = self.reactor {
                        self.poll_reactor(reactor);
                    }
                }
                Next::Exit => break,
            }
        }
        log::debug!("{}: consumer exited", self.name);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PUBLIC API
// ═══════════════════════════════════════════════════════════════════════════

/// Cloneable posting handle
pub struct RunloopHandle<E> {
    shared: Arc<Shared<E>>,
}

impl<E> Clone for RunloopHandle<E> {
    fn clone(&self) -> Self {
        RunloopHandle {
            shared: self.shared.clone(),
        }
    }
}

impl<E: Send + 'static> RunloopHandle<E> {
    pub fn post(&self, event: E) -> Result<(), PostError<E>> {
        self.shared.post(event)
    }

    pub fn stop(&self) {
        self.shared.stop()
    }

    pub fn hard_stop(&self) {
        self.shared.hard_stop()
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }
}

pub struct Runloop<E: Send + 'static> {
    shared: Arc<Shared<E>>,
    thread: Option<JoinHandle<()>>,
}

impl<E: Send + 'static> Runloop<E> {
    /// Runloop without a reactor
    pub fn new(name: &str) -> Self {
        Self::build(name, RUNLOOP_CAPACITY, None)
    }

    /// Runloop with a reactor if the platform has one
    pub fn with_reactor(name: &str) -> Self {
        let reactor = match Reactor::new() {
            Ok(reactor) => Some(reactor),
            Err(e) => {
                log::info!("{}: no reactor ({}), using polling", name, e);
                None
            }
        };
        Self::build(name, RUNLOOP_CAPACITY, reactor)
    }

    pub fn with_capacity(name: &str, capacity: usize) -> Self {
        Self::build(name, capacity.max(1), None)
    }

    fn build(name: &str, capacity: usize, reactor: Option<Reactor>) -> Self {
        Runloop {
            shared: Arc::new(Shared {
                name: name.to_string(),
                capacity,
                state: Mutex::new(State {
                    queue: VecDeque::with_capacity(capacity.min(RUNLOOP_CAPACITY)),
                    phase: Phase::Running,
                    stop_queued: false,
                    sources: Vec::new(),
                }),
                ready: Condvar::new(),
                reactor,
            }),
            thread: None,
        }
    }

    pub fn handle(&self) -> RunloopHandle<E> {
        RunloopHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn has_reactor(&self) -> bool {
        self.shared.reactor.is_some()
    }

    pub fn phase(&self) -> Phase {
        self.shared.state.lock().phase
    }

    /// Events waiting to be handled
    pub fn pending(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    pub fn post(&self, event: E) -> Result<(), PostError<E>> {
        self.shared.post(event)
    }

    pub fn stop(&self) {
        self.shared.stop()
    }

    pub fn hard_stop(&self) {
        self.shared.hard_stop()
    }

    /// Post a copy of `template` whenever `fd` becomes readable
    pub fn add_fd(&self, fd: RawFd, template: E) -> Result<(), RunloopError>
    where
        E: Clone,
    {
        let reactor = self
            .shared
            .reactor
            .as_ref()
            .ok_or(RunloopError::ReactorUnavailable)?;
        reactor.register(fd)?;
        self.shared
            .state
            .lock()
            .sources
            .push((fd, Box::new(move || template.clone())));
        self.shared.wake();
        log::debug!("{}: watching fd {}", self.shared.name, fd);
        Ok(())
    }

    /// Consume on the calling thread until stopped
    pub fn run<H: FnMut(E)>(&self, mut handler: H) {
        self.shared.run(&mut handler);
    }

    /// Consume on a dedicated thread
    pub fn start<H>(&mut self, mut handler: H) -> io::Result<()>
    where
        H: FnMut(E) + Send + 'static,
    {
        let shared = self.shared.clone();
        let handle = thread::Builder::new()
            .name(self.shared.name.clone())
            .spawn(move || shared.run(&mut handler))?;
        self.thread = Some(handle);
        Ok(())
    }

    /// Wait for the consumer thread started by `start`
    pub fn join(&mut self) {
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                log::error!("{}: consumer thread panicked", self.shared.name);
            }
        }
    }
}

impl<E: Send + 'static> Drop for Runloop<E> {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.hard_stop();
            self.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    struct Payload {
        id: usize,
        drops: Arc<AtomicUsize>,
    }

    impl Drop for Payload {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_fifo_then_stop() {
        let runloop = Runloop::new("test");
        for i in 0..10 {
            runloop.post(i).unwrap();
        }
        runloop.stop();
        let mut seen = Vec::new();
        runloop.run(|e| seen.push(e));
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        assert_eq!(runloop.phase(), Phase::Stopped);
    }

    #[test]
    fn test_post_after_stop_rejected() {
        let runloop = Runloop::new("test");
        runloop.stop();
        let err = runloop.post(5).unwrap_err();
        assert!(matches!(err.reason, RunloopError::Stopped));
        assert_eq!(err.into_event(), 5);
    }

    #[test]
    fn test_queue_full() {
        let runloop = Runloop::with_capacity("test", 2);
        runloop.post(1).unwrap();
        runloop.post(2).unwrap();
        assert!(matches!(
            runloop.post(3).unwrap_err().reason,
            RunloopError::QueueFull
        ));
    }

    #[test]
    fn test_stop_evicts_oldest_when_full() {
        let drops = Arc::new(AtomicUsize::new(0));
        let runloop = Runloop::with_capacity("test", 2);
        for id in 0..2 {
            runloop
                .post(Payload {
                    id,
                    drops: drops.clone(),
                })
                .unwrap();
        }
        runloop.stop();
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        let mut handled = Vec::new();
        runloop.run(|p| handled.push(p.id));
        assert_eq!(handled, vec![1]);
        assert_eq!(drops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let runloop = Runloop::new("test");
        runloop.post(1).unwrap();
        runloop.stop();
        runloop.stop();
        runloop.stop();
        assert_eq!(runloop.pending(), 2);
        let mut count = 0;
        runloop.run(|_| count += 1);
        assert_eq!(count, 1);
    }

    #[test]
    fn test_hard_stop_drops_everything() {
        let drops = Arc::new(AtomicUsize::new(0));
        let runloop = Runloop::new("test");
        for id in 0..5 {
            runloop
                .post(Payload {
                    id,
                    drops: drops.clone(),
                })
                .unwrap();
        }
        runloop.hard_stop();
        assert_eq!(drops.load(Ordering::SeqCst), 5);
        let mut handled = 0;
        runloop.run(|_| handled += 1);
        assert_eq!(handled, 0);
    }

    #[test]
    fn test_threaded_consumer() {
        let (tx, rx) = mpsc::channel();
        let mut runloop = Runloop::new("worker");
        runloop.start(move |e: u32| tx.send(e).unwrap()).unwrap();
        let handle = runloop.handle();
        let producer = thread::spawn(move || {
            for i in 0..100 {
                handle.post(i).unwrap();
            }
        });
        producer.join().unwrap();
        runloop.stop();
        runloop.join();
        let got: Vec<u32> = rx.try_iter().collect();
        assert_eq!(got, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_add_fd_without_reactor() {
        let runloop: Runloop<u8> = Runloop::new("plain");
        assert!(matches!(
            runloop.add_fd(0, 1),
            Err(RunloopError::ReactorUnavailable)
        ));
    }

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    #[test]
    fn test_reactor_posts_template() {
        use std::net::UdpSocket;
        use std::os::unix::io::AsRawFd;

        #[derive(Clone, Debug, PartialEq)]
        enum Ev {
            Readable,
            Other(u8),
        }

        let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        sock.set_nonblocking(true).unwrap();
        let addr = sock.local_addr().unwrap();

        let mut runloop = Runloop::with_reactor("input");
        assert!(runloop.has_reactor());
        runloop.add_fd(sock.as_raw_fd(), Ev::Readable).unwrap();

        let (tx, rx) = mpsc::channel();
        let mut buf = [0u8; 64];
        runloop
            .start(move |e: Ev| {
                if e == Ev::Readable {
                    while let Ok((n, _)) = sock.recv_from(&mut buf) {
                        tx.send(Ev::Other(buf[n - 1])).unwrap();
                    }
                } else {
                    tx.send(e).unwrap();
                }
            })
            .unwrap();

        runloop.post(Ev::Other(7)).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), Ev::Other(7));

        let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
        peer.send_to(&[9], addr).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), Ev::Other(9));

        runloop.stop();
        runloop.join();
        assert_eq!(runloop.phase(), Phase::Stopped);
    }
}
