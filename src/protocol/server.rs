use std::{
    net::{SocketAddr, TcpListener},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use log::{info, warn};
use socket2::{Domain, Protocol, Socket, Type};

use super::{
    dispatch::Handler, session::Session, thread::SessionThread, transport::TransportError,
};

/// Pause after a failed accept, so a persistent failure (out of file
/// descriptors) does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Pending connections the socket queues before refusing more.
    pub backlog: i32,
    /// Wait for running sessions once the accept loop ends.
    pub verify_join: bool,
    /// Bound on that wait; `None` waits indefinitely.
    pub join_timeout: Option<Duration>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            backlog: 5,
            verify_join: true,
            join_timeout: None,
        }
    }
}

/// Ends a listener's accept loop from another thread.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// The loop exits once the accept in progress returns; a connection
    /// accepted after this call is dropped unserved.
    pub fn stop_listening(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_listening(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Accepts connections and serves each on its own thread.
pub struct Listener {
    listener: TcpListener,
    address: SocketAddr,
    keep_listening: Arc<AtomicBool>,
    config: ListenerConfig,
    sessions: Vec<SessionThread>,
}

impl Listener {
    pub fn bind(address: SocketAddr, config: ListenerConfig) -> Result<Self, TransportError> {
        let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&address.into())?;
        socket.listen(config.backlog.max(0))?;

        let listener: TcpListener = socket.into();
        let address = listener.local_addr()?;

        Ok(Self {
            listener,
            address,
            keep_listening: Arc::new(AtomicBool::new(true)),
            config,
            sessions: Vec::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.address
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.keep_listening))
    }

    pub fn stop_listening(&self) {
        self.stop_handle().stop_listening();
    }

    /// Runs the accept loop until stopped, then joins outstanding sessions if
    /// configured to.
    pub fn listen<H: Handler>(mut self, handler: Arc<H>) -> Result<(), TransportError> {
        info!("listening at {}", self.address);

        while self.keep_listening.load(Ordering::SeqCst) {
            let (stream, peer) = match self.listener.accept() {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("broken connection: {e:?}");
                    thread::sleep(ACCEPT_BACKOFF);
                    continue;
                }
            };
            if !self.keep_listening.load(Ordering::SeqCst) {
                break;
            }
            self.sessions.retain(|s| !s.is_finished());

            let session = match Session::accept(stream, peer) {
                Ok(session) => session,
                Err(e) => {
                    warn!("connection to client @ {peer} failed: {e}");
                    continue;
                }
            };
            info!("connected to client @ {peer}");

            let handler = Arc::clone(&handler);
            match SessionThread::spawn(peer, move || {
                session.serve(handler.as_ref());
            }) {
                Ok(thread) => self.sessions.push(thread),
                Err(e) => warn!("failed to start session for {peer}: {e}"),
            }
        }
        info!("stopped listening at {}", self.address);

        if self.config.verify_join {
            let running = self.join(self.config.join_timeout);
            if running > 0 {
                warn!("{running} sessions still running after join timeout");
            }
        }
        Ok(())
    }

    /// Waits for every session, sharing one deadline. Returns how many were
    /// still running when it passed.
    fn join(&mut self, timeout: Option<Duration>) -> usize {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut running = 0;

        for session in self.sessions.drain(..) {
            let peer = session.peer();
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            if session.join(remaining) {
                info!("session for {peer} joined");
            } else {
                running += 1;
            }
        }

        running
    }
}
