use std::{
    io,
    net::SocketAddr,
    sync::mpsc::{self, RecvTimeoutError},
    thread,
    time::Duration,
};

use log::{debug, warn};

/// Dedicated thread serving one session, and the means to wait for it.
#[derive(Debug)]
pub(crate) struct SessionThread {
    peer: SocketAddr,
    thread: thread::JoinHandle<()>,
    done: mpsc::Receiver<()>,
}

/// Signals completion when dropped, so a panicking session still reports in.
struct Done(mpsc::Sender<()>);

impl Drop for Done {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

impl SessionThread {
    pub fn spawn<F>(peer: SocketAddr, f: F) -> io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let (sender, done) = mpsc::channel();
        let thread = thread::Builder::new()
            .name(format!("session-{peer}"))
            .spawn(move || {
                let _done = Done(sender);
                f();
            })?;

        Ok(Self { peer, thread, done })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Waits for the session to end; `None` waits indefinitely.
    ///
    /// Returns `false` if the timeout elapsed first, leaving the thread
    /// detached.
    pub fn join(self, timeout: Option<Duration>) -> bool {
        if let Some(timeout) = timeout {
            match self.done.recv_timeout(timeout) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
                Err(RecvTimeoutError::Timeout) => {
                    debug!("session {} still running after {timeout:?}", self.peer);
                    return false;
                }
            }
        }

        if self.thread.join().is_err() {
            warn!("session {} panicked", self.peer);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};

    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:9".parse().unwrap()
    }

    #[test]
    fn join_waits_for_thread() {
        let session = SessionThread::spawn(peer(), || thread::sleep(Duration::from_millis(20)))
            .unwrap();
        assert!(session.join(None));
    }

    #[test]
    fn join_times_out() {
        let barrier = Arc::new(Barrier::new(2));
        let handle = Arc::clone(&barrier);
        let session = SessionThread::spawn(peer(), move || {
            handle.wait();
        })
        .unwrap();

        assert!(!session.join(Some(Duration::from_millis(10))));
        barrier.wait();
    }

    #[test]
    fn panicking_session_reports_done() {
        let session = SessionThread::spawn(peer(), || panic!("boom")).unwrap();
        assert!(session.join(Some(Duration::from_secs(5))));
    }
}
