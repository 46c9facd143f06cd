use std::net::{Shutdown, SocketAddr, TcpStream};

use log::{debug, info, warn};
use thiserror::Error;

use super::{
    READY, Reply,
    dispatch::Handler,
    request::{CommandTag, Request},
    response::{ErrorCode, ErrorEnvelope},
    transport::{FramedTransport, TransportError},
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("unrecognized command tag '{0}'")]
    ProtocolViolation(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Handshaking,
    Serving,
    Closed,
}

/// Server side of one accepted connection.
pub struct Session {
    peer: SocketAddr,
    transport: FramedTransport<TcpStream>,
    state: SessionState,
}

impl Session {
    /// Greets a freshly accepted client with [`READY`].
    pub fn accept(stream: TcpStream, peer: SocketAddr) -> Result<Self, SessionError> {
        let mut session = Self {
            peer,
            transport: FramedTransport::new(stream),
            state: SessionState::Connecting,
        };

        session.state = SessionState::Handshaking;
        if let Err(e) = session.transport.send_text(READY) {
            session.close();
            return Err(e.into());
        }
        session.state = SessionState::Serving;

        Ok(session)
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Serves requests until the connection fails or the client breaks the
    /// protocol. Returns what ended the session.
    pub fn serve<H: Handler + ?Sized>(mut self, handler: &H) -> SessionError {
        let reason = loop {
            if let Err(e) = self.serve_one(handler) {
                break e;
            }
        };

        match &reason {
            SessionError::Transport(e) if e.is_disconnect() => {
                info!("client @ {} disconnected", self.peer)
            }
            SessionError::Transport(e) => {
                warn!("communication failed with client @ {}: {e}", self.peer)
            }
            SessionError::ProtocolViolation(tag) => {
                warn!("closing client @ {}: unrecognized command '{tag}'", self.peer)
            }
        }
        self.close();

        reason
    }

    fn serve_one<H: Handler + ?Sized>(&mut self, handler: &H) -> Result<(), SessionError> {
        let tag = self.transport.receive_framed()?;
        let tag = String::from_utf8_lossy(&tag);
        let tag: CommandTag = tag
            .parse()
            .map_err(|_| SessionError::ProtocolViolation(tag.to_string()))?;

        let payload = self.transport.receive_framed()?;
        let reply = match Request::decode(tag, &payload) {
            Ok(request) => {
                debug!("received request from {}: {request:?}", self.peer);
                handler.handle(request)
            }
            Err(envelope) => Reply::error(envelope),
        };

        match self.transport.send_reply(&reply) {
            Err(TransportError::FrameTooLarge(len)) => {
                warn!("reply of {len} bytes to {} exceeds the frame limit", self.peer);
                let envelope = ErrorEnvelope::new(
                    ErrorCode::Unknown,
                    format!("reply of {len} bytes exceeds the frame limit"),
                );
                self.transport.send_reply(&Reply::error(envelope))?;
            }
            res => res?,
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Err(e) = self.transport.get_ref().shutdown(Shutdown::Both) {
            debug!("shutdown of {} failed: {e}", self.peer);
        }
        self.state = SessionState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use super::*;

    #[test]
    fn accept_greets_and_serves() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (stream, peer) = listener.accept().unwrap();

        let session = Session::accept(stream, peer).unwrap();
        assert_eq!(session.state(), SessionState::Serving);
        assert_eq!(session.peer(), peer);

        let mut client = FramedTransport::new(client);
        assert_eq!(client.receive_framed().unwrap(), READY.as_bytes());
    }
}
