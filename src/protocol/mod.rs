//! Client-server communication protocol.
//!
//! Every message travels as one length-prefixed frame over TCP. A session opens
//! with the server sending [`READY`]; after that the client sends requests as
//! two frames, a [`CommandTag`] and a payload, and reads back one [`Reply`].
//!
//! # Overview
//!
//! Payloads are `~`-separated text fields. When a request carries a field map
//! it is the last field, bincode encoded, so the separator byte may appear
//! inside it. Replies are the records of a GET, [`SUCCESS`]/[`FAILURE`] for
//! writes, or an [`ErrorEnvelope`] naming what was wrong with the request.
//!
//! An unrecognized command tag ends the session. Everything else the server
//! can answer, it answers, and the session stays open.
//!
//! # Key Components
//!
//! - [`Listener`]: accept loop, one [`Session`] thread per connection.
//! - [`Dispatcher`]: validates requests and runs them against the store.
//! - [`Client`]: blocking client used by `roster_cli`.
//! - [`FramedTransport`]: frame codec over any `Read + Write` stream.
//!
//! # Binary Format
//!
//! - Each frame is an 8-byte big-endian length followed by that many bytes.
//! - Frames larger than [`MAX_FRAME_SIZE`] are rejected by both sides: a
//!   sender refuses to write one, a receiver refuses to read one. A reply that
//!   would not fit is replaced by an `UNKNOWN` error envelope.
//! - Integers inside encoded blobs are fixed width, big-endian.
//!
//! # See Also
//!
//! - [`storage`](crate::storage): Data layer that ultimately executes requests.
mod client;
mod dispatch;
mod request;
mod response;
mod server;
mod session;
mod thread;
mod transport;

pub use client::{Client, ClientError};
pub use dispatch::{Dispatcher, Handler};
pub use request::{
    AddRequest, CommandTag, DeleteRequest, GetRequest, Request, UnknownCommand, UpdateRequest,
};
pub use response::{ERROR_MARKER, ErrorCode, ErrorEnvelope, NO_DETAIL, Reply, UnknownErrorCode};
pub use server::{Listener, ListenerConfig, StopHandle};
pub use session::{Session, SessionError, SessionState};
pub use transport::{
    BLOB_LIMIT, FramedTransport, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, TransportError, blob_config,
    wire_config,
};

/// Greeting sent by the server once a connection is accepted.
pub const READY: &str = "READY";
pub const SUCCESS: &str = "SUCCESS";
pub const FAILURE: &str = "FAILURE";
/// Separates the fields of a request payload and of an error reply.
pub const DELIMITER: char = '~';
pub const DEFAULT_PORT: u16 = 53326;
