use std::net::{Shutdown, TcpStream, ToSocketAddrs};

use log::{debug, warn};
use thiserror::Error;

use crate::storage::{Comparison, FieldMap, Record};

use super::{
    DELIMITER, FAILURE, READY, SUCCESS,
    request::{AddRequest, DeleteRequest, GetRequest, Request, UpdateRequest},
    response::{ErrorEnvelope, Reply},
    transport::{FramedTransport, MAX_PAYLOAD_SIZE, TransportError},
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("server did not greet with READY, got '{0}'")]
    ConnectionFailed(String),

    #[error(transparent)]
    Server(ErrorEnvelope),

    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("table name '{0}' contains the field separator")]
    InvalidTable(String),

    #[error("connection is no longer usable")]
    Disconnected,
}

/// Blocking client for one server connection.
///
/// Once a call fails at the transport level the stream may be left mid-frame,
/// so the connection is shut down and every later call fails with
/// [`ClientError::Disconnected`].
pub struct Client {
    transport: FramedTransport<TcpStream>,
    broken: bool,
}

impl Client {
    pub fn connect(address: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(address).map_err(TransportError::from)?;
        let mut transport = FramedTransport::new(stream);

        let greeting = transport.receive_framed()?;
        if greeting != READY.as_bytes() {
            return Err(ClientError::ConnectionFailed(
                String::from_utf8_lossy(&greeting).into_owned(),
            ));
        }

        Ok(Self {
            transport,
            broken: false,
        })
    }

    /// Rows of `table` matching every constraint. An empty map lists the
    /// whole table.
    pub fn get(
        &mut self,
        table: impl AsRef<str>,
        comparison: Comparison,
        constraints: FieldMap,
    ) -> Result<Vec<Record>, ClientError> {
        let filter = (!constraints.is_empty()).then_some((comparison, constraints));
        let request = Request::Get(GetRequest {
            table: table_name(table)?,
            filter,
        });

        match self.call(&request)? {
            Reply::Records(records) => Ok(records),
            reply => Err(unexpected(reply)),
        }
    }

    pub fn get_all(&mut self, table: impl AsRef<str>) -> Result<Vec<Record>, ClientError> {
        self.get(table, Comparison::Equal, FieldMap::new())
    }

    pub fn add(&mut self, table: impl AsRef<str>, fields: FieldMap) -> Result<bool, ClientError> {
        let request = Request::Add(AddRequest {
            table: table_name(table)?,
            fields,
        });
        self.outcome(&request)
    }

    pub fn update(
        &mut self,
        table: impl AsRef<str>,
        id: i64,
        fields: FieldMap,
    ) -> Result<bool, ClientError> {
        let request = Request::Update(UpdateRequest {
            table: table_name(table)?,
            id,
            fields,
        });
        self.outcome(&request)
    }

    pub fn delete(&mut self, table: impl AsRef<str>, id: i64) -> Result<bool, ClientError> {
        let request = Request::Delete(DeleteRequest {
            table: table_name(table)?,
            id,
        });
        self.outcome(&request)
    }

    fn outcome(&mut self, request: &Request) -> Result<bool, ClientError> {
        match self.call(request)? {
            Reply::Text(text) if text == SUCCESS => Ok(true),
            Reply::Text(text) if text == FAILURE => Ok(false),
            reply => Err(unexpected(reply)),
        }
    }

    /// Sends `request` and reads its reply, surfacing error replies as
    /// [`ClientError::Server`].
    fn call(&mut self, request: &Request) -> Result<Reply, ClientError> {
        if self.broken {
            return Err(ClientError::Disconnected);
        }
        let payload = request.encode()?;
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(TransportError::FrameTooLarge(payload.len()).into());
        }

        debug!("sending {request:?}");
        let reply = match self.exchange(request.tag().as_str(), &payload) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("dropping connection: {e}");
                self.broken = true;
                let _ = self.transport.get_ref().shutdown(Shutdown::Both);
                return Err(e.into());
            }
        };

        match reply.as_error() {
            Some(Ok(envelope)) => Err(ClientError::Server(envelope)),
            Some(Err(malformed)) => Err(ClientError::UnexpectedReply(malformed.0)),
            None => Ok(reply),
        }
    }

    fn exchange(&mut self, tag: &str, payload: &[u8]) -> Result<Reply, TransportError> {
        self.transport.send_text(tag)?;
        self.transport.send_framed(payload)?;
        self.transport.receive_reply()
    }
}

fn table_name(table: impl AsRef<str>) -> Result<String, ClientError> {
    let table = table.as_ref();
    if table.contains(DELIMITER) {
        return Err(ClientError::InvalidTable(table.to_string()));
    }
    Ok(table.to_string())
}

fn unexpected(reply: Reply) -> ClientError {
    let shape = match reply {
        Reply::Records(records) => format!("{} records", records.len()),
        Reply::Text(text) => text,
    };
    ClientError::UnexpectedReply(shape)
}
