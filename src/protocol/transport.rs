use std::io::{self, ErrorKind, Read, Write};

use bincode::{
    config::{BigEndian, Configuration, Fixint, Limit},
    decode_from_slice, decode_from_std_read, encode_into_std_write, encode_to_vec,
    error::DecodeError,
};
use thiserror::Error;

use super::Reply;

/// Largest frame either side accepts, length prefix included.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;
const LENGTH_PREFIX: usize = 8;
/// Largest payload one frame carries.
pub const MAX_PAYLOAD_SIZE: usize = MAX_FRAME_SIZE - LENGTH_PREFIX;
/// Decode limit for structured payloads. Containers are claimed at their
/// in-memory size, which exceeds their encoded size.
pub const BLOB_LIMIT: usize = 16 * MAX_FRAME_SIZE;

pub type WireConfig = Configuration<BigEndian, Fixint, Limit<MAX_FRAME_SIZE>>;
pub type BlobConfig = Configuration<BigEndian, Fixint, Limit<BLOB_LIMIT>>;

/// Configuration of the frames themselves.
pub fn wire_config() -> WireConfig {
    bincode::config::standard()
        .with_big_endian()
        .with_fixed_int_encoding()
        .with_limit::<MAX_FRAME_SIZE>()
}

/// Configuration of the structured payloads carried inside frames: field
/// maps and replies. Their size is already bounded by the enclosing frame.
pub fn blob_config() -> BlobConfig {
    bincode::config::standard()
        .with_big_endian()
        .with_fixed_int_encoding()
        .with_limit::<BLOB_LIMIT>()
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to encode message: {0}")]
    Serialize(#[from] bincode::error::EncodeError),
    #[error("failed to decode message: {0}")]
    Deserialize(#[from] bincode::error::DecodeError),
    #[error("Transport IO Error: {0}")]
    Io(#[from] io::Error),
    #[error("payload of {0} bytes does not fit in one frame")]
    FrameTooLarge(usize),
}

impl TransportError {
    /// Whether the peer simply went away.
    pub fn is_disconnect(&self) -> bool {
        fn gone(e: &io::Error) -> bool {
            matches!(
                e.kind(),
                ErrorKind::UnexpectedEof
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
            )
        }

        match self {
            TransportError::Io(e) => gone(e),
            TransportError::Deserialize(DecodeError::Io { inner, .. }) => gone(inner),
            TransportError::Deserialize(DecodeError::UnexpectedEnd { .. }) => true,
            _ => false,
        }
    }
}

/// Length-prefixed frames over a byte stream.
///
/// Each frame is a bincode byte vector: an 8 byte big-endian length followed by
/// the payload. A receive returns exactly what one send produced.
pub struct FramedTransport<T: Read + Write> {
    stream: T,
    config: WireConfig,
    blob: BlobConfig,
}

impl<T: Read + Write> FramedTransport<T> {
    pub fn new(stream: T) -> Self {
        Self {
            stream,
            config: wire_config(),
            blob: blob_config(),
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.stream
    }

    /// Writes one frame. A payload over [`MAX_PAYLOAD_SIZE`] is refused
    /// before anything reaches the stream.
    pub fn send_framed(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(TransportError::FrameTooLarge(payload.len()));
        }
        encode_into_std_write(payload, &mut self.stream, self.config)?;
        self.stream.flush()?;
        Ok(())
    }

    pub fn receive_framed(&mut self) -> Result<Vec<u8>, TransportError> {
        let payload: Vec<u8> = decode_from_std_read(&mut self.stream, self.config)?;
        Ok(payload)
    }

    pub fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        self.send_framed(text.as_bytes())
    }

    pub fn send_reply(&mut self, reply: &Reply) -> Result<(), TransportError> {
        let bytes = encode_to_vec(reply, self.blob)?;
        self.send_framed(&bytes)
    }

    pub fn receive_reply(&mut self) -> Result<Reply, TransportError> {
        let bytes = self.receive_framed()?;
        let (reply, _) = decode_from_slice(&bytes, self.blob)?;
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Seek, SeekFrom};

    use super::*;

    #[test]
    fn read_write_frames() {
        let stream = Cursor::new(Vec::new());
        let mut transport = FramedTransport::new(stream);

        transport.send_text("GET").unwrap();
        transport.send_framed(b"Teams~=~\x00~\x7e").unwrap();
        transport.send_framed(&[]).unwrap();
        transport.stream.seek(SeekFrom::Start(0)).unwrap();

        assert_eq!(transport.receive_framed().unwrap(), b"GET");
        assert_eq!(transport.receive_framed().unwrap(), b"Teams~=~\x00~\x7e");
        assert!(transport.receive_framed().unwrap().is_empty());
    }

    #[test]
    fn read_write_reply() {
        let stream = Cursor::new(Vec::new());
        let mut transport = FramedTransport::new(stream);

        transport.send_reply(&Reply::outcome(true)).unwrap();
        transport.stream.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(transport.receive_reply().unwrap(), Reply::outcome(true));
    }

    #[test]
    fn closed_stream_is_disconnect() {
        let mut transport = FramedTransport::new(Cursor::new(Vec::new()));
        let err = transport.receive_framed().unwrap_err();
        assert!(err.is_disconnect(), "{err:?}");
    }

    #[test]
    fn largest_payload_fits_one_frame() {
        let mut transport = FramedTransport::new(Cursor::new(Vec::new()));
        let payload = vec![0x7e; MAX_PAYLOAD_SIZE];

        transport.send_framed(&payload).unwrap();
        transport.stream.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(transport.receive_framed().unwrap().len(), MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn oversized_payload_not_sent() {
        let mut transport = FramedTransport::new(Cursor::new(Vec::new()));

        let err = transport.send_framed(&vec![0; MAX_PAYLOAD_SIZE + 1]).unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLarge(n) if n == MAX_PAYLOAD_SIZE + 1));
        assert!(!err.is_disconnect());
        assert!(transport.get_ref().get_ref().is_empty());
    }

    #[test]
    fn reply_with_many_small_records() {
        use crate::storage::{Division, Record, Team};

        let team = Team {
            id: 1,
            name: String::new(),
            state: String::new(),
            city: String::new(),
            division: Division::Central,
            arena: String::new(),
            championships: 0,
            website: String::new(),
        };
        // Claimed at in-memory size this is well past the frame limit.
        let reply = Reply::Records(vec![Record::Team(team); 200_000]);
        let mut transport = FramedTransport::new(Cursor::new(Vec::new()));

        transport.send_reply(&reply).unwrap();
        transport.stream.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(transport.receive_reply().unwrap(), reply);
    }

    #[test]
    fn oversized_frame_rejected() {
        let mut bytes = ((MAX_FRAME_SIZE + 1) as u64).to_be_bytes().to_vec();
        bytes.extend_from_slice(b"short");
        let mut transport = FramedTransport::new(Cursor::new(bytes));

        let err = transport.receive_framed().unwrap_err();
        assert!(matches!(err, TransportError::Deserialize(_)));
    }
}
