// IDs of the messages defined in the protocol.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum MessageId {
    KeepAlive = -1,
    Choke = 0,
    Unchoke = 1,
    Interested = 2,
    NotInterested = 3,
    Have = 4,
    Bitfield = 5,
    Request = 6,
    Piece = 7,
    Cancel = 8,
}

/// A framed peer wire message: its ID and message-specific payload.
///
/// The zero-length keep-alive frame has no ID byte on the wire and is handled
/// by the session before a `Message` is ever built.
#[derive(Debug)]
pub struct Message {
    pub id: MessageId,
    pub payload: Vec<u8>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum MessageError {
    InvalidMessage,
}

impl Message {
    /// Creates a new `Message` from a message ID and a payload.
    pub fn new(id: MessageId, payload: Vec<u8>) -> Self {
        Self { id, payload }
    }

    /// Parses the body of a framed message (everything after the length
    /// prefix) into a `Message`.
    pub fn from_bytes(body: &[u8]) -> Result<Self, MessageError> {
        let id = match body.first().copied() {
            Some(0) => MessageId::Choke,
            Some(1) => MessageId::Unchoke,
            Some(2) => MessageId::Interested,
            Some(3) => MessageId::NotInterested,
            Some(4) => MessageId::Have,
            Some(5) => MessageId::Bitfield,
            Some(6) => MessageId::Request,
            Some(7) => MessageId::Piece,
            Some(8) => MessageId::Cancel,
            _ => return Err(MessageError::InvalidMessage),
        };

        Ok(Self {
            id,
            payload: body[1..].to_vec(),
        })
    }

    /// Converts a `Message` to its wire form, length prefix included.
    pub fn as_bytes(&self) -> Vec<u8> {
        let len = self.payload.len() + 1;
        let len_bytes: [u8; 4] = (len as u32).to_be_bytes();
        let mut bytes = vec![0; 4 + len];
        bytes[0..4].copy_from_slice(&len_bytes);
        bytes[4] = self.id.clone() as u8;
        bytes[5..].copy_from_slice(&self.payload);
        bytes
    }
}
