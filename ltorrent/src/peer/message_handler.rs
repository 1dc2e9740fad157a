use std::io::Write;

use crate::piece_manager::manager::BlockRequest;

use super::{
    handshake::Handshake,
    peer_message::{Message, MessageId, Request},
};

#[derive(Debug)]
pub enum MessageHandlerError {
    HandshakeError,
    MessageError(MessageId),
    InvalidPayload(MessageId),
}

/// Builds and writes the messages this client sends, and unpacks the
/// payloads of the ones it acts on.
///
/// The client leeches only, so the outgoing set is small: handshake,
/// keep-alive, interested and request.
pub struct MessageHandler {
    info_hash: [u8; 20],
    client_peer_id: [u8; 20],
}

impl MessageHandler {
    pub fn new(info_hash: [u8; 20], client_peer_id: [u8; 20]) -> MessageHandler {
        Self {
            info_hash,
            client_peer_id,
        }
    }

    /// ------------------------------------------------------------------------------------------------
    /// Receiving messages

    /// Unpacks a piece message into `(piece index, offset, block)`.
    pub fn handle_piece(message: Message) -> Result<(u32, u32, Vec<u8>), MessageHandlerError> {
        if message.payload.len() < 8 {
            return Err(MessageHandlerError::InvalidPayload(MessageId::Piece));
        }
        let mut field = [0u8; 4];
        field.copy_from_slice(&message.payload[0..4]);
        let index = u32::from_be_bytes(field);
        field.copy_from_slice(&message.payload[4..8]);
        let offset = u32::from_be_bytes(field);

        Ok((index, offset, message.payload[8..].to_vec()))
    }

    /// Unpacks a have message into the announced piece index.
    pub fn handle_have(message: Message) -> Result<u32, MessageHandlerError> {
        if message.payload.len() != 4 {
            return Err(MessageHandlerError::InvalidPayload(MessageId::Have));
        }
        let mut index = [0u8; 4];
        index.copy_from_slice(&message.payload[0..4]);
        Ok(u32::from_be_bytes(index))
    }

    /// ------------------------------------------------------------------------------------------------
    /// Sending messages

    /// Sends a request message to the peer.
    pub fn send_request<W: Write>(
        &self,
        request: &BlockRequest,
        stream: &mut W,
    ) -> Result<(), MessageHandlerError> {
        let payload =
            Request::new(request.piece_index, request.offset, request.length).as_bytes();

        let request_msg = Message::new(MessageId::Request, payload);
        self.send(stream, request_msg)
    }

    /// Sends an interested message to the peer.
    pub fn send_interested<W: Write>(&self, stream: &mut W) -> Result<(), MessageHandlerError> {
        let interested_msg = Message::new(MessageId::Interested, vec![]);
        self.send(stream, interested_msg)
    }

    /// Sends a keep-alive: a frame of length zero, no id, no payload.
    pub fn send_keep_alive<W: Write>(&self, stream: &mut W) -> Result<(), MessageHandlerError> {
        stream
            .write_all(&0u32.to_be_bytes())
            .map_err(|_| MessageHandlerError::MessageError(MessageId::KeepAlive))
    }

    /// Generic sending function.
    fn send<W: Write>(&self, stream: &mut W, message: Message) -> Result<(), MessageHandlerError> {
        stream
            .write_all(&message.as_bytes())
            .map_err(|_| MessageHandlerError::MessageError(message.id))
    }

    /// ------------------------------------------------------------------------------------------------
    /// Handshake

    /// Sends our handshake to the peer.
    pub fn send_handshake<W: Write>(&self, stream: &mut W) -> Result<(), MessageHandlerError> {
        let handshake = Handshake::new(self.info_hash, self.client_peer_id);
        stream
            .write_all(&handshake.as_bytes())
            .map_err(|_| MessageHandlerError::HandshakeError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_piece_round_trip() {
        let mut payload = vec![];
        payload.extend(2u32.to_be_bytes());
        payload.extend(16384u32.to_be_bytes());
        payload.extend(b"some block");
        let message = Message::new(MessageId::Piece, payload);

        let (index, offset, block) = MessageHandler::handle_piece(message).unwrap();

        assert_eq!(index, 2);
        assert_eq!(offset, 16384);
        assert_eq!(block, b"some block");
    }

    #[test]
    fn test_handle_piece_short_payload() {
        let message = Message::new(MessageId::Piece, vec![0u8; 7]);
        assert!(MessageHandler::handle_piece(message).is_err());
    }

    #[test]
    fn test_handle_have() {
        let message = Message::new(MessageId::Have, 42u32.to_be_bytes().to_vec());
        assert_eq!(MessageHandler::handle_have(message).unwrap(), 42);
    }

    #[test]
    fn test_send_request_wire_form() {
        let handler = create_test_handler();
        let mut sink = vec![];

        handler
            .send_request(
                &BlockRequest {
                    piece_index: 1,
                    offset: 16384,
                    length: 4,
                },
                &mut sink,
            )
            .unwrap();

        let mut expected = vec![];
        expected.extend(13u32.to_be_bytes());
        expected.push(6u8);
        expected.extend(1u32.to_be_bytes());
        expected.extend(16384u32.to_be_bytes());
        expected.extend(4u32.to_be_bytes());
        assert_eq!(sink, expected);
    }

    #[test]
    fn test_send_interested_wire_form() {
        let handler = create_test_handler();
        let mut sink = vec![];

        handler.send_interested(&mut sink).unwrap();

        assert_eq!(sink, vec![0, 0, 0, 1, 2]);
    }

    #[test]
    fn test_send_keep_alive_is_length_zero() {
        let handler = create_test_handler();
        let mut sink = vec![];

        handler.send_keep_alive(&mut sink).unwrap();

        assert_eq!(sink, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_send_handshake_is_68_bytes() {
        let handler = create_test_handler();
        let mut sink = vec![];

        handler.send_handshake(&mut sink).unwrap();

        assert_eq!(sink.len(), 68);
        assert_eq!(sink[0], 19);
        assert_eq!(&sink[28..48], &[1u8; 20]);
        assert_eq!(&sink[48..68], &[2u8; 20]);
    }

    // Auxiliary functions

    fn create_test_handler() -> MessageHandler {
        MessageHandler::new([1u8; 20], [2u8; 20])
    }
}
