use std::{
    io::{self, Read},
    net::{TcpStream, ToSocketAddrs},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use rand::Rng;

use crate::{
    config::constants::{
        CONNECT_BACKOFF_MS, CONNECT_JITTER_MS, CONNECT_TIMEOUT_SECS, FAILURE_PAUSE_MS,
        KEEPALIVE_INTERVAL_SECS, MAX_CONNECT_ATTEMPTS, MAX_CONSECUTIVE_FAILURES,
        MAX_MESSAGE_LENGTH, READ_TIMEOUT_SECS,
    },
    logger::logger_sender::LoggerSender,
    piece_manager::manager::{AtomicPieceManager, AtomicPieceManagerError},
};

use super::{
    bt_peer::BtPeer,
    handshake::{Handshake, HANDSHAKE_LENGTH},
    message_handler::{MessageHandler, MessageHandlerError},
    peer_message::{Message, MessageError, MessageId},
    session_status::SessionStatus,
};

#[derive(Debug)]
pub enum PeerSessionError {
    CouldNotConnectToPeer,
    HandshakeMismatch,
    ErrorSettingStreamTimeout,
    ErrorReadingMessage(io::Error),
    MessageDoesNotExist(MessageError),
    MessageLengthTooLong,
    MessageHandlerError(MessageHandlerError),
    PieceManagerError(AtomicPieceManagerError),
    TooManyFailures,
}

/// One worker bound to one peer endpoint.
///
/// A session connects (with jitter and retries), handshakes, announces
/// interest and then pumps messages: deposits every received block into the
/// shared piece manager and, while unchoked, keeps one request in flight per
/// received message. It stops on its `running` flag, on connect exhaustion or
/// after three consecutive socket failures, and always hands its undelivered
/// reservations back to the piece manager on the way out.
pub struct PeerSession {
    peer: BtPeer,
    piece_manager: Arc<AtomicPieceManager>,
    message_handler: MessageHandler,
    status: SessionStatus,
    info_hash: [u8; 20],
    session_id: usize,
    running: Arc<AtomicBool>,
    logger_sender: LoggerSender,
}

impl PeerSession {
    pub fn new(
        peer: BtPeer,
        piece_manager: Arc<AtomicPieceManager>,
        info_hash: [u8; 20],
        client_peer_id: [u8; 20],
        session_id: usize,
        running: Arc<AtomicBool>,
        logger_sender: LoggerSender,
    ) -> Self {
        Self {
            peer,
            piece_manager,
            message_handler: MessageHandler::new(info_hash, client_peer_id),
            status: SessionStatus::new(),
            info_hash,
            session_id,
            running,
            logger_sender,
        }
    }

    /// Drives the whole session; returns when the peer is done with us.
    ///
    /// Whatever the outcome, blocks this session reserved but never received
    /// are released so other sessions can request them.
    pub fn run(&mut self) -> Result<(), PeerSessionError> {
        let result = self.run_inner();
        if let Err(err) = self.piece_manager.release_session(self.session_id) {
            self.logger_sender
                .warn(&format!("could not release in-flight blocks: {:?}", err));
        }
        self.logger_sender.debug("session finished");
        result
    }

    fn run_inner(&mut self) -> Result<(), PeerSessionError> {
        let mut stream = match self.connect_with_retries()? {
            Some(stream) => stream,
            // Shutdown was requested while we were still connecting.
            None => return Ok(()),
        };

        self.message_handler
            .send_interested(&mut stream)
            .map_err(PeerSessionError::MessageHandlerError)?;
        self.status.interested = true;
        self.status.touch();

        self.message_loop(&mut stream)
    }

    /// Connect phase: jitter, TCP connect with timeout, handshake exchange.
    ///
    /// Returns `Ok(None)` when the running flag was cleared before a
    /// connection was established.
    fn connect_with_retries(&mut self) -> Result<Option<TcpStream>, PeerSessionError> {
        for attempt in 1..=MAX_CONNECT_ATTEMPTS {
            if !self.running.load(Ordering::Relaxed) {
                return Ok(None);
            }
            // Spread simultaneous connects out so a fresh peer list does not
            // turn into a connection storm.
            sleep_uniform_ms(CONNECT_JITTER_MS);

            match self.try_connect() {
                Ok(stream) => {
                    self.logger_sender.info(&format!(
                        "connected (attempt {}/{})",
                        attempt, MAX_CONNECT_ATTEMPTS
                    ));
                    return Ok(Some(stream));
                }
                Err(err) => {
                    self.logger_sender.warn(&format!(
                        "connecting failed: {:?} (attempt {}/{})",
                        err, attempt, MAX_CONNECT_ATTEMPTS
                    ));
                    if attempt < MAX_CONNECT_ATTEMPTS {
                        sleep_uniform_ms(CONNECT_BACKOFF_MS);
                    }
                }
            }
        }
        Err(PeerSessionError::CouldNotConnectToPeer)
    }

    fn try_connect(&mut self) -> Result<TcpStream, PeerSessionError> {
        let address = self
            .peer
            .address()
            .to_socket_addrs()
            .map_err(|_| PeerSessionError::CouldNotConnectToPeer)?
            .next()
            .ok_or(PeerSessionError::CouldNotConnectToPeer)?;

        let mut stream =
            TcpStream::connect_timeout(&address, Duration::from_secs(CONNECT_TIMEOUT_SECS))
                .map_err(|_| PeerSessionError::CouldNotConnectToPeer)?;
        stream
            .set_read_timeout(Some(Duration::from_secs(READ_TIMEOUT_SECS)))
            .map_err(|_| PeerSessionError::ErrorSettingStreamTimeout)?;

        self.message_handler
            .send_handshake(&mut stream)
            .map_err(PeerSessionError::MessageHandlerError)?;

        let mut buffer = [0u8; HANDSHAKE_LENGTH];
        stream
            .read_exact(&mut buffer)
            .map_err(PeerSessionError::ErrorReadingMessage)?;
        let handshake =
            Handshake::from_bytes(&buffer).map_err(|_| PeerSessionError::HandshakeMismatch)?;
        if !handshake.accepts(&self.info_hash) {
            return Err(PeerSessionError::HandshakeMismatch);
        }

        self.status.touch();
        Ok(stream)
    }

    /// Steady-state loop; exits on the running flag or on the third
    /// consecutive socket failure.
    fn message_loop(&mut self, stream: &mut TcpStream) -> Result<(), PeerSessionError> {
        while self.running.load(Ordering::Relaxed) {
            match self.tick(stream) {
                Ok(()) => self.status.consecutive_failures = 0,
                Err(err) if is_protocol_failure(&err) => {
                    self.status.consecutive_failures += 1;
                    self.logger_sender.warn(&format!(
                        "{:?} (failure {}/{})",
                        err, self.status.consecutive_failures, MAX_CONSECUTIVE_FAILURES
                    ));
                    if self.status.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                        return Err(PeerSessionError::TooManyFailures);
                    }
                    thread::sleep(Duration::from_millis(FAILURE_PAUSE_MS));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// One loop iteration: keep the connection alive, read one frame,
    /// dispatch it, and keep a request in flight while unchoked.
    fn tick(&mut self, stream: &mut TcpStream) -> Result<(), PeerSessionError> {
        if self.status.idle_seconds() >= KEEPALIVE_INTERVAL_SECS {
            self.message_handler
                .send_keep_alive(stream)
                .map_err(PeerSessionError::MessageHandlerError)?;
            self.status.touch();
            self.logger_sender.debug("sent keep-alive");
        }

        let message = self.read_message(stream)?;
        self.status.touch();
        let message = match message {
            Some(message) => message,
            // A received keep-alive carries nothing to act on.
            None => return Ok(()),
        };

        self.handle_message(message)?;

        if !self.status.choked {
            if let Some(request) = self
                .piece_manager
                .next_request(self.session_id)
                .map_err(PeerSessionError::PieceManagerError)?
            {
                self.message_handler
                    .send_request(&request, stream)
                    .map_err(PeerSessionError::MessageHandlerError)?;
                self.status.touch();
            }
        }
        Ok(())
    }

    /// Reads one framed message. Returns `None` for a keep-alive frame.
    fn read_message(&mut self, stream: &mut TcpStream) -> Result<Option<Message>, PeerSessionError> {
        let mut length = [0u8; 4];
        stream
            .read_exact(&mut length)
            .map_err(PeerSessionError::ErrorReadingMessage)?;
        let len = u32::from_be_bytes(length);

        if len == 0 {
            return Ok(None);
        }
        if len > MAX_MESSAGE_LENGTH {
            return Err(PeerSessionError::MessageLengthTooLong);
        }

        let mut body = vec![0u8; len as usize];
        stream
            .read_exact(&mut body)
            .map_err(PeerSessionError::ErrorReadingMessage)?;

        let message = Message::from_bytes(&body).map_err(PeerSessionError::MessageDoesNotExist)?;
        Ok(Some(message))
    }

    fn handle_message(&mut self, message: Message) -> Result<(), PeerSessionError> {
        match message.id {
            MessageId::Choke => {
                self.logger_sender.debug("choked by peer");
                self.status.choked = true;
            }
            MessageId::Unchoke => {
                self.logger_sender.debug("unchoked by peer");
                self.status.choked = false;
            }
            MessageId::Have => {
                // Informational; we request in order regardless of
                // availability.
                let index = MessageHandler::handle_have(message)
                    .map_err(PeerSessionError::MessageHandlerError)?;
                self.logger_sender
                    .debug(&format!("peer has piece {}", index));
            }
            MessageId::Bitfield => {
                self.logger_sender.debug("bitfield received");
            }
            MessageId::Piece => {
                let (index, offset, block) = MessageHandler::handle_piece(message)
                    .map_err(PeerSessionError::MessageHandlerError)?;
                self.logger_sender.debug(&format!(
                    "block received: piece {} offset {} ({} bytes)",
                    index,
                    offset,
                    block.len()
                ));
                self.piece_manager
                    .mark_block_received(index, offset, block)
                    .map_err(PeerSessionError::PieceManagerError)?;
            }
            // We never serve blocks, so the peer's interest and requests
            // carry no meaning for us.
            MessageId::Interested
            | MessageId::NotInterested
            | MessageId::Request
            | MessageId::Cancel
            | MessageId::KeepAlive => {}
        }
        Ok(())
    }
}

/// Socket-level trouble counts toward the consecutive-failure budget;
/// everything else (a poisoned coordinator lock) ends the session at once.
fn is_protocol_failure(err: &PeerSessionError) -> bool {
    matches!(
        err,
        PeerSessionError::ErrorReadingMessage(_)
            | PeerSessionError::MessageDoesNotExist(_)
            | PeerSessionError::MessageLengthTooLong
            | PeerSessionError::MessageHandlerError(_)
    )
}

fn sleep_uniform_ms(range: (u64, u64)) {
    let millis = rand::thread_rng().gen_range(range.0..=range.1);
    thread::sleep(Duration::from_millis(millis));
}
