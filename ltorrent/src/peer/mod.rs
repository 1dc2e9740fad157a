pub mod bt_peer;
pub mod handshake;
pub mod message_handler;
pub mod peer_message;
pub mod peer_session;
pub mod session_status;
