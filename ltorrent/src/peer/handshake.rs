#[derive(Debug, PartialEq, Eq)]
pub enum FromHandshakeError {
    InvalidHandshake,
}

pub const HANDSHAKE_LENGTH: usize = 68;

const PSTR: &[u8; 19] = b"BitTorrent protocol";

/// The fixed 68-byte greeting exchanged once at session start.
///
/// `from_bytes` only accepts frames whose protocol string is exact; whether
/// the announced info hash matches ours is the caller's check (`accepts`).
/// The reserved bytes are ignored on receive and sent as all zeros.
#[derive(Debug)]
pub struct Handshake {
    pub info_hash: [u8; 20],
    pub peer_id: [u8; 20],
}

impl Handshake {
    /// Creates a new `Handshake` message.
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20]) -> Self {
        Self { info_hash, peer_id }
    }

    /// Converts a `Handshake` message to its 68-byte wire form.
    pub fn as_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![PSTR.len() as u8];
        bytes.extend(PSTR);
        bytes.extend([0u8; 8]);
        bytes.extend(&self.info_hash);
        bytes.extend(&self.peer_id);
        bytes
    }

    /// Parses a 68-byte buffer into a `Handshake` message.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FromHandshakeError> {
        if bytes.len() != HANDSHAKE_LENGTH {
            return Err(FromHandshakeError::InvalidHandshake);
        }
        if bytes[0] as usize != PSTR.len() || &bytes[1..20] != PSTR {
            return Err(FromHandshakeError::InvalidHandshake);
        }

        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&bytes[28..48]);
        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&bytes[48..68]);

        Ok(Self { info_hash, peer_id })
    }

    /// A received handshake is accepted iff it announces our torrent.
    pub fn accepts(&self, info_hash: &[u8; 20]) -> bool {
        &self.info_hash == info_hash
    }
}
