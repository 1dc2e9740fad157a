use bencoder::bencode::Bencode;

/// A peer endpoint as handed out by the tracker or the DHT.
///
/// Two peers are the same peer iff they share `(ip, port)`; the optional
/// peer id from a dictionary-form tracker response does not participate in
/// equality, so the supervisor's dedup set works across both list forms.
#[derive(Debug, Clone)]
pub struct BtPeer {
    pub ip: String,
    pub port: u16,
    pub peer_id: Option<Vec<u8>>,
}

impl PartialEq for BtPeer {
    fn eq(&self, other: &Self) -> bool {
        self.ip == other.ip && self.port == other.port
    }
}

impl Eq for BtPeer {}

impl std::hash::Hash for BtPeer {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.ip.hash(state);
        self.port.hash(state);
    }
}

/// Possible `BtPeer` errors.
#[derive(Debug, PartialEq, Eq)]
pub enum BtPeerError {
    InvalidPeerId,
    InvalidIp,
    InvalidPort,
    NotADict,
    InvalidCompactPeer,
}

impl BtPeer {
    pub fn new(ip: String, port: u16) -> Self {
        Self {
            ip,
            port,
            peer_id: None,
        }
    }

    /// Builds a `BtPeer` from a dictionary entry of a non-compact tracker
    /// peer list.
    ///
    /// It returns a `BtPeerError` if:
    /// - The peer IP or port is missing or invalid.
    /// - The bencoded peer is not a dict.
    pub fn from(bencode: &Bencode) -> Result<BtPeer, BtPeerError> {
        let mut peer_id = None;
        let mut ip = None;
        let mut port = None;

        let d = match bencode {
            Bencode::BDict(d) => d,
            _ => return Err(BtPeerError::NotADict),
        };

        for (k, v) in d.iter() {
            if k == b"peer id" {
                peer_id = Some(Self::create_peer_id(v)?);
            } else if k == b"ip" {
                ip = Some(Self::create_ip(v)?);
            } else if k == b"port" {
                port = Some(Self::create_port(v)?);
            }
        }

        Ok(BtPeer {
            ip: ip.ok_or(BtPeerError::InvalidIp)?,
            port: port.ok_or(BtPeerError::InvalidPort)?,
            peer_id,
        })
    }

    /// Builds a `BtPeer` from a 6-byte compact record:
    /// a big-endian IPv4 address followed by a big-endian port.
    pub fn from_compact(chunk: &[u8]) -> Result<BtPeer, BtPeerError> {
        if chunk.len() != 6 {
            return Err(BtPeerError::InvalidCompactPeer);
        }
        let ip = format!("{}.{}.{}.{}", chunk[0], chunk[1], chunk[2], chunk[3]);
        let port = u16::from_be_bytes([chunk[4], chunk[5]]);

        Ok(BtPeer::new(ip, port))
    }

    /// Returns the `ip:port` form used for connecting and logging.
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    fn create_peer_id(bencode: &Bencode) -> Result<Vec<u8>, BtPeerError> {
        match bencode {
            Bencode::BString(s) => Ok(s.clone()),
            _ => Err(BtPeerError::InvalidPeerId),
        }
    }

    fn create_ip(bencode: &Bencode) -> Result<String, BtPeerError> {
        let ip = match bencode {
            Bencode::BString(s) => s,
            _ => return Err(BtPeerError::InvalidIp),
        };

        String::from_utf8(ip.to_vec()).map_err(|_| BtPeerError::InvalidIp)
    }

    fn create_port(bencode: &Bencode) -> Result<u16, BtPeerError> {
        match bencode {
            Bencode::BNumber(n) if (0..=i64::from(u16::MAX)).contains(n) => Ok(*n as u16),
            _ => Err(BtPeerError::InvalidPort),
        }
    }
}
