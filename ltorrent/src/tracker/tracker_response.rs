use bencoder::bencode::{Bencode, BencodeError};

use crate::peer::bt_peer::{BtPeer, BtPeerError};

/// `TrackerResponse` struct containing a decoded tracker response.
///
/// To create a new `TrackerResponse` use the method builder `from()`.
/// A response carrying a `failure reason` still decodes successfully; the
/// reason is surfaced so the caller can log it and treat the peer list as
/// empty.
#[derive(Debug)]
pub struct TrackerResponse {
    pub interval: i64,
    pub failure_reason: Option<String>,
    pub peers: Vec<BtPeer>,
}

/// Possible `TrackerResponse` errors.
#[derive(Debug)]
pub enum FromTrackerResponseError {
    DecodeResponseError(BencodeError),
    NotADict,
    InvalidInterval,
    InvalidPeers(BtPeerError),
    InvalidPeersType,
}

impl TrackerResponse {
    /// Builds a new `TrackerResponse` from the bencoded response body.
    ///
    /// The `peers` value comes in two shapes: a byte string of consecutive
    /// 6-byte compact records, or a list of `{ip, port}` dictionaries. Both
    /// are accepted.
    ///
    /// It returns a `FromTrackerResponseError` if:
    /// - The body is not bencoded or not a dict.
    /// - The interval is not a number.
    /// - A peer entry is malformed.
    pub fn from(response: &[u8]) -> Result<TrackerResponse, FromTrackerResponseError> {
        let mut interval = 0;
        let mut failure_reason = None;
        let mut peers = Vec::new();

        let decoded = Bencode::decode(response).map_err(FromTrackerResponseError::DecodeResponseError)?;

        let d = match decoded {
            Bencode::BDict(d) => d,
            _ => return Err(FromTrackerResponseError::NotADict),
        };

        for (k, v) in d.iter() {
            if k == b"interval" {
                interval = Self::create_interval(v)?;
            } else if k == b"failure reason" {
                failure_reason = Some(Self::create_failure_reason(v));
            } else if k == b"peers" {
                peers = Self::create_peers(v)?;
            }
        }

        Ok(TrackerResponse {
            interval,
            failure_reason,
            peers,
        })
    }

    fn create_interval(bencode: &Bencode) -> Result<i64, FromTrackerResponseError> {
        match bencode {
            Bencode::BNumber(n) => Ok(*n),
            _ => Err(FromTrackerResponseError::InvalidInterval),
        }
    }

    fn create_failure_reason(bencode: &Bencode) -> String {
        match bencode {
            Bencode::BString(s) => String::from_utf8_lossy(s).to_string(),
            _ => "unreadable failure reason".to_string(),
        }
    }

    fn create_peers(bencode: &Bencode) -> Result<Vec<BtPeer>, FromTrackerResponseError> {
        match bencode {
            Bencode::BList(list) => Self::create_peers_from_dicts(list),
            Bencode::BString(compact) => Self::create_peers_from_compact(compact),
            _ => Err(FromTrackerResponseError::InvalidPeersType),
        }
    }

    fn create_peers_from_dicts(list: &[Bencode]) -> Result<Vec<BtPeer>, FromTrackerResponseError> {
        let mut peers = Vec::with_capacity(list.len());

        for p in list {
            let peer = BtPeer::from(p).map_err(FromTrackerResponseError::InvalidPeers)?;
            peers.push(peer);
        }

        Ok(peers)
    }

    fn create_peers_from_compact(
        compact: &[u8],
    ) -> Result<Vec<BtPeer>, FromTrackerResponseError> {
        compact
            .chunks_exact(6)
            .map(|chunk| BtPeer::from_compact(chunk).map_err(FromTrackerResponseError::InvalidPeers))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_from_compact_peer_list() {
        let compact = b"\x0A\x00\x00\x01\x1A\xE1\xC0\xA8\x00\x02\x1A\xE1".to_vec();
        let response = encode_response(1800, Bencode::BString(compact));

        let decoded = TrackerResponse::from(&response).unwrap();

        assert_eq!(decoded.interval, 1800);
        assert_eq!(decoded.failure_reason, None);
        assert_eq!(
            decoded.peers,
            vec![
                BtPeer::new("10.0.0.1".to_string(), 6881),
                BtPeer::new("192.168.0.2".to_string(), 6881),
            ]
        );
    }

    #[test]
    fn test_from_dict_peer_list() {
        let peers = Bencode::BList(vec![
            build_peer_dict(b"id1", b"127.0.0.1", 6868),
            build_peer_dict(b"id2", b"127.0.0.2", 4242),
        ]);
        let response = encode_response(10, peers);

        let decoded = TrackerResponse::from(&response).unwrap();

        assert_eq!(decoded.peers.len(), 2);
        assert_eq!(decoded.peers[0].ip, "127.0.0.1");
        assert_eq!(decoded.peers[1].port, 4242);
    }

    #[test]
    fn test_failure_reason_is_surfaced() {
        let mut dict = BTreeMap::new();
        dict.insert(
            b"failure reason".to_vec(),
            Bencode::BString(b"torrent not registered".to_vec()),
        );
        let response = Bencode::encode(&dict);

        let decoded = TrackerResponse::from(&response).unwrap();

        assert_eq!(
            decoded.failure_reason.as_deref(),
            Some("torrent not registered")
        );
        assert!(decoded.peers.is_empty());
    }

    #[test]
    fn test_trailing_partial_compact_record_is_dropped() {
        let compact = b"\x0A\x00\x00\x01\x1A\xE1\xC0\xA8".to_vec();
        let response = encode_response(10, Bencode::BString(compact));

        let decoded = TrackerResponse::from(&response).unwrap();

        assert_eq!(decoded.peers.len(), 1);
    }

    #[test]
    fn test_not_bencoded() {
        assert!(matches!(
            TrackerResponse::from(b"plain text"),
            Err(FromTrackerResponseError::DecodeResponseError(_))
        ));
    }

    // Auxiliary functions

    fn encode_response(interval: i64, peers: Bencode) -> Vec<u8> {
        let mut dict = BTreeMap::new();
        dict.insert(b"interval".to_vec(), Bencode::BNumber(interval));
        dict.insert(b"peers".to_vec(), peers);
        Bencode::encode(&dict)
    }

    fn build_peer_dict(peer_id: &[u8], ip: &[u8], port: i64) -> Bencode {
        let mut peer_dict = BTreeMap::new();
        peer_dict.insert(b"peer id".to_vec(), Bencode::BString(peer_id.to_vec()));
        peer_dict.insert(b"ip".to_vec(), Bencode::BString(ip.to_vec()));
        peer_dict.insert(b"port".to_vec(), Bencode::BNumber(port));
        Bencode::BDict(peer_dict)
    }
}
