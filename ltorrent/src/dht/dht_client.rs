use std::collections::BTreeMap;
use std::io::Error as IOError;
use std::net::UdpSocket;
use std::time::Duration;

use bencoder::bencode::{Bencode, BencodeError};
use rand::Rng;
use tracing::debug;

use crate::config::constants::{DHT_BOOTSTRAP_NODES, DHT_TIMEOUT_SECS};
use crate::peer::bt_peer::{BtPeer, BtPeerError};

/// Best-effort DHT peer discovery.
///
/// Sends one `get_peers` query to each well-known bootstrap node and
/// collects whatever compact peer records come back within the timeout.
/// This only supplements the tracker: every failure is logged at debug
/// level and swallowed.
pub struct DhtClient {
    node_id: [u8; 20],
    socket: UdpSocket,
}

/// Possible `DhtClient` errors.
#[derive(Debug)]
pub enum DhtError {
    BindError(IOError),
    SendError(IOError),
    RecvError(IOError),
    DecodeError(BencodeError),
    MalformedResponse,
    InvalidPeer(BtPeerError),
}

impl DhtClient {
    /// Binds the query socket and draws a fresh 20-byte node id.
    ///
    /// # Errors
    /// - `BindError` if no local UDP socket could be opened.
    pub fn new() -> Result<Self, DhtError> {
        let socket = UdpSocket::bind("0.0.0.0:0").map_err(DhtError::BindError)?;
        socket
            .set_read_timeout(Some(Duration::from_secs(DHT_TIMEOUT_SECS)))
            .map_err(DhtError::BindError)?;

        let mut node_id = [0u8; 20];
        rand::thread_rng().fill(&mut node_id);

        Ok(Self { node_id, socket })
    }

    /// Asks every bootstrap node for peers of `info_hash`.
    pub fn get_peers(&self, info_hash: &[u8; 20]) -> Vec<BtPeer> {
        let mut peers = Vec::new();
        for node in DHT_BOOTSTRAP_NODES {
            match self.query_node(node, info_hash) {
                Ok(mut found) => {
                    debug!("dht node {} returned {} peers", node, found.len());
                    peers.append(&mut found);
                }
                Err(err) => debug!("dht query to {} failed: {:?}", node, err),
            }
        }
        peers
    }

    fn query_node(&self, node: &str, info_hash: &[u8; 20]) -> Result<Vec<BtPeer>, DhtError> {
        let transaction_id: [u8; 2] = rand::thread_rng().gen();
        let query = Self::build_get_peers(&transaction_id, &self.node_id, info_hash);

        self.socket
            .send_to(&query, node)
            .map_err(DhtError::SendError)?;

        let mut buffer = [0u8; 2048];
        let (received, _) = self
            .socket
            .recv_from(&mut buffer)
            .map_err(DhtError::RecvError)?;

        Self::parse_values(&buffer[..received])
    }

    /// Builds the bencoded `get_peers` query:
    /// `{"t": tid, "y": "q", "q": "get_peers", "a": {"id": .., "info_hash": ..}}`.
    fn build_get_peers(
        transaction_id: &[u8; 2],
        node_id: &[u8; 20],
        info_hash: &[u8; 20],
    ) -> Vec<u8> {
        let mut arguments = BTreeMap::new();
        arguments.insert(b"id".to_vec(), Bencode::BString(node_id.to_vec()));
        arguments.insert(b"info_hash".to_vec(), Bencode::BString(info_hash.to_vec()));

        let mut query = BTreeMap::new();
        query.insert(b"t".to_vec(), Bencode::BString(transaction_id.to_vec()));
        query.insert(b"y".to_vec(), Bencode::BString(b"q".to_vec()));
        query.insert(b"q".to_vec(), Bencode::BString(b"get_peers".to_vec()));
        query.insert(b"a".to_vec(), Bencode::BDict(arguments));

        Bencode::encode(&query)
    }

    /// Pulls the compact peer records out of a `get_peers` reply's
    /// `r.values` list. A reply without values (nodes only) yields nothing.
    fn parse_values(response: &[u8]) -> Result<Vec<BtPeer>, DhtError> {
        let decoded = Bencode::decode(response).map_err(DhtError::DecodeError)?;

        let d = match decoded {
            Bencode::BDict(d) => d,
            _ => return Err(DhtError::MalformedResponse),
        };
        let r = match d.get(b"r".as_slice()) {
            Some(Bencode::BDict(r)) => r,
            Some(_) => return Err(DhtError::MalformedResponse),
            None => return Ok(Vec::new()),
        };
        let values = match r.get(b"values".as_slice()) {
            Some(Bencode::BList(values)) => values,
            Some(_) => return Err(DhtError::MalformedResponse),
            None => return Ok(Vec::new()),
        };

        let mut peers = Vec::with_capacity(values.len());
        for value in values {
            let compact = match value {
                Bencode::BString(s) => s,
                _ => return Err(DhtError::MalformedResponse),
            };
            peers.push(BtPeer::from_compact(compact).map_err(DhtError::InvalidPeer)?);
        }
        Ok(peers)
    }
}
