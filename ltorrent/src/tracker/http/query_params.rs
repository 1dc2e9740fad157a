use crate::config::constants::NUMWANT;
use url_encoder::url_encoder::encode;

/// The query string of an announce request.
///
/// `build` emits the parameters in the wire order trackers are used to:
/// info_hash, peer_id, port, uploaded, downloaded, left, compact, numwant.
/// The binary info hash and peer id are percent-encoded byte for byte.
#[derive(Debug)]
pub struct QueryParams {
    info_hash: [u8; 20],
    peer_id: [u8; 20],
    client_port: u16,
    left: u64,
}

impl QueryParams {
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20], client_port: u16, left: u64) -> QueryParams {
        QueryParams {
            info_hash,
            peer_id,
            client_port,
            left,
        }
    }

    /// Builds the query string, leading `?` included.
    pub fn build(&self) -> String {
        format!(
            "?info_hash={}&peer_id={}&port={}&uploaded=0&downloaded=0&left={}&compact=1&numwant={}",
            encode(&self.info_hash),
            encode(&self.peer_id),
            self.client_port,
            self.left,
            NUMWANT
        )
    }
}
