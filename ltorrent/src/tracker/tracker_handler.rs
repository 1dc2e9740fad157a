use tracing::{debug, warn};

use super::http::http_handler::{HttpHandler, HttpHandlerError};
use super::http::query_params::QueryParams;
use super::http::url_parser::{TrackerUrl, TrackerUrlError};
use super::tracker_response::FromTrackerResponseError;
use crate::peer::bt_peer::BtPeer;
use crate::torrent_parser::torrent::Torrent;
use crate::tracker::tracker_response::TrackerResponse;

/// `TrackerHandler` struct for announcing to the torrent's tracker.
///
/// To create a new `TrackerHandler` use the method builder `new()`; each
/// `announce()` issues one GET and returns whatever peers came back.
#[derive(Debug)]
pub struct TrackerHandler {
    tracker_url: TrackerUrl,
    info_hash: [u8; 20],
    peer_id: [u8; 20],
    client_port: u16,
    left: u64,
}

/// Possible `TrackerHandler` construction errors.
#[derive(Debug)]
pub enum TrackerHandlerError {
    UrlParseError(TrackerUrlError),
}

/// Why one announce produced no peers. Never fatal.
#[derive(Debug)]
enum AnnounceFailure {
    HttpHandlerError(HttpHandlerError),
    HttpStatus(u16),
    FromTrackerResponseError(FromTrackerResponseError),
    FailureReason(String),
}

impl TrackerHandler {
    /// Builds a new `TrackerHandler` for a torrent.
    ///
    /// It returns a `TrackerHandlerError` if the torrent's announce url does
    /// not parse.
    pub fn new(
        torrent: &Torrent,
        client_port: u16,
        peer_id: [u8; 20],
    ) -> Result<Self, TrackerHandlerError> {
        let tracker_url = TrackerUrl::parse(torrent.announce_url.as_str())
            .map_err(TrackerHandlerError::UrlParseError)?;

        Ok(Self {
            tracker_url,
            info_hash: torrent.info_hash,
            peer_id,
            client_port,
            left: torrent.total_length(),
        })
    }

    /// Announces to the tracker and returns its peer list.
    ///
    /// Announce trouble is never fatal for the download: an HTTP error, a
    /// non-200 status or a `failure reason` in the body is logged and yields
    /// an empty list, and the supervisor carries on with the peers it has.
    pub fn announce(&self) -> Vec<BtPeer> {
        match self.try_announce() {
            Ok(response) => {
                debug!(
                    "tracker returned {} peers (interval {})",
                    response.peers.len(),
                    response.interval
                );
                response.peers
            }
            Err(failure) => {
                warn!("announce produced no peers: {:?}", failure);
                Vec::new()
            }
        }
    }

    fn try_announce(&self) -> Result<TrackerResponse, AnnounceFailure> {
        let query_params = QueryParams::new(
            self.info_hash,
            self.peer_id,
            self.client_port,
            self.left,
        );
        let http_handler = HttpHandler::new(self.tracker_url.clone(), query_params);

        let response = http_handler
            .request()
            .map_err(AnnounceFailure::HttpHandlerError)?;
        if response.status != 200 {
            return Err(AnnounceFailure::HttpStatus(response.status));
        }

        let tracker_response = TrackerResponse::from(&response.body)
            .map_err(AnnounceFailure::FromTrackerResponseError)?;
        if let Some(reason) = tracker_response.failure_reason {
            return Err(AnnounceFailure::FailureReason(reason));
        }

        Ok(tracker_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::torrent_parser::info::Info;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn test_announce_parses_compact_peers() {
        let body = [
            b"d8:intervali1800e5:peers12:".as_slice(),
            b"\x0A\x00\x00\x01\x1A\xE1\xC0\xA8\x00\x02\x1A\xE1".as_slice(),
            b"e".as_slice(),
        ]
        .concat();
        let (port, requests, server) = spawn_fake_tracker("HTTP/1.1 200 OK", body);

        let handler = create_test_handler(port);
        let peers = handler.announce();
        server.join().unwrap();

        assert_eq!(
            peers,
            vec![
                BtPeer::new("10.0.0.1".to_string(), 6881),
                BtPeer::new("192.168.0.2".to_string(), 6881),
            ]
        );

        let request = requests.recv().unwrap();
        assert!(request.starts_with("GET /announce?info_hash=%"));
        assert!(request.contains("&compact=1&numwant=200"));
    }

    #[test]
    fn test_announce_with_failure_reason_returns_no_peers() {
        let body = b"d14:failure reason9:not found8:intervali0ee".to_vec();
        let (port, _requests, server) = spawn_fake_tracker("HTTP/1.1 200 OK", body);

        let handler = create_test_handler(port);
        let peers = handler.announce();
        server.join().unwrap();

        assert!(peers.is_empty());
    }

    #[test]
    fn test_announce_with_http_error_returns_no_peers() {
        let (port, _requests, server) =
            spawn_fake_tracker("HTTP/1.1 500 Internal Server Error", vec![]);

        let handler = create_test_handler(port);
        let peers = handler.announce();
        server.join().unwrap();

        assert!(peers.is_empty());
    }

    #[test]
    fn test_announce_against_closed_port_returns_no_peers() {
        // Bind and drop so the port is (momentarily) free and refused.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let handler = create_test_handler(port);
        assert!(handler.announce().is_empty());
    }

    // Auxiliary functions

    fn create_test_handler(port: u16) -> TrackerHandler {
        let torrent = create_test_torrent(&format!("http://127.0.0.1:{}/announce", port));
        TrackerHandler::new(&torrent, 6969, [b'A'; 20]).unwrap()
    }

    fn create_test_torrent(announce: &str) -> Torrent {
        let info = Info {
            name: "test".to_string(),
            piece_length: 16384,
            pieces: vec![0u8; 20],
            length: Some(100),
            files: None,
        };

        Torrent {
            announce_url: announce.to_string(),
            info,
            info_hash: [7u8; 20],
        }
    }

    /// One-shot HTTP server: answers a single request with the given status
    /// line and body, and reports the request line it saw.
    fn spawn_fake_tracker(
        status_line: &'static str,
        body: Vec<u8>,
    ) -> (u16, mpsc::Receiver<String>, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (sender, receiver) = mpsc::channel();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();

            let mut request = Vec::new();
            let mut byte = [0u8; 1];
            while !request.ends_with(b"\r\n\r\n") {
                stream.read_exact(&mut byte).unwrap();
                request.push(byte[0]);
            }
            let request_line = String::from_utf8_lossy(&request)
                .lines()
                .next()
                .unwrap_or_default()
                .to_string();
            sender.send(request_line).unwrap();

            stream.write_all(status_line.as_bytes()).unwrap();
            stream.write_all(b"\r\n\r\n").unwrap();
            stream.write_all(&body).unwrap();
        });

        (port, receiver, handle)
    }
}
