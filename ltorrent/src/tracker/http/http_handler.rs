use native_tls::Error;
use native_tls::TlsConnector;
use std::io::Error as IOError;
use std::io::{Read, Write};
use std::net::TcpStream;

use super::query_params::QueryParams;
use super::url_parser::{ConnectionProtocol, TrackerUrl};

/// A decoded HTTP response: the status code and the bytes after the headers.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// `HttpHandler` struct making the raw announce GET.
///
/// To create a new `HttpHandler` use the method builder `new()`; `request()`
/// dispatches on the announce url's scheme.
#[derive(Debug)]
pub struct HttpHandler {
    tracker_url: TrackerUrl,
    query_params: QueryParams,
}

/// Possible `HttpHandler` errors.
#[derive(Debug)]
pub enum HttpHandlerError {
    CreateTlsConnectorError(Error),
    TcpStreamConnectError(IOError),
    TlsHandshakeError,
    ErrorWritingStream(IOError),
    ErrorReadingStream(IOError),
    MalformedResponse,
}

impl HttpHandler {
    /// Builds a new `HttpHandler` from a `TrackerUrl` and a `QueryParams`.
    pub fn new(tracker_url: TrackerUrl, query_params: QueryParams) -> Self {
        Self {
            tracker_url,
            query_params,
        }
    }

    /// Makes the announce GET, over TLS when the url says so.
    ///
    /// On success it returns the response status and body.
    ///
    /// It returns an `HttpHandlerError` if:
    /// - The connection (or the TLS handshake) could not be established.
    /// - The request could not be written or the response not read.
    /// - The response has no valid status line or no header terminator.
    pub fn request(&self) -> Result<HttpResponse, HttpHandlerError> {
        match self.tracker_url.protocol {
            ConnectionProtocol::Http => self.http_request(),
            ConnectionProtocol::Https => self.https_request(),
        }
    }

    fn https_request(&self) -> Result<HttpResponse, HttpHandlerError> {
        let connector = TlsConnector::new().map_err(HttpHandlerError::CreateTlsConnectorError)?;
        let stream = self.connect_tcp_stream()?;
        let stream = connector
            .connect(self.tracker_url.host.as_str(), stream)
            .map_err(|_| HttpHandlerError::TlsHandshakeError)?;
        self.request_and_parse(stream)
    }

    fn http_request(&self) -> Result<HttpResponse, HttpHandlerError> {
        self.request_and_parse(self.connect_tcp_stream()?)
    }

    fn connect_tcp_stream(&self) -> Result<TcpStream, HttpHandlerError> {
        let connect_url = format!("{}:{}", self.tracker_url.host, self.tracker_url.port);
        TcpStream::connect(connect_url).map_err(HttpHandlerError::TcpStreamConnectError)
    }

    fn request_and_parse<A>(&self, mut stream: A) -> Result<HttpResponse, HttpHandlerError>
    where
        A: Write + Read,
    {
        let query_params = self.query_params.build();
        let mut request = format!(
            "GET /{}{} HTTP/1.1",
            self.tracker_url.endpoint, query_params
        );
        request.push_str("\r\n");
        request.push_str("Host: ");
        request.push_str(self.tracker_url.host.as_str());
        request.push_str("\r\n");
        request.push_str("User-Agent: ltorrent/0.1");
        request.push_str("\r\n");
        request.push_str("Connection: close");
        request.push_str("\r\n");
        request.push_str("\r\n");

        stream
            .write_all(request.as_bytes())
            .map_err(HttpHandlerError::ErrorWritingStream)?;

        let mut response = vec![];
        stream
            .read_to_end(&mut response)
            .map_err(HttpHandlerError::ErrorReadingStream)?;

        Self::split_response(&response)
    }

    /// Splits a raw HTTP response into its status code and body.
    fn split_response(response: &[u8]) -> Result<HttpResponse, HttpHandlerError> {
        let status = Self::parse_status_code(response)?;

        let body_start = response
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .map(|i| i + 4)
            .ok_or(HttpHandlerError::MalformedResponse)?;

        Ok(HttpResponse {
            status,
            body: response[body_start..].to_vec(),
        })
    }

    /// Parses the code out of a status line like `HTTP/1.1 200 OK`.
    fn parse_status_code(response: &[u8]) -> Result<u16, HttpHandlerError> {
        let line_end = response
            .windows(2)
            .position(|w| w == b"\r\n")
            .ok_or(HttpHandlerError::MalformedResponse)?;
        let status_line = std::str::from_utf8(&response[..line_end])
            .map_err(|_| HttpHandlerError::MalformedResponse)?;

        status_line
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .ok_or(HttpHandlerError::MalformedResponse)
    }
}
