/// `TrackerUrl` struct containing a tracker url's parts.
///
/// To create a new `TrackerUrl` use the method builder `parse()`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TrackerUrl {
    pub protocol: ConnectionProtocol,
    pub host: String,
    pub port: u16,
    pub endpoint: String,
}

/// Possible `TrackerUrl` connection protocol values.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ConnectionProtocol {
    Http,
    Https,
}

impl ConnectionProtocol {
    fn default_port(&self) -> u16 {
        match self {
            ConnectionProtocol::Http => 80,
            ConnectionProtocol::Https => 443,
        }
    }
}

/// Possible `TrackerUrl` errors.
#[derive(Debug, PartialEq, Eq)]
pub enum TrackerUrlError {
    InvalidTrackerUrl,
    UnsupportedConnectionProtocol,
    InvalidPortNumber,
}

impl TrackerUrl {
    /// Builds a new `TrackerUrl` from an announce url.
    ///
    /// It returns a `TrackerUrlError` if:
    /// - The url has no endpoint path or an empty host.
    /// - The url scheme is neither http nor https.
    /// - The url port is not a number.
    pub fn parse(url: &str) -> Result<Self, TrackerUrlError> {
        let (protocol, rest) = if let Some(rest) = url.strip_prefix("http://") {
            (ConnectionProtocol::Http, rest)
        } else if let Some(rest) = url.strip_prefix("https://") {
            (ConnectionProtocol::Https, rest)
        } else {
            return Err(TrackerUrlError::UnsupportedConnectionProtocol);
        };

        let (authority, endpoint) = rest
            .split_once('/')
            .ok_or(TrackerUrlError::InvalidTrackerUrl)?;

        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => (
                host,
                port.parse::<u16>()
                    .map_err(|_| TrackerUrlError::InvalidPortNumber)?,
            ),
            None => (authority, protocol.default_port()),
        };
        if host.is_empty() {
            return Err(TrackerUrlError::InvalidTrackerUrl);
        }

        Ok(Self {
            protocol,
            host: host.to_string(),
            port,
            endpoint: endpoint.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_no_port() {
        let parsed = TrackerUrl::parse("https://www.example.org/ann").unwrap();

        assert_eq!(ConnectionProtocol::Https, parsed.protocol);
        assert_eq!("www.example.org", parsed.host);
        assert_eq!(443, parsed.port);
        assert_eq!("ann", parsed.endpoint);
    }

    #[test]
    fn test_http_no_port() {
        let parsed = TrackerUrl::parse("http://www.example.org/ann").unwrap();

        assert_eq!(ConnectionProtocol::Http, parsed.protocol);
        assert_eq!("www.example.org", parsed.host);
        assert_eq!(80, parsed.port);
        assert_eq!("ann", parsed.endpoint);
    }

    #[test]
    fn test_http_with_port() {
        let parsed = TrackerUrl::parse("http://www.example.org:1337/ann").unwrap();

        assert_eq!(ConnectionProtocol::Http, parsed.protocol);
        assert_eq!("www.example.org", parsed.host);
        assert_eq!(1337, parsed.port);
        assert_eq!("ann", parsed.endpoint);
    }

    #[test]
    fn test_https_with_port() {
        let parsed = TrackerUrl::parse("https://www.example.org:1337/ann").unwrap();

        assert_eq!(ConnectionProtocol::Https, parsed.protocol);
        assert_eq!(1337, parsed.port);
    }

    #[test]
    fn test_invalid_protocol() {
        assert_eq!(
            TrackerUrl::parse("udp://www.example.org:1337/ann"),
            Err(TrackerUrlError::UnsupportedConnectionProtocol)
        );
    }

    #[test]
    fn test_invalid_port() {
        assert_eq!(
            TrackerUrl::parse("https://www.example.org:12a/ann"),
            Err(TrackerUrlError::InvalidPortNumber)
        );
    }

    #[test]
    fn test_missing_path() {
        assert_eq!(
            TrackerUrl::parse("https://www.example.org:123"),
            Err(TrackerUrlError::InvalidTrackerUrl)
        );
    }
}
