use tracing::{debug, error, info, warn};

/// A LoggerSender representing a handle to the process log.
///
/// There are four ways to write to the log:
///  - `info()` to log information.
///  - `warn()` to log a non critical warning.
///  - `error()` to log a critical error.
///  - `debug()` for chatter only wanted when tracing a session.
///
/// To clone the LoggerSender simply call the `clone()` method; `scoped()`
/// derives a handle whose messages carry an extra label, so a worker spawned
/// for one peer tags everything it logs without repeating the address in
/// every message.
///
/// The handle is injected by constructor into every worker that logs. The
/// sink behind it is whatever `tracing` subscriber the binary installed at
/// startup; the handle itself holds no channel and no file.
#[derive(Debug, Clone)]
pub struct LoggerSender {
    context: String,
}

impl LoggerSender {
    /// Creates a new LoggerSender labelled with `context`.
    pub fn new(context: &str) -> Self {
        Self {
            context: context.to_string(),
        }
    }

    /// Derives a sender whose messages also carry `detail`.
    pub fn scoped(&self, detail: &str) -> Self {
        Self {
            context: format!("{} / {}", self.context, detail),
        }
    }

    /// Writes an Info type log to the connected sink.
    pub fn info(&self, value: &str) {
        info!("{} - {}", self.context, value);
    }

    /// Writes a Warn type log to the connected sink.
    pub fn warn(&self, value: &str) {
        warn!("{} - {}", self.context, value);
    }

    /// Writes an Error type log to the connected sink.
    pub fn error(&self, value: &str) {
        error!("{} - {}", self.context, value);
    }

    /// Writes a Debug type log to the connected sink.
    pub fn debug(&self, value: &str) {
        debug!("{} - {}", self.context, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_sender_extends_the_label() {
        let sender = LoggerSender::new("Torrent: demo");
        let scoped = sender.scoped("Peer: 10.0.0.1:6881");

        assert!(format!("{:?}", scoped).contains("Torrent: demo / Peer: 10.0.0.1:6881"));
        // The parent handle keeps its own label.
        assert!(!format!("{:?}", sender).contains("Peer:"));
    }

    #[test]
    fn test_logging_without_a_subscriber_does_not_panic() {
        let sender = LoggerSender::new("Torrent: demo");
        sender.info("info line");
        sender.warn("warn line");
        sender.error("error line");
        sender.debug("debug line");
    }

    #[test]
    fn test_clones_share_the_label() {
        let sender = LoggerSender::new("Torrent: demo").scoped("Peer: a");
        let cloned = sender.clone();

        assert_eq!(format!("{:?}", sender), format!("{:?}", cloned));
    }
}
