use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use crate::{
    config::{
        cfg::Cfg,
        constants::{PROGRESS_TICK_SECS, STAGNATION_THRESHOLD_SECS},
    },
    dht::dht_client::DhtClient,
    logger::logger_sender::LoggerSender,
    peer::{bt_peer::BtPeer, peer_session::PeerSession},
    piece_manager::manager::AtomicPieceManager,
    storage_manager::manager::{assemble_torrent, AssembleError},
    torrent_parser::torrent::Torrent,
    tracker::tracker_handler::{TrackerHandler, TrackerHandlerError},
};

/// Struct for supervising one torrent download.
///
/// To create a new `TorrentHandler`, use
/// TorrentHandler::new(torrent, cfg, logger_sender).
///
/// `handle` seeds peers from the tracker (and, best effort, the DHT), spawns
/// one session thread per unique endpoint, watches progress every few
/// seconds, re-announces when the download stagnates, and assembles the
/// files once every piece is verified. Sessions are shut down cooperatively
/// through their running flags; they are never joined or killed.
pub struct TorrentHandler {
    torrent: Torrent,
    cfg: Cfg,
    logger_sender: LoggerSender,
    piece_manager: Arc<AtomicPieceManager>,
    known_peers: HashSet<BtPeer>,
    session_flags: Vec<Arc<AtomicBool>>,
    next_session_id: usize,
    running: Arc<AtomicBool>,
}

/// Possible torrent handler errors.
#[derive(Debug)]
pub enum TorrentHandlerError {
    TrackerError(TrackerHandlerError),
    AssembleError(AssembleError),
    DownloadIncomplete,
}

impl TorrentHandler {
    /// Creates a new `TorrentHandler` from a torrent, a config and a logger
    /// sender.
    pub fn new(torrent: Torrent, cfg: Cfg, logger_sender: LoggerSender) -> Self {
        let piece_manager = Arc::new(AtomicPieceManager::new(&torrent.info));

        Self {
            torrent,
            cfg,
            logger_sender,
            piece_manager,
            known_peers: HashSet::new(),
            session_flags: Vec::new(),
            next_session_id: 0,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Clone of the supervisor's own run flag.
    ///
    /// Clearing it (say, from an interrupt handler) makes `handle` leave its
    /// progress loop at the next tick, stop every session, and skip assembly
    /// unless the download already finished.
    pub fn shutdown_signal(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Runs the download to completion.
    ///
    /// # Errors
    ///
    /// - `TrackerError` if the announce url cannot be parsed at all.
    /// - `DownloadIncomplete` if the loop was interrupted before every piece
    ///   arrived; nothing is written in that case.
    /// - `AssembleError` if writing the finished files failed.
    pub fn handle(&mut self) -> Result<(), TorrentHandlerError> {
        let tracker_handler =
            TrackerHandler::new(&self.torrent, self.cfg.tcp_port, self.cfg.peer_id)
                .map_err(TorrentHandlerError::TrackerError)?;

        self.logger_sender
            .info(&format!("announcing to {}", self.torrent.announce_url));
        let mut seeds = tracker_handler.announce();
        match DhtClient::new() {
            Ok(dht) => seeds.extend(dht.get_peers(&self.torrent.info_hash)),
            Err(err) => self
                .logger_sender
                .debug(&format!("dht bootstrap unavailable: {:?}", err)),
        }
        let admitted = self.admit_peers(seeds);
        self.logger_sender
            .info(&format!("{} peers admitted from initial announce", admitted));

        self.progress_loop(&tracker_handler);

        self.shutdown_sessions();

        if self.piece_manager.is_complete() {
            assemble_torrent(&self.torrent, &self.piece_manager, &self.cfg.output_directory)
                .map_err(TorrentHandlerError::AssembleError)?;
            self.logger_sender.info("download finished");
            Ok(())
        } else {
            self.logger_sender
                .error("download did not complete; no files were written");
            Err(TorrentHandlerError::DownloadIncomplete)
        }
    }

    /// Samples completion every tick and re-announces after
    /// `STAGNATION_THRESHOLD_SECS` without a newly finished piece.
    fn progress_loop(&mut self, tracker_handler: &TrackerHandler) {
        let total = self.piece_manager.total_pieces() as usize;
        let mut last_completed = 0;
        let mut stagnant_seconds = 0;

        while !self.piece_manager.is_complete() && self.running.load(Ordering::Relaxed) {
            thread::sleep(Duration::from_secs(PROGRESS_TICK_SECS));

            let completed = self.piece_manager.downloaded_pieces();
            self.logger_sender.info(&format!(
                "download progress: {}/{} pieces ({:.2}%)",
                completed,
                total,
                completed as f64 / total as f64 * 100.0
            ));

            if completed > last_completed {
                last_completed = completed;
                stagnant_seconds = 0;
            } else {
                stagnant_seconds += PROGRESS_TICK_SECS;
            }

            if stagnant_seconds >= STAGNATION_THRESHOLD_SECS {
                self.logger_sender.info(&format!(
                    "no progress for {}s, re-announcing",
                    stagnant_seconds
                ));
                let admitted = self.admit_peers(tracker_handler.announce());
                self.logger_sender
                    .info(&format!("{} new peers admitted from re-announce", admitted));
                stagnant_seconds = 0;
            }
        }
    }

    /// Admits every endpoint not seen before and spawns a session for it.
    /// Returns how many endpoints were admitted.
    fn admit_peers(&mut self, peers: Vec<BtPeer>) -> usize {
        let mut admitted = 0;
        for peer in peers {
            if self.known_peers.contains(&peer) {
                continue;
            }
            self.known_peers.insert(peer.clone());
            match self.spawn_session(peer) {
                Ok(()) => admitted += 1,
                Err(err) => self
                    .logger_sender
                    .warn(&format!("could not spawn peer session: {:?}", err)),
            }
        }
        admitted
    }

    fn spawn_session(&mut self, peer: BtPeer) -> std::io::Result<()> {
        let session_id = self.next_session_id;
        self.next_session_id += 1;

        let peer_logger_sender = self
            .logger_sender
            .scoped(&format!("Peer: {}", peer.address()));
        let running = Arc::new(AtomicBool::new(true));
        let mut session = PeerSession::new(
            peer.clone(),
            self.piece_manager.clone(),
            self.torrent.info_hash,
            self.cfg.peer_id,
            session_id,
            running.clone(),
            peer_logger_sender.clone(),
        );

        let builder = thread::Builder::new().name(format!(
            "Torrent: {} / Peer: {}",
            self.torrent.name(),
            peer.address()
        ));
        builder.spawn(move || match session.run() {
            Ok(_) => (),
            Err(err) => peer_logger_sender.warn(&format!("session ended: {:?}", err)),
        })?;

        self.session_flags.push(running);
        Ok(())
    }

    fn shutdown_sessions(&mut self) {
        for flag in &self.session_flags {
            flag.store(false, Ordering::Relaxed);
        }
    }
}
