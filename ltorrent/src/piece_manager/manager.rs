use crate::config::constants::BLOCK_SIZE;
use crate::torrent_parser::info::Info;
use sha1::{Digest, Sha1};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, MutexGuard,
    },
};
use tracing::{info, warn};

/// A block the coordinator wants a session to fetch next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRequest {
    pub piece_index: u32,
    pub offset: u32,
    pub length: u32,
}

/// Working state of one piece while it is being downloaded.
#[derive(Debug)]
struct PieceState {
    expected_length: u64,
    /// Received blocks, keyed by offset.
    blocks: HashMap<u32, Vec<u8>>,
    /// Dispatched-but-unanswered offsets, tagged with the reserving session.
    requested: HashMap<u32, usize>,
    complete: bool,
}

impl PieceState {
    fn new(expected_length: u64) -> Self {
        Self {
            expected_length,
            blocks: HashMap::new(),
            requested: HashMap::new(),
            complete: false,
        }
    }

    fn received_bytes(&self) -> u64 {
        self.blocks.values().map(|b| b.len() as u64).sum()
    }

    fn reset(&mut self) {
        self.blocks.clear();
        self.requested.clear();
    }
}

struct PieceTable {
    pieces: HashMap<u32, PieceState>,
    /// Verified pieces, drained by the supervisor at assembly time.
    completed: HashMap<u32, Vec<u8>>,
}

/// Shared ledger of every piece's download state.
///
/// One instance exists per torrent, shared by all peer sessions and the
/// supervisor. All piece state sits behind a single `Mutex`; no I/O ever
/// happens while it is held. Verified piece bytes stay in the completion
/// ledger until the supervisor drains them with `take_piece`.
pub struct AtomicPieceManager {
    pieces_hash: Vec<u8>,
    total_pieces: u32,
    table: Mutex<PieceTable>,
    finished_pieces: AtomicUsize,
}

/// Possible piece manager errors.
#[derive(Debug, PartialEq, Eq)]
pub enum AtomicPieceManagerError {
    PoisonedPieceLock,
    InvalidPieceIndex,
}

impl AtomicPieceManager {
    /// Creates a new `AtomicPieceManager` from a torrent's `Info`.
    pub fn new(info: &Info) -> Self {
        let total_pieces = info.total_pieces();
        let mut pieces = HashMap::new();
        for index in 0..total_pieces {
            pieces.insert(index, PieceState::new(info.piece_size(index)));
        }

        Self {
            pieces_hash: info.pieces.clone(),
            total_pieces,
            table: Mutex::new(PieceTable {
                pieces,
                completed: HashMap::new(),
            }),
            finished_pieces: AtomicUsize::new(0),
        }
    }

    /// Picks the next block to request and reserves it for `session_id`.
    ///
    /// Pieces are scanned in ascending index order and offsets in ascending
    /// order within the first incomplete piece; the first offset that is
    /// neither received nor reserved wins. Returns `None` when every piece is
    /// complete or every remaining block is already in flight.
    ///
    /// # Errors
    /// - `PoisonedPieceLock` if the piece table lock is poisoned.
    pub fn next_request(
        &self,
        session_id: usize,
    ) -> Result<Option<BlockRequest>, AtomicPieceManagerError> {
        let mut table = self.lock_table()?;

        for index in 0..self.total_pieces {
            let piece = match table.pieces.get_mut(&index) {
                Some(piece) => piece,
                None => continue,
            };
            if piece.complete {
                continue;
            }

            let mut offset = 0u64;
            while offset < piece.expected_length {
                let offset32 = offset as u32;
                if !piece.blocks.contains_key(&offset32)
                    && !piece.requested.contains_key(&offset32)
                {
                    piece.requested.insert(offset32, session_id);
                    let length = u64::min(BLOCK_SIZE as u64, piece.expected_length - offset) as u32;
                    return Ok(Some(BlockRequest {
                        piece_index: index,
                        offset: offset32,
                        length,
                    }));
                }
                offset += BLOCK_SIZE as u64;
            }
        }
        Ok(None)
    }

    /// Deposits a received block.
    ///
    /// Duplicate offsets overwrite silently. Once the received bytes reach
    /// the piece's expected length the blocks are concatenated in ascending
    /// offset order and SHA-1 verified: a match moves the piece into the
    /// completion ledger and frees its working state, a mismatch clears the
    /// piece so its blocks can be requested again.
    ///
    /// # Errors
    /// - `PoisonedPieceLock` if the piece table lock is poisoned.
    /// - `InvalidPieceIndex` if the index is out of range.
    pub fn mark_block_received(
        &self,
        piece_index: u32,
        offset: u32,
        block: Vec<u8>,
    ) -> Result<(), AtomicPieceManagerError> {
        let mut guard = self.lock_table()?;
        let table = &mut *guard;

        let piece = table
            .pieces
            .get_mut(&piece_index)
            .ok_or(AtomicPieceManagerError::InvalidPieceIndex)?;

        // A block for an already verified piece is a late duplicate.
        if piece.complete {
            return Ok(());
        }

        piece.requested.remove(&offset);
        piece.blocks.insert(offset, block);

        if piece.received_bytes() < piece.expected_length {
            return Ok(());
        }

        let mut offsets: Vec<u32> = piece.blocks.keys().copied().collect();
        offsets.sort_unstable();
        let mut assembled = Vec::with_capacity(piece.expected_length as usize);
        for offset in offsets {
            assembled.extend_from_slice(&piece.blocks[&offset]);
        }

        let start = piece_index as usize * 20;
        let expected_hash = &self.pieces_hash[start..start + 20];
        let actual_hash: [u8; 20] = Sha1::digest(&assembled).into();

        if actual_hash.as_slice() == expected_hash {
            info!("piece {} verified", piece_index);
            piece.complete = true;
            piece.reset();
            table.completed.insert(piece_index, assembled);
            self.finished_pieces.fetch_add(1, Ordering::Relaxed);
        } else {
            warn!("piece {} failed verification, re-queued", piece_index);
            piece.reset();
        }
        Ok(())
    }

    /// Drops every in-flight reservation held by `session_id`.
    ///
    /// Called when a session terminates so that blocks it reserved but never
    /// delivered go back to the pool instead of staying stranded.
    ///
    /// # Errors
    /// - `PoisonedPieceLock` if the piece table lock is poisoned.
    pub fn release_session(&self, session_id: usize) -> Result<(), AtomicPieceManagerError> {
        let mut table = self.lock_table()?;
        for piece in table.pieces.values_mut() {
            piece.requested.retain(|_, owner| *owner != session_id);
        }
        Ok(())
    }

    /// Returns true when one specific piece has been verified. Stays true
    /// even after the piece bytes were drained with `take_piece`.
    ///
    /// # Errors
    /// - `PoisonedPieceLock` if the piece table lock is poisoned.
    /// - `InvalidPieceIndex` if the index is out of range.
    pub fn is_piece_complete(&self, piece_index: u32) -> Result<bool, AtomicPieceManagerError> {
        let table = self.lock_table()?;
        table
            .pieces
            .get(&piece_index)
            .map(|piece| piece.complete)
            .ok_or(AtomicPieceManagerError::InvalidPieceIndex)
    }

    /// Returns true when every piece has been verified.
    pub fn is_complete(&self) -> bool {
        self.finished_pieces.load(Ordering::Relaxed) == self.total_pieces as usize
    }

    /// Returns the number of verified pieces.
    pub fn downloaded_pieces(&self) -> usize {
        self.finished_pieces.load(Ordering::Relaxed)
    }

    /// Returns the number of pieces of the torrent.
    pub fn total_pieces(&self) -> u32 {
        self.total_pieces
    }

    /// Removes and returns a verified piece from the completion ledger.
    ///
    /// # Errors
    /// - `PoisonedPieceLock` if the piece table lock is poisoned.
    pub fn take_piece(&self, piece_index: u32) -> Result<Option<Vec<u8>>, AtomicPieceManagerError> {
        let mut table = self.lock_table()?;
        Ok(table.completed.remove(&piece_index))
    }

    fn lock_table(&self) -> Result<MutexGuard<PieceTable>, AtomicPieceManagerError> {
        self.table
            .lock()
            .map_err(|_| AtomicPieceManagerError::PoisonedPieceLock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn test_requests_are_lowest_index_lowest_offset_first() {
        let manager = create_test_manager(&[vec![0u8; 40000]]);

        let first = manager.next_request(1).unwrap().unwrap();
        let second = manager.next_request(1).unwrap().unwrap();
        let third = manager.next_request(1).unwrap().unwrap();

        assert_eq!(first, block_request(0, 0, BLOCK_SIZE));
        assert_eq!(second, block_request(0, BLOCK_SIZE, BLOCK_SIZE));
        // 40000 - 2 * 16384 = 7232 bytes remain in the trailing block.
        assert_eq!(third, block_request(0, 2 * BLOCK_SIZE, 7232));
        assert_eq!(manager.next_request(1).unwrap(), None);
    }

    #[test]
    fn test_short_final_block_of_final_piece() {
        let manager = create_test_manager(&[vec![1u8; 32768], vec![2u8; 4]]);

        // Skip over piece 0.
        manager.next_request(1).unwrap().unwrap();
        manager.next_request(1).unwrap().unwrap();

        let last = manager.next_request(1).unwrap().unwrap();
        assert_eq!(last, block_request(1, 0, 4));
    }

    #[test]
    fn test_deposit_verifies_and_completes() {
        let piece: Vec<u8> = (0..40000u32).map(|i| (i % 251) as u8).collect();
        let manager = create_test_manager(&[piece.clone()]);

        manager
            .mark_block_received(0, 0, piece[..16384].to_vec())
            .unwrap();
        manager
            .mark_block_received(0, 16384, piece[16384..32768].to_vec())
            .unwrap();
        assert!(!manager.is_complete());

        manager
            .mark_block_received(0, 32768, piece[32768..].to_vec())
            .unwrap();

        assert!(manager.is_complete());
        assert_eq!(manager.downloaded_pieces(), 1);
        assert_eq!(manager.take_piece(0).unwrap(), Some(piece));
        assert_eq!(manager.take_piece(0).unwrap(), None);
    }

    #[test]
    fn test_hash_mismatch_reopens_the_piece() {
        let piece = vec![9u8; 16384];
        let manager = create_test_manager(&[piece.clone()]);

        let request = manager.next_request(1).unwrap().unwrap();
        manager
            .mark_block_received(0, request.offset, vec![0u8; 16384])
            .unwrap();

        assert!(!manager.is_complete());
        // The corrupt delivery is discarded and the offset is offered again.
        let retry = manager.next_request(2).unwrap().unwrap();
        assert_eq!(retry, request);

        manager.mark_block_received(0, retry.offset, piece).unwrap();
        assert!(manager.is_complete());
    }

    #[test]
    fn test_duplicate_deposits_overwrite() {
        let piece: Vec<u8> = (0..20000u32).map(|i| (i % 13) as u8).collect();
        let manager = create_test_manager(&[piece.clone()]);

        manager
            .mark_block_received(0, 0, vec![7u8; 16384])
            .unwrap();
        manager
            .mark_block_received(0, 0, piece[..16384].to_vec())
            .unwrap();
        manager
            .mark_block_received(0, 16384, piece[16384..].to_vec())
            .unwrap();

        assert!(manager.is_complete());
    }

    #[test]
    fn test_invalid_piece_index() {
        let manager = create_test_manager(&[vec![0u8; 4]]);
        assert_eq!(
            manager.mark_block_received(5, 0, vec![]).unwrap_err(),
            AtomicPieceManagerError::InvalidPieceIndex
        );
    }

    #[test]
    fn test_all_blocks_in_flight_returns_none() {
        let manager = create_test_manager(&[vec![0u8; 4]]);

        assert!(manager.next_request(1).unwrap().is_some());
        assert_eq!(manager.next_request(2).unwrap(), None);
        assert!(!manager.is_complete());
    }

    #[test]
    fn test_release_session_reopens_reserved_blocks() {
        let manager = create_test_manager(&[vec![0u8; 16384], vec![0u8; 16384]]);

        let reserved_a = manager.next_request(1).unwrap().unwrap();
        let reserved_b = manager.next_request(2).unwrap().unwrap();
        assert_eq!(manager.next_request(3).unwrap(), None);

        manager.release_session(1).unwrap();

        // Session 1's reservation is back in the pool, session 2's is not.
        let reoffered = manager.next_request(3).unwrap().unwrap();
        assert_eq!(reoffered, reserved_a);
        assert_ne!(reoffered, reserved_b);
        assert_eq!(manager.next_request(3).unwrap(), None);
    }

    #[test]
    fn test_completed_piece_ignores_late_blocks() {
        let piece = vec![3u8; 100];
        let manager = create_test_manager(&[piece.clone()]);

        manager.mark_block_received(0, 0, piece.clone()).unwrap();
        assert!(manager.is_complete());

        manager.mark_block_received(0, 0, vec![0u8; 100]).unwrap();
        assert!(manager.is_complete());
        assert_eq!(manager.take_piece(0).unwrap(), Some(piece));
    }

    #[test]
    fn test_multiple_threads_depositing() {
        let pieces: Vec<Vec<u8>> = (0..10u8).map(|i| vec![i; 5000]).collect();
        let manager = Arc::new(create_test_manager(&pieces));
        let mut joins = Vec::new();

        for (index, piece) in pieces.into_iter().enumerate() {
            let manager_cloned = manager.clone();
            let join = thread::spawn(move || {
                manager_cloned
                    .mark_block_received(index as u32, 0, piece)
                    .unwrap();
            });
            joins.push(join);
        }
        for join in joins {
            join.join().unwrap();
        }

        assert!(manager.is_complete());
        assert_eq!(manager.downloaded_pieces(), 10);
    }

    // Auxiliary functions

    fn block_request(piece_index: u32, offset: u32, length: u32) -> BlockRequest {
        BlockRequest {
            piece_index,
            offset,
            length,
        }
    }

    /// Builds an `Info` whose piece hashes match the given piece contents.
    /// All pieces but the last must share one length.
    fn create_test_manager(pieces: &[Vec<u8>]) -> AtomicPieceManager {
        let piece_length = pieces[0].len() as u64;
        let total_length: u64 = pieces.iter().map(|p| p.len() as u64).sum();
        let mut hashes = Vec::new();
        for piece in pieces {
            let digest: [u8; 20] = Sha1::digest(piece).into();
            hashes.extend_from_slice(&digest);
        }

        let info = Info {
            name: "test".to_string(),
            piece_length,
            pieces: hashes,
            length: Some(total_length),
            files: None,
        };
        AtomicPieceManager::new(&info)
    }
}
