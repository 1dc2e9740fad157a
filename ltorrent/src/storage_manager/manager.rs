use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::piece_manager::manager::{AtomicPieceManager, AtomicPieceManagerError};
use crate::torrent_parser::torrent::Torrent;

/// Possible assembly errors.
#[derive(Debug)]
pub enum AssembleError {
    /// A piece was not in the completion ledger. Nothing has been written
    /// when this is returned.
    MissingPiece(u32),
    IoError(std::io::Error),
    PieceManagerError(AtomicPieceManagerError),
}

/// Writes the finished download to disk.
///
/// Single-file mode produces `<output_dir>/<name>` holding the piece
/// concatenation. Multi-file mode produces a `<output_dir>/<name>/`
/// directory and slices the concatenation into the listed files at their
/// cumulative offsets, creating parent directories as needed.
///
/// The completion ledger is checked before any file is opened, so a missing
/// piece aborts without partial output.
pub fn assemble_torrent(
    torrent: &Torrent,
    piece_manager: &AtomicPieceManager,
    output_dir: &str,
) -> Result<(), AssembleError> {
    if !piece_manager.is_complete() {
        let missing = first_missing_piece(piece_manager)?;
        return Err(AssembleError::MissingPiece(missing));
    }

    match &torrent.info.files {
        None => assemble_single_file(torrent, piece_manager, output_dir),
        Some(_) => assemble_multi_file(torrent, piece_manager, output_dir),
    }
}

fn first_missing_piece(piece_manager: &AtomicPieceManager) -> Result<u32, AssembleError> {
    for index in 0..piece_manager.total_pieces() {
        let complete = piece_manager
            .is_piece_complete(index)
            .map_err(AssembleError::PieceManagerError)?;
        if !complete {
            return Ok(index);
        }
    }
    Ok(0)
}

fn assemble_single_file(
    torrent: &Torrent,
    piece_manager: &AtomicPieceManager,
    output_dir: &str,
) -> Result<(), AssembleError> {
    create_dir(Path::new(output_dir))?;
    let path = Path::new(output_dir).join(torrent.name());

    let mut file = open_output_file(&path)?;
    for index in 0..piece_manager.total_pieces() {
        let piece = take_piece(piece_manager, index)?;
        file.write_all(&piece).map_err(AssembleError::IoError)?;
    }

    info!("wrote {}", path.display());
    Ok(())
}

fn assemble_multi_file(
    torrent: &Torrent,
    piece_manager: &AtomicPieceManager,
    output_dir: &str,
) -> Result<(), AssembleError> {
    let root = Path::new(output_dir).join(torrent.name());
    create_dir(&root)?;

    let mut data = Vec::with_capacity(torrent.total_length() as usize);
    for index in 0..piece_manager.total_pieces() {
        data.extend_from_slice(&take_piece(piece_manager, index)?);
    }

    let files = torrent.info.files.as_deref().unwrap_or_default();
    let mut offset = 0usize;
    for entry in files {
        let mut path: PathBuf = root.clone();
        for component in &entry.path {
            path.push(component);
        }
        if let Some(parent) = path.parent() {
            create_dir(parent)?;
        }

        let length = entry.length as usize;
        let mut file = open_output_file(&path)?;
        file.write_all(&data[offset..offset + length])
            .map_err(AssembleError::IoError)?;
        offset += length;

        info!("wrote {}", path.display());
    }
    Ok(())
}

fn take_piece(
    piece_manager: &AtomicPieceManager,
    index: u32,
) -> Result<Vec<u8>, AssembleError> {
    piece_manager
        .take_piece(index)
        .map_err(AssembleError::PieceManagerError)?
        .ok_or(AssembleError::MissingPiece(index))
}

fn create_dir(path: &Path) -> Result<(), AssembleError> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(AssembleError::IoError)?;
    }
    Ok(())
}

fn open_output_file(path: &Path) -> Result<File, AssembleError> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(AssembleError::IoError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::torrent_parser::info::{Info, TorrentFile};
    use sha1::{Digest, Sha1};

    #[test]
    fn test_assemble_single_file() {
        let output_dir = test_dir("assemble_single_file");
        let pieces = vec![vec![0x11u8; 64], vec![0x22u8; 64], vec![0x33u8; 10]];
        let torrent = create_single_file_torrent("single.bin", &pieces);
        let manager = create_complete_manager(&torrent, &pieces);

        assemble_torrent(&torrent, &manager, &output_dir).unwrap();

        let written = fs::read(format!("{}/single.bin", output_dir)).unwrap();
        assert_eq!(written, pieces.concat());
        assert_eq!(written.len() as u64, torrent.total_length());

        fs::remove_dir_all(output_dir).unwrap();
    }

    #[test]
    fn test_assemble_multi_file_split() {
        let output_dir = test_dir("assemble_multi_file_split");
        // Two 16384-byte pieces split into 10000 + 22768 bytes.
        let content: Vec<u8> = (0..32768u32).map(|i| (i % 256) as u8).collect();
        let pieces = vec![content[..16384].to_vec(), content[16384..].to_vec()];
        let torrent = create_multi_file_torrent(
            "example",
            &pieces,
            vec![
                TorrentFile {
                    length: 10000,
                    path: vec!["a.txt".to_string()],
                },
                TorrentFile {
                    length: 22768,
                    path: vec!["dir".to_string(), "b.txt".to_string()],
                },
            ],
        );
        let manager = create_complete_manager(&torrent, &pieces);

        assemble_torrent(&torrent, &manager, &output_dir).unwrap();

        let first = fs::read(format!("{}/example/a.txt", output_dir)).unwrap();
        let second = fs::read(format!("{}/example/dir/b.txt", output_dir)).unwrap();
        assert_eq!(first, &content[..10000]);
        assert_eq!(second, &content[10000..]);

        fs::remove_dir_all(output_dir).unwrap();
    }

    #[test]
    fn test_missing_piece_writes_nothing() {
        let output_dir = test_dir("missing_piece_writes_nothing");
        let pieces = vec![vec![0x11u8; 64], vec![0x22u8; 64]];
        let torrent = create_single_file_torrent("partial.bin", &pieces);

        // Only the first piece arrives.
        let manager = AtomicPieceManager::new(&torrent.info);
        manager.mark_block_received(0, 0, pieces[0].clone()).unwrap();

        let result = assemble_torrent(&torrent, &manager, &output_dir);

        assert!(matches!(result, Err(AssembleError::MissingPiece(1))));
        assert!(!Path::new(&format!("{}/partial.bin", output_dir)).exists());
        if Path::new(&output_dir).exists() {
            fs::remove_dir_all(output_dir).unwrap();
        }
    }

    // Auxiliary functions

    fn test_dir(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("ltorrent_{}", name))
            .to_string_lossy()
            .to_string()
    }

    fn hashes_for(pieces: &[Vec<u8>]) -> Vec<u8> {
        let mut hashes = Vec::new();
        for piece in pieces {
            let digest: [u8; 20] = Sha1::digest(piece).into();
            hashes.extend_from_slice(&digest);
        }
        hashes
    }

    fn create_single_file_torrent(name: &str, pieces: &[Vec<u8>]) -> Torrent {
        let total_length: u64 = pieces.iter().map(|p| p.len() as u64).sum();
        Torrent {
            announce_url: "http://tracker/announce".to_string(),
            info: Info {
                name: name.to_string(),
                piece_length: pieces[0].len() as u64,
                pieces: hashes_for(pieces),
                length: Some(total_length),
                files: None,
            },
            info_hash: [0u8; 20],
        }
    }

    fn create_multi_file_torrent(
        name: &str,
        pieces: &[Vec<u8>],
        files: Vec<TorrentFile>,
    ) -> Torrent {
        Torrent {
            announce_url: "http://tracker/announce".to_string(),
            info: Info {
                name: name.to_string(),
                piece_length: pieces[0].len() as u64,
                pieces: hashes_for(pieces),
                length: None,
                files: Some(files),
            },
            info_hash: [0u8; 20],
        }
    }

    fn create_complete_manager(torrent: &Torrent, pieces: &[Vec<u8>]) -> AtomicPieceManager {
        let manager = AtomicPieceManager::new(&torrent.info);
        for (index, piece) in pieces.iter().enumerate() {
            manager
                .mark_block_received(index as u32, 0, piece.clone())
                .unwrap();
        }
        assert!(manager.is_complete());
        manager
    }
}
