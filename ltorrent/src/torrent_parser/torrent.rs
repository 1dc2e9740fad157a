use bencoder::bencode::Bencode;

use super::info::{FromInfoError, Info};

/// A fully decoded metainfo file.
///
/// `info_hash` is the SHA-1 of the exact bytes the `info` dictionary occupied
/// in the input, computed by the parser before any re-encoding can disturb
/// the key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Torrent {
    pub announce_url: String,
    pub info: Info,
    pub info_hash: [u8; 20],
}

#[derive(Debug, PartialEq, Eq)]
pub enum FromTorrentError {
    MissingAnnounce,
    MissingInfo,
    FromInfoError(FromInfoError),
    NotADict,
}

impl Torrent {
    pub fn from(bencode: &Bencode, info_hash: [u8; 20]) -> Result<Torrent, FromTorrentError> {
        let mut announce_url = None;
        let mut info = None;

        let d = match bencode {
            Bencode::BDict(d) => d,
            _ => return Err(FromTorrentError::NotADict),
        };

        for (k, v) in d.iter() {
            if k == b"announce" {
                announce_url = Some(Torrent::create_announce(v)?);
            } else if k == b"info" {
                info = Some(Info::from(v).map_err(FromTorrentError::FromInfoError)?);
            }
        }

        Ok(Torrent {
            announce_url: announce_url.ok_or(FromTorrentError::MissingAnnounce)?,
            info: info.ok_or(FromTorrentError::MissingInfo)?,
            info_hash,
        })
    }

    fn create_announce(bencode: &Bencode) -> Result<String, FromTorrentError> {
        let announce_url = match bencode {
            Bencode::BString(s) => s,
            _ => return Err(FromTorrentError::MissingAnnounce),
        };

        String::from_utf8(announce_url.to_vec()).map_err(|_| FromTorrentError::MissingAnnounce)
    }

    /// Returns the name of the torrent.
    pub fn name(&self) -> String {
        self.info.name.clone()
    }

    /// Returns the number of pieces of the torrent.
    pub fn total_pieces(&self) -> u32 {
        self.info.total_pieces()
    }

    /// Returns the total content length in bytes.
    pub fn total_length(&self) -> u64 {
        self.info.total_length()
    }
}
