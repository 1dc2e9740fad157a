use bencoder::bencode::Bencode;

/// One entry of a multi-file torrent: its length and the path components
/// below the torrent's root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentFile {
    pub length: u64,
    pub path: Vec<String>,
}

/// The decoded `info` dictionary of a metainfo file.
///
/// Exactly one of `length` (single-file mode) and `files` (multi-file mode)
/// is present; `Info::from` rejects everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    pub name: String,
    pub piece_length: u64,
    pub pieces: Vec<u8>,
    pub length: Option<u64>,
    pub files: Option<Vec<TorrentFile>>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum FromInfoError {
    MissingName,
    MissingPieceLength,
    InvalidPieceLength,
    MissingPieces,
    InvalidPieces,
    MissingFileMode,
    ConflictingFileModes,
    InvalidLength,
    InvalidFileEntry,
    NotADict,
}

impl Info {
    pub fn from(bencode: &Bencode) -> Result<Info, FromInfoError> {
        let mut name = None;
        let mut piece_length = None;
        let mut pieces = None;
        let mut length = None;
        let mut files = None;

        let d = match bencode {
            Bencode::BDict(d) => d,
            _ => return Err(FromInfoError::NotADict),
        };

        for (k, v) in d.iter() {
            if k == b"name" {
                name = Some(Info::create_name(v)?);
            } else if k == b"piece length" {
                piece_length = Some(Info::create_piece_length(v)?);
            } else if k == b"pieces" {
                pieces = Some(Info::create_pieces(v)?);
            } else if k == b"length" {
                length = Some(Info::create_length(v)?);
            } else if k == b"files" {
                files = Some(Info::create_files(v)?);
            }
        }

        if length.is_some() && files.is_some() {
            return Err(FromInfoError::ConflictingFileModes);
        }
        if length.is_none() && files.is_none() {
            return Err(FromInfoError::MissingFileMode);
        }

        Ok(Info {
            name: name.ok_or(FromInfoError::MissingName)?,
            piece_length: piece_length.ok_or(FromInfoError::MissingPieceLength)?,
            pieces: pieces.ok_or(FromInfoError::MissingPieces)?,
            length,
            files,
        })
    }

    fn create_name(bencode: &Bencode) -> Result<String, FromInfoError> {
        let name = match bencode {
            Bencode::BString(s) => s,
            _ => return Err(FromInfoError::MissingName),
        };

        String::from_utf8(name.to_vec()).map_err(|_| FromInfoError::MissingName)
    }

    fn create_piece_length(bencode: &Bencode) -> Result<u64, FromInfoError> {
        let n = match bencode {
            Bencode::BNumber(n) => *n,
            _ => return Err(FromInfoError::MissingPieceLength),
        };
        if n <= 0 {
            return Err(FromInfoError::InvalidPieceLength);
        }
        Ok(n as u64)
    }

    fn create_pieces(bencode: &Bencode) -> Result<Vec<u8>, FromInfoError> {
        let pieces = match bencode {
            Bencode::BString(s) => s.to_vec(),
            _ => return Err(FromInfoError::MissingPieces),
        };
        // Concatenated 20-byte SHA-1 digests, one per piece.
        if pieces.is_empty() || pieces.len() % 20 != 0 {
            return Err(FromInfoError::InvalidPieces);
        }
        Ok(pieces)
    }

    fn create_length(bencode: &Bencode) -> Result<u64, FromInfoError> {
        match bencode {
            Bencode::BNumber(n) if *n >= 0 => Ok(*n as u64),
            _ => Err(FromInfoError::InvalidLength),
        }
    }

    fn create_files(bencode: &Bencode) -> Result<Vec<TorrentFile>, FromInfoError> {
        let list = match bencode {
            Bencode::BList(l) => l,
            _ => return Err(FromInfoError::InvalidFileEntry),
        };

        let mut files = Vec::with_capacity(list.len());
        for entry in list {
            files.push(Info::create_file_entry(entry)?);
        }
        Ok(files)
    }

    fn create_file_entry(bencode: &Bencode) -> Result<TorrentFile, FromInfoError> {
        let d = match bencode {
            Bencode::BDict(d) => d,
            _ => return Err(FromInfoError::InvalidFileEntry),
        };

        let length = match d.get(b"length".as_slice()) {
            Some(v) => Info::create_length(v)?,
            None => return Err(FromInfoError::InvalidFileEntry),
        };

        let components = match d.get(b"path".as_slice()) {
            Some(Bencode::BList(l)) => l,
            _ => return Err(FromInfoError::InvalidFileEntry),
        };

        let mut path = Vec::with_capacity(components.len());
        for component in components {
            match component {
                Bencode::BString(s) => path.push(
                    String::from_utf8(s.to_vec()).map_err(|_| FromInfoError::InvalidFileEntry)?,
                ),
                _ => return Err(FromInfoError::InvalidFileEntry),
            }
        }
        if path.is_empty() {
            return Err(FromInfoError::InvalidFileEntry);
        }

        Ok(TorrentFile { length, path })
    }

    /// Total number of content bytes across all files.
    pub fn total_length(&self) -> u64 {
        match (&self.length, &self.files) {
            (Some(length), _) => *length,
            (None, Some(files)) => files.iter().map(|f| f.length).sum(),
            (None, None) => 0,
        }
    }

    /// Number of pieces, derived from the hash list.
    pub fn total_pieces(&self) -> u32 {
        (self.pieces.len() / 20) as u32
    }

    /// Expected byte length of a piece. Every piece is `piece_length` long
    /// except the last, which holds whatever remains.
    pub fn piece_size(&self, index: u32) -> u64 {
        let total_pieces = self.total_pieces();
        if index + 1 < total_pieces {
            self.piece_length
        } else {
            self.total_length() - self.piece_length * (total_pieces as u64 - 1)
        }
    }
}
