use std::{
    fs::File,
    io::{BufReader, Error, Read},
};

use sha1::{Digest, Sha1};

use super::torrent::{FromTorrentError, Torrent};
use bencoder::bencode::{Bencode, BencodeError};

#[derive(Debug)]
pub enum ParseError {
    IoError(Error),
    BencodeError(BencodeError),
    FromTorrentError(FromTorrentError),
    MissingInfoDict,
}

pub struct TorrentParser;

impl TorrentParser {
    /// Given a path to a torrent file, parses it and returns a Torrent struct.
    ///
    /// The info hash is the SHA-1 of the raw byte span the `info` value
    /// occupies in the file, located with a span-aware decode. Re-encoding
    /// the parsed dictionary could reorder keys and change the hash, so the
    /// bytes are never round-tripped.
    ///
    /// # Errors
    ///
    /// * `ParseError::IoError` - the file could not be read
    /// * `ParseError::BencodeError` - the bencode is malformed
    /// * `ParseError::MissingInfoDict` - the top level has no `info` key
    /// * `ParseError::FromTorrentError` - a required key is missing or mistyped
    pub fn parse(filepath: &str) -> Result<Torrent, ParseError> {
        let buffer = TorrentParser::read_file(filepath).map_err(ParseError::IoError)?;

        let bencode = Bencode::decode(&buffer).map_err(ParseError::BencodeError)?;

        let info_span = TorrentParser::info_span(&buffer)?;
        let info_hash: [u8; 20] = Sha1::digest(info_span).into();

        Torrent::from(&bencode, info_hash).map_err(ParseError::FromTorrentError)
    }

    fn read_file(filepath: &str) -> Result<Vec<u8>, Error> {
        let file = File::open(filepath)?;
        let mut reader = BufReader::new(file);
        let mut buffer = Vec::new();

        reader.read_to_end(&mut buffer)?;

        Ok(buffer)
    }

    /// Walks the entries of the top-level dictionary and returns the byte
    /// slice holding the value of the `info` key, exactly as parsed.
    fn info_span(data: &[u8]) -> Result<&[u8], ParseError> {
        if data.first() != Some(&b'd') {
            return Err(ParseError::MissingInfoDict);
        }

        let mut i = 1;
        while data.get(i) != Some(&b'e') {
            let (key, size) =
                Bencode::decode_prefix(&data[i..]).map_err(ParseError::BencodeError)?;
            i += size;
            let (_, size) = Bencode::decode_prefix(&data[i..]).map_err(ParseError::BencodeError)?;
            if matches!(&key, Bencode::BString(k) if k == b"info") {
                return Ok(&data[i..i + size]);
            }
            i += size;
        }
        Err(ParseError::MissingInfoDict)
    }
}
