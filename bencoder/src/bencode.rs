use std::collections::BTreeMap;

#[derive(PartialEq, Debug, Clone)]
pub enum Bencode {
    BNumber(i64),
    BString(Vec<u8>),
    BList(Vec<Bencode>),
    BDict(BTreeMap<Vec<u8>, Bencode>),
}

#[derive(PartialEq, Debug)]
pub enum BencodeError {
    UnexpectedEnd,
    InvalidBencodeType,
    InvalidBencodeNumber,
    InvalidBencodeString,
    InvalidBencodeDict,
}

pub trait ToBencode {
    fn to_bencode(&self) -> Bencode;
}

impl ToBencode for String {
    fn to_bencode(&self) -> Bencode {
        Bencode::BString(self.as_bytes().to_vec())
    }
}

impl ToBencode for i64 {
    fn to_bencode(&self) -> Bencode {
        Bencode::BNumber(*self)
    }
}

impl ToBencode for u64 {
    fn to_bencode(&self) -> Bencode {
        Bencode::BNumber((*self) as i64)
    }
}

impl ToBencode for Vec<u8> {
    fn to_bencode(&self) -> Bencode {
        Bencode::BString(self.clone())
    }
}

impl ToBencode for BTreeMap<Vec<u8>, Bencode> {
    fn to_bencode(&self) -> Bencode {
        Bencode::BDict(self.clone())
    }
}

impl<T: ToBencode> ToBencode for Vec<T> {
    fn to_bencode(&self) -> Bencode {
        Bencode::BList(self.iter().map(|s| s.to_bencode()).collect())
    }
}

impl Bencode {
    /// Parses a bencoded byte slice into a Bencode enum.
    ///
    /// # Example
    ///
    /// ```rust
    /// use bencoder::bencode::Bencode;
    ///
    /// let bencode = Bencode::decode(b"5:hello").unwrap();
    /// assert_eq!(bencode, Bencode::BString(b"hello".to_vec()));
    ///
    /// let bencode = Bencode::decode(b"i123e").unwrap();
    /// assert_eq!(bencode, Bencode::BNumber(123));
    /// ```
    pub fn decode(data: &[u8]) -> Result<Bencode, BencodeError> {
        let (bencode, _) = Bencode::decode_prefix(data)?;
        Ok(bencode)
    }

    /// Parses the first complete bencoded value in `data`, returning it
    /// together with the number of bytes it occupies. The consumed length
    /// lets callers locate the exact byte span of a nested value, which
    /// matters when that span must be hashed as parsed.
    pub fn decode_prefix(data: &[u8]) -> Result<(Bencode, usize), BencodeError> {
        match data.first().copied() {
            Some(b'i') => Bencode::decode_number(data),
            Some(b'l') => Bencode::decode_list(data),
            Some(b'd') => Bencode::decode_dict(data),
            Some(b'0'..=b'9') => Bencode::decode_string(data),
            Some(_) => Err(BencodeError::InvalidBencodeType),
            None => Err(BencodeError::UnexpectedEnd),
        }
    }

    fn decode_string(data: &[u8]) -> Result<(Bencode, usize), BencodeError> {
        let colon = data
            .iter()
            .position(|b| *b == b':')
            .ok_or(BencodeError::UnexpectedEnd)?;
        let length = std::str::from_utf8(&data[..colon])
            .map_err(|_| BencodeError::InvalidBencodeString)?
            .parse::<usize>()
            .map_err(|_| BencodeError::InvalidBencodeString)?;
        let start = colon + 1;
        let end = start + length;
        if data.len() < end {
            return Err(BencodeError::UnexpectedEnd);
        }
        Ok((Bencode::BString(data[start..end].to_vec()), end))
    }

    fn decode_number(data: &[u8]) -> Result<(Bencode, usize), BencodeError> {
        let end = data
            .iter()
            .position(|b| *b == b'e')
            .ok_or(BencodeError::UnexpectedEnd)?;
        let number = std::str::from_utf8(&data[1..end])
            .map_err(|_| BencodeError::InvalidBencodeNumber)?
            .parse::<i64>()
            .map_err(|_| BencodeError::InvalidBencodeNumber)?;
        Ok((Bencode::BNumber(number), end + 1))
    }

    fn decode_list(data: &[u8]) -> Result<(Bencode, usize), BencodeError> {
        let mut i = 1;
        let mut list = Vec::new();
        loop {
            match data.get(i).copied() {
                Some(b'e') => return Ok((Bencode::BList(list), i + 1)),
                Some(_) => {
                    let (value, size) = Bencode::decode_prefix(&data[i..])?;
                    list.push(value);
                    i += size;
                }
                None => return Err(BencodeError::UnexpectedEnd),
            }
        }
    }

    fn decode_dict(data: &[u8]) -> Result<(Bencode, usize), BencodeError> {
        let mut i = 1;
        let mut dict = BTreeMap::new();
        loop {
            match data.get(i).copied() {
                Some(b'e') => return Ok((Bencode::BDict(dict), i + 1)),
                Some(_) => {
                    let (key, size) = Bencode::decode_prefix(&data[i..])?;
                    i += size;
                    let (value, size) = Bencode::decode_prefix(&data[i..])?;
                    i += size;
                    match key {
                        Bencode::BString(key) => dict.insert(key, value),
                        _ => return Err(BencodeError::InvalidBencodeDict),
                    };
                }
                None => return Err(BencodeError::UnexpectedEnd),
            }
        }
    }

    /// Encodes a Bencode enum into a bencoded vec of bytes.
    ///
    /// # Example
    ///
    /// ```rust
    /// use bencoder::bencode::Bencode;
    ///
    /// let encoded = Bencode::encode(&String::from("spam"));
    /// assert_eq!(encoded, b"4:spam");
    ///
    /// let encoded = Bencode::encode(&123i64);
    /// assert_eq!(encoded, b"i123e");
    /// ```
    pub fn encode(bencode: &dyn ToBencode) -> Vec<u8> {
        Bencode::do_encode(bencode.to_bencode())
    }

    fn do_encode(bencode: Bencode) -> Vec<u8> {
        match bencode {
            Bencode::BNumber(n) => Bencode::encode_number(n),
            Bencode::BString(s) => Bencode::encode_string(s),
            Bencode::BList(l) => Bencode::encode_list(l),
            Bencode::BDict(d) => Bencode::encode_dict(d),
        }
    }

    fn encode_number(n: i64) -> Vec<u8> {
        let mut encoded = vec![b'i'];
        encoded.extend(n.to_string().into_bytes());
        encoded.push(b'e');
        encoded
    }

    fn encode_string(s: Vec<u8>) -> Vec<u8> {
        let mut encoded = Vec::new();
        encoded.extend(s.len().to_string().into_bytes());
        encoded.push(b':');
        encoded.extend(s);
        encoded
    }

    fn encode_list(l: Vec<Bencode>) -> Vec<u8> {
        let mut encoded = vec![b'l'];
        for bencode in l {
            encoded.extend(Bencode::do_encode(bencode));
        }
        encoded.push(b'e');
        encoded
    }

    fn encode_dict(d: BTreeMap<Vec<u8>, Bencode>) -> Vec<u8> {
        let mut encoded = vec![b'd'];
        for (key, value) in d {
            encoded.extend(Bencode::do_encode(Bencode::BString(key)));
            encoded.extend(Bencode::do_encode(value));
        }
        encoded.push(b'e');
        encoded
    }
}
