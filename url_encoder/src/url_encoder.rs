/// Percent-encodes a binary value for use in a URL query string.
///
/// Every byte is escaped as `%XX`, with no safe-character exceptions, so the
/// output is valid for arbitrary binary values such as a raw info hash.
pub fn encode(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len() * 3);
    for b in bytes {
        encoded.push('%');
        encoded.push_str(&format!("{:02X}", b));
    }
    encoded
}
