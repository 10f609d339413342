//! Record key codec.
//!
//! Keys are 4-byte big-endian integers, the layout of Kafka's standard integer
//! serializer. Decoding also accepts a UTF-8 decimal string so hand-produced
//! records (e.g. `kcat -K:`) work.

pub fn encode_key(id: i32) -> [u8; 4] {
    id.to_be_bytes()
}

/// Decode a record key; a 4-byte key is always read as binary.
pub fn decode_key(bytes: &[u8]) -> Option<i32> {
    if let Ok(raw) = <[u8; 4]>::try_from(bytes) {
        return Some(i32::from_be_bytes(raw));
    }

    std::str::from_utf8(bytes).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_key() {
        assert_eq!(encode_key(1), [0, 0, 0, 1]);
        assert_eq!(decode_key(&encode_key(-42)), Some(-42));
    }

    #[test]
    fn test_decimal_key() {
        assert_eq!(decode_key(b"12345"), Some(12345));
        assert_eq!(decode_key(b" 7 "), Some(7));
    }

    #[test]
    fn test_garbage_key() {
        assert_eq!(decode_key(b""), None);
        assert_eq!(decode_key(b"abc"), None);
        assert_eq!(decode_key(&[0xff, 0xfe]), None);
    }
}
