//! Netstring encoding/decoding
//!
//! Wire format: `<decimal byte length>:<payload>,`
//! The trailing comma must sit exactly at the declared length.
//! Maximum frame size: 1MB (sanity limit)

use crate::error::{Error, Result};

/// Maximum allowed payload size (1MB)
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Longest length prefix accepted before the `:` separator
const MAX_PREFIX_DIGITS: usize = 7;

/// Encode a payload as a netstring
pub fn encode(payload: &str) -> String {
    format!("{}:{},", payload.len(), payload)
}

/// Decode exactly one complete netstring, returning its payload
pub fn decode(frame: &str) -> Result<&str> {
    match parse_header(frame.as_bytes())? {
        Some((start, len)) => {
            let end = start + len;
            if end + 1 != frame.len() {
                return Err(Error::Framing(format!(
                    "trailing data after declared length {}: {}",
                    len, frame
                )));
            }
            frame
                .get(start..end)
                .ok_or_else(|| Error::Framing(format!("payload is not valid text: {}", frame)))
        }
        None if frame.contains(':') => Err(Error::Framing(format!(
            "netstring has wrong length prefix: {}",
            frame
        ))),
        None => Err(Error::Framing(format!("missing ':' separator: {}", frame))),
    }
}

/// Split the first complete netstring off the front of `buf`.
///
/// Returns the payload and the number of bytes consumed, or `None` when more
/// bytes are needed. Malformed input fails immediately.
pub fn split_frame(buf: &[u8]) -> Result<Option<(String, usize)>> {
    let Some((start, len)) = parse_header(buf)? else {
        return Ok(None);
    };

    let payload = std::str::from_utf8(&buf[start..start + len])
        .map_err(|e| Error::Framing(format!("payload is not valid UTF-8: {}", e)))?;

    Ok(Some((payload.to_string(), start + len + 1)))
}

/// Validate the length prefix and trailing comma.
///
/// Returns the payload offset and length once the whole frame is in `buf`.
fn parse_header(buf: &[u8]) -> Result<Option<(usize, usize)>> {
    let colon = match buf.iter().position(|&b| b == b':') {
        Some(colon) => colon,
        None => {
            // Still waiting for the separator; reject anything that cannot
            // become a length prefix.
            if buf.iter().any(|b| !b.is_ascii_digit()) {
                return Err(Error::Framing(format!(
                    "missing ':' separator: {}",
                    String::from_utf8_lossy(buf)
                )));
            }
            if buf.len() > MAX_PREFIX_DIGITS {
                return Err(Error::Framing("length prefix too long".into()));
            }
            return Ok(None);
        }
    };

    let prefix = &buf[..colon];
    if prefix.is_empty() || !prefix.iter().all(u8::is_ascii_digit) {
        return Err(Error::Framing(format!(
            "non-numeric length prefix: {}",
            String::from_utf8_lossy(prefix)
        )));
    }
    if prefix.len() > MAX_PREFIX_DIGITS {
        return Err(Error::Framing("length prefix too long".into()));
    }

    // Digits only and bounded in length, so this cannot fail or overflow.
    let len: usize = std::str::from_utf8(prefix)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::Framing("unreadable length prefix".into()))?;

    if len > MAX_FRAME_SIZE {
        return Err(Error::Framing(format!(
            "frame too large: {} bytes (max {})",
            len, MAX_FRAME_SIZE
        )));
    }

    let start = colon + 1;
    let comma = start + len;
    if buf.len() <= comma {
        return Ok(None);
    }
    if buf[comma] != b',' {
        return Err(Error::Framing(format!(
            "netstring has wrong length prefix: {}",
            String::from_utf8_lossy(buf)
        )));
    }

    Ok(Some((start, len)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        assert_eq!(encode("C GRNVS V:1.0"), "13:C GRNVS V:1.0,");
        assert_eq!(encode(""), "0:,");
    }

    #[test]
    fn test_decode_correct() {
        assert_eq!(decode("1:A,").unwrap(), "A");
        assert_eq!(decode("0:,").unwrap(), "");
    }

    #[test]
    fn test_roundtrip_with_separators_in_payload() {
        for payload in ["S GRNVS V:1.0", "D a,b:c", "T ,,,", "D grüße"] {
            assert_eq!(decode(&encode(payload)).unwrap(), payload);
        }
    }

    #[test]
    fn test_decode_wrong_length() {
        assert!(matches!(decode("2:A,"), Err(Error::Framing(_))));
        assert!(matches!(decode("1:AB,"), Err(Error::Framing(_))));
    }

    #[test]
    fn test_decode_missing_separator() {
        assert!(matches!(decode("A"), Err(Error::Framing(_))));
    }

    #[test]
    fn test_decode_non_numeric_prefix() {
        assert!(matches!(decode("x:A,"), Err(Error::Framing(_))));
        assert!(matches!(decode(":A,"), Err(Error::Framing(_))));
        assert!(matches!(decode("-1:A,"), Err(Error::Framing(_))));
    }

    #[test]
    fn test_decode_rejects_trailing_data() {
        assert!(matches!(decode("1:A,1:B,"), Err(Error::Framing(_))));
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let frame = format!("{}:", MAX_FRAME_SIZE + 1);
        assert!(split_frame(frame.as_bytes()).is_err());
    }

    #[test]
    fn test_split_waits_for_more_bytes() {
        assert!(split_frame(b"").unwrap().is_none());
        assert!(split_frame(b"13").unwrap().is_none());
        assert!(split_frame(b"13:S GRNVS").unwrap().is_none());
        assert!(split_frame(b"3:ACK").unwrap().is_none());
    }

    #[test]
    fn test_split_leaves_following_frame() {
        let buf = b"5:S abc,5:S ACK,";
        let (payload, used) = split_frame(buf).unwrap().unwrap();
        assert_eq!(payload, "S abc");
        assert_eq!(used, 8);

        let (payload, used) = split_frame(&buf[used..]).unwrap().unwrap();
        assert_eq!(payload, "S ACK");
        assert_eq!(used, 8);
    }

    #[test]
    fn test_split_rejects_misplaced_comma() {
        assert!(split_frame(b"1:AB,").is_err());
        assert!(split_frame(b"hello").is_err());
    }
}
