//! QNAME decoding from DNS wire format.
//!
//! Only the first question's name is decoded, straight from the label
//! sequence that follows the fixed 12-byte DNS header. Compression pointers
//! are not recognised: a pointer byte is read as an (oversized) label
//! length, which ends in either an out-of-bounds or an overflow error.

use std::fmt;

use thiserror::Error;

/// Size of the fixed DNS message header (ID, flags, four counts).
pub const DNS_HEADER_SIZE: usize = 12;

/// Maximum decoded QNAME length in bytes, separators included.
pub const MAX_QNAME_LEN: usize = 256;

/// Errors produced while decoding a QNAME.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A length byte or label byte lies past the end of the payload.
    #[error("invalid packet: out of bounds at offset {offset}")]
    OutOfBounds { offset: usize },

    /// The decoded name would exceed [`MAX_QNAME_LEN`].
    #[error("buffer overflow: decoded name exceeds {MAX_QNAME_LEN} bytes")]
    BufferOverflow,
}

/// A decoded DNS question name, labels joined by `.`.
///
/// Stored as raw bytes: labels on the wire are not guaranteed to be ASCII,
/// and matching is a byte comparison anyway.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Qname {
    bytes: Vec<u8>,
}

impl Qname {
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The name as UTF-8, if it is.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True for the root name (a lone zero-length label).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Display for Qname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.bytes))
    }
}

impl fmt::Debug for Qname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Qname({:?})", String::from_utf8_lossy(&self.bytes))
    }
}

impl AsRef<[u8]> for Qname {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Decode the first question name of a DNS message.
///
/// `dns_payload` must start at the DNS header, i.e. right after the UDP
/// header.
pub fn decode(dns_payload: &[u8]) -> Result<Qname, DecodeError> {
    let mut pos = DNS_HEADER_SIZE;
    let mut bytes = Vec::with_capacity(64);

    loop {
        let Some(&len) = dns_payload.get(pos) else {
            return Err(DecodeError::OutOfBounds { offset: pos });
        };
        let len = usize::from(len);
        if len == 0 {
            break;
        }

        let separator = usize::from(!bytes.is_empty());
        if bytes.len() + separator + len > MAX_QNAME_LEN {
            return Err(DecodeError::BufferOverflow);
        }

        let start = pos + 1;
        let Some(label) = dns_payload.get(start..start + len) else {
            return Err(DecodeError::OutOfBounds {
                offset: dns_payload.len(),
            });
        };

        if separator == 1 {
            bytes.push(b'.');
        }
        bytes.extend_from_slice(label);
        pos = start + len;
    }

    Ok(Qname { bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A DNS message with a zeroed header and the given labels as QNAME,
    /// followed by QTYPE/QCLASS.
    fn message(labels: &[&[u8]]) -> Vec<u8> {
        let mut payload = vec![0u8; DNS_HEADER_SIZE];
        payload[5] = 1;
        for label in labels {
            payload.push(label.len() as u8);
            payload.extend_from_slice(label);
        }
        payload.push(0);
        payload.extend_from_slice(&[0, 1, 0, 1]);
        payload
    }

    #[test]
    fn should_decode_dotted_name() {
        let payload = message(&[b"www", b"example", b"com"]);
        let qname = decode(&payload).unwrap();

        assert_eq!(qname.as_bytes(), b"www.example.com");
        assert_eq!(qname.as_str(), Some("www.example.com"));
        assert_eq!(qname.to_string(), "www.example.com");
    }

    #[test]
    fn should_join_labels_for_varied_shapes() {
        let cases: &[&[&[u8]]] = &[
            &[b"a"],
            &[b"com"],
            &[b"a", b"b"],
            &[b"mail", b"corp", b"example", b"org"],
            &[&[b'x'; 63], &[b'y'; 63], b"net"],
            &[b"xn--bcher-kva", b"example"],
        ];

        for labels in cases {
            let payload = message(labels);
            let qname = decode(&payload).unwrap();

            let expected = labels.join(&b'.');
            let expected_len: usize =
                labels.iter().map(|l| l.len()).sum::<usize>() + labels.len() - 1;
            assert_eq!(qname.as_bytes(), expected.as_slice());
            assert_eq!(qname.len(), expected_len);
        }
    }

    #[test]
    fn should_decode_root_name_as_empty() {
        let payload = message(&[]);
        let qname = decode(&payload).unwrap();
        assert!(qname.is_empty());
    }

    #[test]
    fn should_fail_when_payload_ends_inside_header() {
        for len in 0..=DNS_HEADER_SIZE {
            let payload = vec![0u8; len];
            assert!(
                matches!(decode(&payload), Err(DecodeError::OutOfBounds { .. })),
                "len {len}"
            );
        }
    }

    #[test]
    fn should_fail_on_every_truncation_of_a_valid_name() {
        let payload = message(&[b"blocked", b"example", b"com"]);
        // QNAME ends at the zero byte; anything shorter is truncated
        let qname_end = DNS_HEADER_SIZE + 1 + 7 + 1 + 7 + 1 + 3;

        for len in 0..=qname_end {
            let truncated = &payload[..len];
            assert!(
                matches!(decode(truncated), Err(DecodeError::OutOfBounds { .. })),
                "len {len}"
            );
        }
        assert!(decode(&payload[..=qname_end]).is_ok());
    }

    #[test]
    fn should_fail_when_label_length_exceeds_payload() {
        let mut payload = vec![0u8; DNS_HEADER_SIZE];
        payload.extend_from_slice(&[10, b'a', b'b']);

        assert_eq!(
            decode(&payload),
            Err(DecodeError::OutOfBounds {
                offset: payload.len()
            })
        );
    }

    #[test]
    fn should_fail_when_name_exceeds_capacity() {
        // 5 labels of 63 bytes = 315 + 4 separators
        let label = [b'a'; 63];
        let payload = message(&[&label, &label, &label, &label, &label]);

        assert_eq!(decode(&payload), Err(DecodeError::BufferOverflow));
    }

    #[test]
    fn should_accept_name_of_exactly_max_length() {
        // 4 * 63 + 3 separators
        let label = [b'a'; 63];
        let payload = message(&[&label, &label, &label, &label]);
        assert_eq!(decode(&payload).unwrap().len(), 255);

        // 3 * 63 + 62 + 1 + 4 separators
        let short = [b'b'; 62];
        let payload = message(&[&label, &label, &label, &short, b"c"]);
        assert_eq!(decode(&payload).unwrap().len(), 256);

        let payload = message(&[&label, &label, &label, &short, b"cd"]);
        assert_eq!(decode(&payload), Err(DecodeError::BufferOverflow));
    }

    #[test]
    fn should_treat_compression_pointer_as_label_length() {
        // 0xC0 0x0C is a pointer back to offset 12; read as a 192-byte label
        let mut payload = vec![0u8; DNS_HEADER_SIZE];
        payload.extend_from_slice(&[0xC0, 0x0C]);

        assert!(matches!(
            decode(&payload),
            Err(DecodeError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn should_stop_at_first_terminator() {
        let mut payload = message(&[b"first"]);
        payload.extend_from_slice(&[6, b's', b'e', b'c', b'o', b'n', b'd', 0]);

        assert_eq!(decode(&payload).unwrap().as_bytes(), b"first");
    }

    #[test]
    fn should_display_non_utf8_lossily() {
        let payload = message(&[&[0xFF, b'a']]);
        let qname = decode(&payload).unwrap();

        assert!(qname.as_str().is_none());
        assert_eq!(qname.to_string(), "\u{FFFD}a");
    }
}
