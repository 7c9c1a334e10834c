//! Lossy text decoding for received chunks
//!
//! Decoding never fails: invalid UTF-8 is replaced with U+FFFD. An incomplete
//! multi-byte sequence at the end of a chunk is held back and joined with the
//! next chunk, so characters split across reads come out intact.

use std::borrow::Cow;

/// Longest prefix of a UTF-8 sequence that can still be completed
const MAX_CARRY: usize = 3;

/// Decode bytes as UTF-8, substituting U+FFFD for invalid sequences
pub fn decode_lossy(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// Offset where a trailing, still-completable UTF-8 sequence begins.
///
/// Returns `bytes.len()` when the input does not end mid-character.
fn incomplete_tail_start(bytes: &[u8]) -> usize {
    let mut offset = 0;
    loop {
        match std::str::from_utf8(&bytes[offset..]) {
            Ok(_) => return bytes.len(),
            Err(e) => match e.error_len() {
                Some(bad) => offset += e.valid_up_to() + bad,
                None => return offset + e.valid_up_to(),
            },
        }
    }
}

/// Per-session streaming decoder
#[derive(Debug, Default)]
pub struct TextDecoder {
    carry: Vec<u8>,
}

impl TextDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk, holding back a trailing partial character.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let joined;
        let input: &[u8] = if self.carry.is_empty() {
            chunk
        } else {
            let mut buf = std::mem::take(&mut self.carry);
            buf.extend_from_slice(chunk);
            joined = buf;
            &joined
        };

        let split = incomplete_tail_start(input);
        debug_assert!(input.len() - split <= MAX_CARRY);
        self.carry.extend_from_slice(&input[split..]);

        let text = decode_lossy(&input[..split]);
        if let Cow::Owned(_) = text {
            log::debug!("replaced invalid UTF-8 in {} byte chunk", split);
        }
        text.into_owned()
    }

    /// Flush any held-back bytes at the end of a session.
    pub fn finish(&mut self) -> Option<String> {
        if self.carry.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.carry);
        log::debug!("flushing {} bytes of an incomplete character", rest.len());
        Some(decode_lossy(&rest).into_owned())
    }

    /// Bytes currently held back
    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.carry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_line_passes_through() {
        let mut decoder = TextDecoder::new();
        assert_eq!(decoder.decode(b"boot ok\r\n"), "boot ok\r\n");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_invalid_bytes_are_replaced_not_dropped() {
        let mut decoder = TextDecoder::new();
        let text = decoder.decode(b"temp=\xff\xfe\n");
        assert_eq!(text, "temp=\u{FFFD}\u{FFFD}\n");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_truncated_sequence_followed_by_ascii_is_replaced() {
        let mut decoder = TextDecoder::new();
        assert_eq!(decoder.decode(b"\xe2\x82x\n"), "\u{FFFD}x\n");
    }

    #[test]
    fn test_split_character_is_joined() {
        // "€" is E2 82 AC
        let mut decoder = TextDecoder::new();
        assert_eq!(decoder.decode(b"price \xe2\x82"), "price ");
        assert_eq!(decoder.pending(), 2);
        assert_eq!(decoder.decode(b"\xac5\n"), "\u{20AC}5\n");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_finish_flushes_partial_character() {
        let mut decoder = TextDecoder::new();
        assert_eq!(decoder.decode(b"a\xf0\x9f"), "a");
        assert_eq!(decoder.finish().as_deref(), Some("\u{FFFD}"));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_invalid_then_incomplete_tail() {
        let mut decoder = TextDecoder::new();
        assert_eq!(decoder.decode(b"\xff ok \xc3"), "\u{FFFD} ok ");
        assert_eq!(decoder.decode(b"\xa9\n"), "\u{e9}\n");
    }

    #[test]
    fn test_ansi_escapes_preserved() {
        let mut decoder = TextDecoder::new();
        assert_eq!(decoder.decode(b"\x1b[31mERR\x1b[0m\n"), "\x1b[31mERR\x1b[0m\n");
    }
}
