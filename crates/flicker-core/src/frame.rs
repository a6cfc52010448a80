//! Frame format and chunker.
//!
//! A visual code stops scanning reliably past a certain density, so a
//! payload longer than `DEFAULT_THRESHOLD_CHARS` is split into numbered
//! frames, each carried by its own code:
//!
//! ```text
//! CHUNK:<session>:<index>:<total>:<slice>
//! ```
//!
//! A payload at or under the threshold is sent as-is, untagged. The slice is
//! everything after the fourth colon and may itself contain colons.

use std::num::NonZeroUsize;

use rand::Rng;

/// Literal tag opening every chunked frame.
pub const FRAME_TAG: &str = "CHUNK";

/// Field delimiter inside a frame.
pub const FRAME_DELIMITER: char = ':';

/// Payloads longer than this many characters are chunked.
pub const DEFAULT_THRESHOLD_CHARS: usize = 100;

/// Characters of payload carried per chunked frame.
pub const DEFAULT_FRAME_CHARS: usize = 80;

const DEFAULT_FRAME_SIZE: NonZeroUsize = match NonZeroUsize::new(DEFAULT_FRAME_CHARS) {
    Some(n) => n,
    None => panic!("DEFAULT_FRAME_CHARS must be non-zero"),
};

/// Session id length and alphabet. The alphabet never contains the delimiter.
const SESSION_ID_LEN: usize = 9;
const SESSION_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

// ── Types ─────────────────────────────────────────────────────────────────────

/// One unit of transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub session_id: String,
    pub index: usize,
    pub total: usize,
    pub slice: String,
}

impl Frame {
    /// Tagged text form: `CHUNK:<session>:<index>:<total>:<slice>`.
    pub fn to_tagged(&self) -> String {
        format!(
            "{FRAME_TAG}{d}{}{d}{}{d}{}{d}{}",
            self.session_id,
            self.index,
            self.total,
            self.slice,
            d = FRAME_DELIMITER
        )
    }
}

/// All frames produced by one `chunk` call. Frames share one session id and
/// are ordered by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSet {
    pub session_id: String,
    pub frames: Vec<Frame>,
    pub is_chunked: bool,
}

impl ChunkSet {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Text to encode into the visual code for frame `index`.
    ///
    /// Unchunked sets carry the raw payload; chunked sets carry tagged frames.
    pub fn frame_text(&self, index: usize) -> Option<String> {
        let frame = self.frames.get(index)?;
        Some(if self.is_chunked {
            frame.to_tagged()
        } else {
            frame.slice.clone()
        })
    }

    /// Text of every frame, in index order.
    pub fn texts(&self) -> Vec<String> {
        (0..self.frames.len())
            .filter_map(|i| self.frame_text(i))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame size must be at least one character")]
    ZeroFrameSize,
}

// ── Chunker ───────────────────────────────────────────────────────────────────

/// Split `data` with the default threshold (100) and frame size (80).
pub fn chunk(data: &str) -> ChunkSet {
    split(data, DEFAULT_THRESHOLD_CHARS, DEFAULT_FRAME_SIZE)
}

/// Split `data` into frames of `frame_chars` characters when it is longer
/// than `threshold_chars`.
///
/// Lengths count characters, and slices end on character boundaries.
pub fn chunk_with(
    data: &str,
    threshold_chars: usize,
    frame_chars: usize,
) -> Result<ChunkSet, FrameError> {
    let frame_chars = NonZeroUsize::new(frame_chars).ok_or(FrameError::ZeroFrameSize)?;
    Ok(split(data, threshold_chars, frame_chars))
}

fn split(data: &str, threshold_chars: usize, frame_chars: NonZeroUsize) -> ChunkSet {
    let frame_chars = frame_chars.get();
    let session_id = new_session_id();
    let len = data.chars().count();

    if len <= threshold_chars {
        return ChunkSet {
            frames: vec![Frame {
                session_id: session_id.clone(),
                index: 0,
                total: 1,
                slice: data.to_string(),
            }],
            session_id,
            is_chunked: false,
        };
    }

    let total = len.div_ceil(frame_chars);

    // byte offset of every frame_chars-th character, plus the end
    let mut bounds: Vec<usize> = data
        .char_indices()
        .step_by(frame_chars)
        .map(|(offset, _)| offset)
        .collect();
    bounds.push(data.len());

    let frames = bounds
        .windows(2)
        .enumerate()
        .map(|(index, w)| Frame {
            session_id: session_id.clone(),
            index,
            total,
            slice: data[w[0]..w[1]].to_string(),
        })
        .collect::<Vec<_>>();
    debug_assert_eq!(frames.len(), total);

    ChunkSet {
        session_id,
        frames,
        is_chunked: true,
    }
}

/// Random 9-character base-36 session id.
pub fn new_session_id() -> String {
    let mut rng = rand::thread_rng();
    (0..SESSION_ID_LEN)
        .map(|_| SESSION_ID_ALPHABET[rng.gen_range(0..SESSION_ID_ALPHABET.len())] as char)
        .collect()
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Recognise a tagged frame.
///
/// Returns `None` for anything that does not start with `CHUNK:`, has fewer
/// than five fields, or whose index/total are not non-negative integers.
pub fn parse_frame(text: &str) -> Option<Frame> {
    let rest = text
        .strip_prefix(FRAME_TAG)?
        .strip_prefix(FRAME_DELIMITER)?;

    let mut fields = rest.splitn(4, FRAME_DELIMITER);
    let session_id = fields.next()?;
    let index = parse_count(fields.next()?)?;
    let total = parse_count(fields.next()?)?;
    let slice = fields.next()?;

    Some(Frame {
        session_id: session_id.to_string(),
        index,
        total,
        slice: slice.to_string(),
    })
}

/// True when `text` carries the frame tag, whether or not it parses.
pub fn has_frame_tag(text: &str) -> bool {
    text.strip_prefix(FRAME_TAG)
        .is_some_and(|rest| rest.starts_with(FRAME_DELIMITER))
}

fn parse_count(field: &str) -> Option<usize> {
    // `usize::from_str` accepts a leading '+'
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// Short BLAKE3 digest of a payload, for correlating sender and receiver logs.
pub fn payload_digest(payload: &str) -> String {
    let hash = blake3::hash(payload.as_bytes());
    hex::encode(&hash.as_bytes()[..8])
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(len: usize) -> String {
        (0..len)
            .map(|i| SESSION_ID_ALPHABET[i % SESSION_ID_ALPHABET.len()] as char)
            .collect()
    }

    #[test]
    fn short_payload_is_one_untagged_frame() {
        for len in [0, 1, 99, 100] {
            let data = payload(len);
            let set = chunk(&data);
            assert!(!set.is_chunked);
            assert_eq!(set.len(), 1);
            assert_eq!(set.frames[0].index, 0);
            assert_eq!(set.frames[0].total, 1);
            assert_eq!(set.frame_text(0).unwrap(), data);
        }
    }

    #[test]
    fn long_payload_is_split_into_ceil_frames() {
        for (len, expected) in [(101, 2), (160, 2), (161, 3), (1448, 19)] {
            let data = payload(len);
            let set = chunk(&data);
            assert!(set.is_chunked);
            assert_eq!(set.len(), expected, "len {len}");
            assert!(set.frames.iter().all(|f| f.total == expected));
            assert!(set.frames.iter().all(|f| f.session_id == set.session_id));
            let joined: String = set.frames.iter().map(|f| f.slice.as_str()).collect();
            assert_eq!(joined, data);
        }
    }

    #[test]
    fn frames_are_full_except_the_last() {
        let set = chunk(&payload(250));
        let sizes: Vec<usize> = set.frames.iter().map(|f| f.slice.len()).collect();
        assert_eq!(sizes, vec![80, 80, 80, 10]);
    }

    #[test]
    fn tagged_text_has_expected_shape() {
        let set = chunk(&payload(150));
        let text = set.frame_text(1).unwrap();
        let expected_prefix = format!("CHUNK:{}:1:2:", set.session_id);
        assert!(text.starts_with(&expected_prefix));
        assert_eq!(text.len(), expected_prefix.len() + 70);
    }

    #[test]
    fn custom_threshold_and_frame_size() {
        let set = chunk_with("abcdefghij", 4, 3).unwrap();
        let slices: Vec<&str> = set.frames.iter().map(|f| f.slice.as_str()).collect();
        assert_eq!(slices, vec!["abc", "def", "ghi", "j"]);
        assert_eq!(chunk_with("abc", 4, 0), Err(FrameError::ZeroFrameSize));
    }

    #[test]
    fn multibyte_text_is_cut_on_char_boundaries() {
        let data = "é".repeat(101);
        let set = chunk(&data);
        assert_eq!(set.len(), 2);
        assert_eq!(set.frames[0].slice.chars().count(), 80);
        assert_eq!(set.frames[1].slice.chars().count(), 21);
    }

    #[test]
    fn session_ids_are_random_and_delimiter_free() {
        let a = new_session_id();
        let b = new_session_id();
        assert_eq!(a.len(), SESSION_ID_LEN);
        assert!(!a.contains(FRAME_DELIMITER));
        assert_ne!(a, b);
    }

    #[test]
    fn parse_reads_tagged_frame() {
        let frame = parse_frame("CHUNK:abc123xyz:3:7:SGVsbG8=").unwrap();
        assert_eq!(frame.session_id, "abc123xyz");
        assert_eq!(frame.index, 3);
        assert_eq!(frame.total, 7);
        assert_eq!(frame.slice, "SGVsbG8=");
    }

    #[test]
    fn parse_keeps_colons_inside_slice() {
        let frame = parse_frame("CHUNK:s:0:2:a:b::c").unwrap();
        assert_eq!(frame.slice, "a:b::c");
    }

    #[test]
    fn parse_accepts_empty_slice() {
        let frame = parse_frame("CHUNK:s:0:1:").unwrap();
        assert_eq!(frame.slice, "");
    }

    #[test]
    fn parse_rejects_untagged_text() {
        for text in [
            "",
            "AQEBAZQGYflb",
            "chunk:s:0:1:x",
            " CHUNK:s:0:1:x",
            "CHUNKY:s:0:1:x",
            "CHUNK",
            "xCHUNK:s:0:1:x",
        ] {
            assert!(parse_frame(text).is_none(), "{text:?}");
        }
    }

    #[test]
    fn parse_rejects_bad_counts_and_short_frames() {
        for text in [
            "CHUNK:s:0:1",
            "CHUNK:s:x:1:data",
            "CHUNK:s:0:y:data",
            "CHUNK:s:-1:2:data",
            "CHUNK:s:+1:2:data",
            "CHUNK:s::2:data",
            "CHUNK:s:1.5:2:data",
        ] {
            assert!(parse_frame(text).is_none(), "{text:?}");
        }
    }

    #[test]
    fn tag_detection_matches_prefix_only() {
        assert!(has_frame_tag("CHUNK:garbage"));
        assert!(!has_frame_tag("CHUNKgarbage"));
        assert!(!has_frame_tag("hello"));
    }

    #[test]
    fn digest_is_stable_and_short() {
        assert_eq!(payload_digest("abc"), payload_digest("abc"));
        assert_ne!(payload_digest("abc"), payload_digest("abd"));
        assert_eq!(payload_digest("abc").len(), 16);
    }
}
