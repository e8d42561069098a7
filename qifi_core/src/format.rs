use serde::{Deserialize, Serialize};

use crate::error::FormatError;

/// Width of every header field on the wire.
pub const WORD_SIZE: usize = 4;

/// Header words that follow the index list: `k`, `byte_length`, `checksum`.
pub const TRAILER_WORDS: usize = 3;

// ── Header ─────────────────────────────────────────────────────────────────

/// Metadata shared by every block derived from one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncodedHeader {
    /// Number of original blocks the payload was sliced into (`k ≥ 1`).
    pub k: u32,
    /// Length of the (possibly compressed) payload before slicing. Trims the
    /// zero padding of the last block at reconstruction time.
    pub byte_length: u32,
    /// [`checksum`](crate::checksum) of the original bytes with `k` folded in.
    pub checksum: u32,
}

// ── Block ──────────────────────────────────────────────────────────────────

/// One equation over GF(2): `payload` is the XOR of the original blocks
/// named by `indices`.
///
/// Every block carries the full header, so any single block is independently
/// verifiable and decodable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBlock {
    pub header: EncodedHeader,
    /// Original-block positions XORed into `payload`. Degree = `indices.len()`.
    pub indices: Vec<u32>,
    /// Exactly one slice long.
    pub payload: Vec<u8>,
}

impl EncodedBlock {
    /// Number of original blocks combined into this one.
    #[inline]
    pub fn degree(&self) -> usize {
        self.indices.len()
    }

    /// Size of the serialized header in bytes.
    #[inline]
    pub fn header_len(&self) -> usize {
        (1 + self.indices.len() + TRAILER_WORDS) * WORD_SIZE
    }

    /// Serialize to the wire layout.
    ///
    /// ```text
    /// [0]           degree D
    /// [1 ..= D]     indices
    /// [D+1]         k
    /// [D+2]         byte_length
    /// [D+3]         checksum
    /// [D+4 ..]      payload bytes
    /// ```
    /// Header words are `u32` little-endian, packed with no padding.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.header_len() + self.payload.len());
        buf.extend_from_slice(&(self.indices.len() as u32).to_le_bytes());
        for index in &self.indices {
            buf.extend_from_slice(&index.to_le_bytes());
        }
        buf.extend_from_slice(&self.header.k.to_le_bytes());
        buf.extend_from_slice(&self.header.byte_length.to_le_bytes());
        buf.extend_from_slice(&self.header.checksum.to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Deserialize from the wire layout.
    ///
    /// Reads word 0 to learn the degree, then `degree + 3` more words; the
    /// remainder is payload. Only the framing is checked here; the decoder
    /// validates indices against `k`.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, FormatError> {
        let degree = read_word(buf, 0).ok_or(FormatError::TooShort { len: buf.len() })?;

        let needed = (degree as usize).saturating_add(TRAILER_WORDS);
        let available = (buf.len() - WORD_SIZE) / WORD_SIZE;
        if needed > available {
            return Err(FormatError::DegreeOverflow {
                degree,
                needed,
                available,
            });
        }

        let mut words = (1..=needed).filter_map(|w| read_word(buf, w));
        let indices: Vec<u32> = words.by_ref().take(degree as usize).collect();
        let (k, byte_length, checksum) = match (words.next(), words.next(), words.next()) {
            (Some(k), Some(byte_length), Some(checksum)) => (k, byte_length, checksum),
            _ => return Err(FormatError::TooShort { len: buf.len() }),
        };

        Ok(Self {
            header: EncodedHeader {
                k,
                byte_length,
                checksum,
            },
            indices,
            payload: buf[(1 + needed) * WORD_SIZE..].to_vec(),
        })
    }
}

/// XOR `src` into `dst` byte by byte. Both are one slice long.
#[inline]
pub(crate) fn xor_into(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

fn read_word(buf: &[u8], word: usize) -> Option<u32> {
    let start = word * WORD_SIZE;
    let bytes = buf.get(start..start + WORD_SIZE)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}
