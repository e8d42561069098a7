//! Error types for encoding, wire parsing, decoding, and the file envelope.

use thiserror::Error;

/// Errors raised while building an [`Encoder`](crate::Encoder) or a manual block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Nothing to slice: the (possibly compressed) payload is empty.
    #[error("cannot encode empty payload")]
    EmptyPayload,

    /// Slice size of zero bytes.
    #[error("slice size must be at least 1 byte")]
    InvalidSliceSize,

    /// A block must reference at least one original block.
    #[error("block indices must not be empty")]
    EmptyIndices,

    /// Index outside `[0, k)`.
    #[error("block index {index} out of range (k = {k})")]
    IndexOutOfRange {
        /// The offending index.
        index: u32,
        /// Number of original blocks.
        k: u32,
    },

    /// The same original block was named twice.
    #[error("block index {index} appears more than once")]
    DuplicateIndex {
        /// The repeated index.
        index: u32,
    },

    /// `k` or the payload length does not fit the 32-bit header words.
    #[error("payload slices into {k} blocks, which overflows the 32-bit header")]
    TooManyBlocks {
        /// Number of blocks the payload would need.
        k: usize,
    },

    /// The configured codec failed to compress the payload.
    #[error("compression failed: {reason}")]
    Compression {
        /// Codec error message.
        reason: String,
    },
}

/// Malformed wire data: the binary (or base64 text) form of one block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// Not even the degree word is present.
    #[error("block is {len} bytes, too short for a header")]
    TooShort {
        /// Length of the input.
        len: usize,
    },

    /// The degree word claims more header words than the buffer holds.
    #[error("degree {degree} needs {needed} header words but only {available} are present")]
    DegreeOverflow {
        /// Declared degree.
        degree: u32,
        /// Words the header would need after the degree word.
        needed: usize,
        /// Whole words available after the degree word.
        available: usize,
    },

    /// A text frame was not valid base64.
    #[error("invalid base64 frame: {reason}")]
    InvalidBase64 {
        /// Decoder error message.
        reason: String,
    },
}

/// Errors surfaced by the [`Decoder`](crate::Decoder).
///
/// Everything except [`DecodeError::ChecksumMismatchOnReconstruct`] is local to
/// the block that caused it: the block is rejected and the session continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The block belongs to a different payload than the session.
    #[error("block checksum {got:08x} does not match session checksum {expected:08x}")]
    ChecksumMismatchOnIngest {
        /// Session checksum.
        expected: u32,
        /// Checksum carried by the rejected block.
        got: u32,
    },

    /// The block agrees on checksum but not on another header field.
    #[error("block {field} is {got} but session {field} is {expected}")]
    HeaderMismatch {
        /// Name of the disagreeing field.
        field: &'static str,
        /// Session value.
        expected: u64,
        /// Value carried by the rejected block.
        got: u64,
    },

    /// Structurally invalid block (bad degree, index, or lengths).
    #[error("invalid block: {reason}")]
    InvalidBlock {
        /// What is wrong with it.
        reason: String,
    },

    /// Every block resolved but neither the decompressed nor the raw bytes
    /// match the session checksum.
    #[error("reconstructed payload fails checksum {expected:08x}")]
    ChecksumMismatchOnReconstruct {
        /// Session checksum.
        expected: u32,
    },

    /// One `add_block` call processed more equations than the ceiling allows.
    #[error("resolution cascade exceeded {limit} steps")]
    RunawayCascade {
        /// Configured ceiling.
        limit: usize,
    },
}

/// Errors reading the file-metadata envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// A length prefix points past the end of the buffer.
    #[error("envelope truncated: chunk of {declared} bytes at offset {offset} exceeds {len}")]
    Truncated {
        /// Offset of the chunk body.
        offset: usize,
        /// Declared chunk length.
        declared: usize,
        /// Total buffer length.
        len: usize,
    },

    /// A chunk is too long for its `u32` length prefix.
    #[error("envelope chunk of {len} bytes exceeds the 4 GiB length prefix")]
    ChunkTooLarge {
        /// Chunk length in bytes.
        len: usize,
    },

    /// The envelope must hold exactly a metadata chunk and a data chunk.
    #[error("envelope holds {count} chunks, expected 2")]
    ChunkCount {
        /// Number of chunks found.
        count: usize,
    },

    /// The metadata chunk is not valid JSON.
    #[error("invalid envelope metadata: {reason}")]
    InvalidMeta {
        /// Parser error message.
        reason: String,
    },
}
