//! Luby-transform fountain coding for lossy, unordered, snapshot-only channels.
//!
//! A payload is sliced into `k` equal blocks; the [`Encoder`] emits an endless
//! stream of [`EncodedBlock`]s, each the XOR of a random subset of the
//! originals. The [`Decoder`] accepts any of them, in any order, duplicates
//! included, and reconstructs the payload once enough have arrived.

pub mod checksum;
pub mod codec;
pub mod config;
pub mod decoder;
pub mod degree;
pub mod encoder;
pub mod envelope;
pub mod error;
pub mod format;
pub mod frame;

pub use checksum::checksum;
pub use codec::Codec;
pub use config::FountainConfig;
pub use decoder::{Decoder, DecoderStatus};
pub use degree::{sample_degree, sample_indices, IdealSoliton};
pub use encoder::{Encoder, Fountain};
pub use envelope::{append_file_meta, read_file_meta, FileMeta};
pub use error::{DecodeError, EncodeError, EnvelopeError, FormatError};
pub use format::{EncodedBlock, EncodedHeader};
pub use frame::{parse_frame, Base64Renderer, BinaryRenderer, Generator, Renderer};
