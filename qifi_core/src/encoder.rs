use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::checksum::checksum;
use crate::codec::Codec;
use crate::config::FountainConfig;
use crate::degree::{sample_indices, IdealSoliton};
use crate::error::EncodeError;
use crate::format::{xor_into, EncodedBlock, EncodedHeader};

/// Fountain encoder over one payload.
///
/// # Construction
/// 1. Optionally compress the whole payload with a [`Codec`].
/// 2. Slice the (possibly compressed) bytes into `k = ceil(len / slice_size)`
///    blocks of exactly `slice_size` bytes, zero-padding the last one.
/// 3. Record `checksum(original, k)` and the sliced length in the header.
///
/// The encoder is immutable afterwards. [`create_block`](Encoder::create_block)
/// builds a block for an explicit index set; [`fountain`](Encoder::fountain)
/// yields random blocks forever.
#[derive(Debug, Clone)]
pub struct Encoder {
    header: EncodedHeader,
    slice_size: usize,
    blocks: Vec<Vec<u8>>,
    distribution: IdealSoliton,
    original_len: usize,
    codec_name: Option<&'static str>,
}

impl Encoder {
    /// Encode `data` as-is, without compression.
    pub fn new(data: &[u8], slice_size: usize) -> Result<Self, EncodeError> {
        Self::build(data, data, slice_size, None)
    }

    /// Compress `data` with `codec`, then encode the compressed bytes.
    ///
    /// The checksum still covers the original bytes, so the receiver verifies
    /// what it finally hands back, not the intermediate form.
    pub fn compressed(
        data: &[u8],
        slice_size: usize,
        codec: &dyn Codec,
    ) -> Result<Self, EncodeError> {
        let compressed = codec
            .compress(data)
            .map_err(|e| EncodeError::Compression {
                reason: e.to_string(),
            })?;
        Self::build(data, &compressed, slice_size, Some(codec.name()))
    }

    /// Build from a [`FountainConfig`], compressing with `codec` when
    /// `config.compress` is set.
    pub fn with_config(
        data: &[u8],
        config: &FountainConfig,
        codec: &dyn Codec,
    ) -> Result<Self, EncodeError> {
        if config.compress {
            Self::compressed(data, config.slice_size, codec)
        } else {
            Self::new(data, config.slice_size)
        }
    }

    fn build(
        original: &[u8],
        sliced: &[u8],
        slice_size: usize,
        codec_name: Option<&'static str>,
    ) -> Result<Self, EncodeError> {
        if slice_size == 0 {
            return Err(EncodeError::InvalidSliceSize);
        }
        if sliced.is_empty() {
            return Err(EncodeError::EmptyPayload);
        }

        let blocks: Vec<Vec<u8>> = sliced
            .chunks(slice_size)
            .map(|chunk| {
                let mut block = vec![0u8; slice_size];
                block[..chunk.len()].copy_from_slice(chunk);
                block
            })
            .collect();

        let k = u32::try_from(blocks.len())
            .map_err(|_| EncodeError::TooManyBlocks { k: blocks.len() })?;
        let byte_length = u32::try_from(sliced.len())
            .map_err(|_| EncodeError::TooManyBlocks { k: blocks.len() })?;

        let header = EncodedHeader {
            k,
            byte_length,
            checksum: checksum(original, k),
        };

        debug!(
            k,
            slice_size,
            original_len = original.len(),
            byte_length,
            checksum = format_args!("{:08x}", header.checksum),
            codec = codec_name.unwrap_or("none"),
            "encoder ready"
        );

        Ok(Self {
            header,
            slice_size,
            blocks,
            distribution: IdealSoliton::new(k),
            original_len: original.len(),
            codec_name,
        })
    }

    /// Number of original blocks.
    #[inline]
    pub fn k(&self) -> u32 {
        self.header.k
    }

    /// Header carried by every block of this session.
    #[inline]
    pub fn header(&self) -> EncodedHeader {
        self.header
    }

    /// Bytes per original block.
    #[inline]
    pub fn slice_size(&self) -> usize {
        self.slice_size
    }

    /// Length of the caller's payload before any compression.
    #[inline]
    pub fn original_len(&self) -> usize {
        self.original_len
    }

    /// Name of the codec applied before slicing, if any.
    #[inline]
    pub fn codec_name(&self) -> Option<&'static str> {
        self.codec_name
    }

    /// Build the block for an explicit index set.
    ///
    /// Indices keep the caller's order on the wire. They must be non-empty,
    /// distinct, and below `k`.
    pub fn create_block(&self, indices: &[u32]) -> Result<EncodedBlock, EncodeError> {
        if indices.is_empty() {
            return Err(EncodeError::EmptyIndices);
        }
        let mut seen = vec![false; self.blocks.len()];
        for &index in indices {
            let slot = seen
                .get_mut(index as usize)
                .ok_or(EncodeError::IndexOutOfRange { index, k: self.k() })?;
            if *slot {
                return Err(EncodeError::DuplicateIndex { index });
            }
            *slot = true;
        }
        Ok(self.combine(indices.to_vec()))
    }

    /// XOR the named original blocks. Indices are already validated.
    fn combine(&self, indices: Vec<u32>) -> EncodedBlock {
        let mut payload = vec![0u8; self.slice_size];
        for &index in &indices {
            xor_into(&mut payload, &self.blocks[index as usize]);
        }
        EncodedBlock {
            header: self.header,
            indices,
            payload,
        }
    }

    /// Endless stream of random blocks, seeded from OS entropy.
    pub fn fountain(&self) -> Fountain<'_, StdRng> {
        self.fountain_with_rng(StdRng::from_entropy())
    }

    /// Endless stream of random blocks drawn from `rng`.
    pub fn fountain_with_rng<R: Rng>(&self, rng: R) -> Fountain<'_, R> {
        Fountain { encoder: self, rng }
    }
}

/// Unbounded, non-restartable sequence of encoded blocks.
///
/// Each pull samples a degree from the Ideal Soliton distribution, samples
/// that many distinct indices, and XORs the matching original blocks. The
/// only state is the random source; [`next`](Iterator::next) never returns
/// `None`, so callers bound it with `take` or stop once the receiver is done.
pub struct Fountain<'a, R> {
    encoder: &'a Encoder,
    rng: R,
}

impl<R: Rng> Iterator for Fountain<'_, R> {
    type Item = EncodedBlock;

    fn next(&mut self) -> Option<Self::Item> {
        let k = self.encoder.k();
        let degree = self.encoder.distribution.sample(&mut self.rng);
        let indices = sample_indices(k, degree, &mut self.rng);
        Some(self.encoder.combine(indices))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}
