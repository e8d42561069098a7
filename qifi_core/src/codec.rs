/// Whole-payload compression applied before slicing.
///
/// The encoder compresses once, slices the compressed bytes, and records the
/// compressed length in every header. The decoder reassembles the compressed
/// bytes and calls [`decompress`](Codec::decompress); a failure there is not
/// fatal, because the decoder then verifies the raw bytes instead.
///
/// Implementations must be deterministic and must not depend on any state
/// outside the input buffer.
pub trait Codec: Send + Sync {
    /// Human-readable codec name for CLI display and logs.
    fn name(&self) -> &'static str;

    /// Compress the full payload.
    fn compress(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>>;

    /// Invert [`compress`](Codec::compress).
    fn decompress(&self, compressed: &[u8]) -> anyhow::Result<Vec<u8>>;
}
