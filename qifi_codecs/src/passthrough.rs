use qifi_core::Codec;

/// No-op codec: the payload is sliced verbatim.
///
/// Useful for:
/// - Already-compressed files (JPEG, MP4, archives) where another pass only
///   adds frames.
/// - Checking the fountain layer independently of any compression.
pub struct PassThroughCodec;

impl Codec for PassThroughCodec {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn compress(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(raw.to_vec())
    }

    fn decompress(&self, compressed: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(compressed.to_vec())
    }
}
