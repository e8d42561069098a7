use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use qifi_core::Codec;

/// LZ4 block codec with the raw length prepended.
///
/// Weakest ratio of the bundled codecs but the cheapest to run, which helps
/// on low-power receivers decoding straight from a camera feed.
pub struct Lz4Codec;

impl Codec for Lz4Codec {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn compress(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(compress_prepend_size(raw))
    }

    fn decompress(&self, compressed: &[u8]) -> anyhow::Result<Vec<u8>> {
        let raw = decompress_size_prepended(compressed)
            .map_err(|e| anyhow::anyhow!("lz4 decompress error: {}", e))?;
        Ok(raw)
    }
}
