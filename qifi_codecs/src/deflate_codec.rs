use std::io::Write;

use flate2::write::{ZlibDecoder, ZlibEncoder};
use flate2::Compression;
use qifi_core::Codec;

/// zlib-wrapped deflate.
///
/// Byte-compatible with the browser sender, which deflates the whole file
/// before slicing. Default level 6 matches that sender's default.
///
/// Best for: general files, and any session that must interoperate with it.
pub struct DeflateCodec {
    /// Compression level (0 = store, 9 = smallest).
    pub level: u32,
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl DeflateCodec {
    pub fn new(level: u32) -> Self {
        Self { level: level.min(9) }
    }
}

impl Codec for DeflateCodec {
    fn name(&self) -> &'static str {
        "deflate"
    }

    fn compress(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(self.level));
        encoder.write_all(raw)?;
        Ok(encoder.finish()?)
    }

    fn decompress(&self, compressed: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(Vec::new());
        decoder
            .write_all(compressed)
            .map_err(|e| anyhow::anyhow!("zlib decompress error: {}", e))?;
        Ok(decoder.finish()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_and_shrinks_repetitive_input() {
        let raw = b"the quick brown fox jumps over the lazy dog. ".repeat(40);
        let codec = DeflateCodec::default();
        let compressed = codec.compress(&raw).unwrap();
        assert!(compressed.len() < raw.len() / 4);
        assert_eq!(codec.decompress(&compressed).unwrap(), raw);
    }

    #[test]
    fn empty_input_still_produces_a_stream() {
        let codec = DeflateCodec::default();
        let compressed = codec.compress(&[]).unwrap();
        assert!(!compressed.is_empty());
        assert!(codec.decompress(&compressed).unwrap().is_empty());
    }

    #[test]
    fn rejects_non_zlib_input() {
        assert!(DeflateCodec::default().decompress(b"plain bytes, no zlib header").is_err());
    }
}
