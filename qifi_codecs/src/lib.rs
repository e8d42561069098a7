mod deflate_codec;
mod lz4_codec;
mod passthrough;
mod zstd_codec;

pub use deflate_codec::DeflateCodec;
pub use lz4_codec::Lz4Codec;
pub use passthrough::PassThroughCodec;
pub use zstd_codec::ZstdCodec;

use qifi_core::Codec;
use std::sync::Arc;

/// Resolve a codec from its CLI name.
///
/// Sender and receiver must agree on the codec out of band; the block header
/// carries no codec field. A receiver with the wrong codec still recovers
/// uncompressed sessions through the decoder's raw fallback.
pub fn codec_by_name(name: &str) -> anyhow::Result<Arc<dyn Codec>> {
    match name {
        "deflate" | "zlib" => Ok(Arc::new(DeflateCodec::default())),
        "zstd" | "z" => Ok(Arc::new(ZstdCodec::default())),
        "lz4" | "l" => Ok(Arc::new(Lz4Codec)),
        "passthrough" | "pass" | "none" => Ok(Arc::new(PassThroughCodec)),
        other => anyhow::bail!(
            "unknown codec '{}'. Valid options: deflate, zstd, lz4, passthrough",
            other
        ),
    }
}

/// The codec the web sender uses: zlib-wrapped deflate.
pub fn default_codec() -> Arc<dyn Codec> {
    Arc::new(DeflateCodec::default())
}
