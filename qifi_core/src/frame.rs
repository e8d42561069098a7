use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::encoder::Encoder;
use crate::error::FormatError;
use crate::format::EncodedBlock;

/// Turns one encoded block into whatever the transport displays or sends.
///
/// The encoder never knows which renderer is in use; callers pick one and
/// pair it with an encoder through [`Generator`].
pub trait Renderer {
    type Output;

    fn render(&self, block: &EncodedBlock) -> anyhow::Result<Self::Output>;
}

/// Renders the raw wire bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryRenderer;

impl Renderer for BinaryRenderer {
    type Output = Vec<u8>;

    fn render(&self, block: &EncodedBlock) -> anyhow::Result<Vec<u8>> {
        Ok(block.to_bytes())
    }
}

/// Renders a text frame: optional URL prefix followed by standard padded
/// base64 of the wire bytes. This is the string a QR symbol carries.
#[derive(Debug, Clone, Default)]
pub struct Base64Renderer {
    pub url_prefix: Option<String>,
}

impl Base64Renderer {
    pub fn new(url_prefix: Option<String>) -> Self {
        Self {
            url_prefix: url_prefix.filter(|p| !p.is_empty()),
        }
    }
}

impl Renderer for Base64Renderer {
    type Output = String;

    fn render(&self, block: &EncodedBlock) -> anyhow::Result<String> {
        let encoded = STANDARD.encode(block.to_bytes());
        Ok(match &self.url_prefix {
            Some(prefix) => format!("{prefix}{encoded}"),
            None => encoded,
        })
    }
}

/// Parse a text frame produced by [`Base64Renderer`].
///
/// The prefix is stripped when present; surrounding whitespace is ignored.
pub fn parse_frame(text: &str, url_prefix: Option<&str>) -> Result<EncodedBlock, FormatError> {
    let text = text.trim();
    let body = url_prefix
        .filter(|p| !p.is_empty())
        .and_then(|p| text.strip_prefix(p))
        .unwrap_or(text);
    let bytes = STANDARD
        .decode(body)
        .map_err(|e| FormatError::InvalidBase64 {
            reason: e.to_string(),
        })?;
    EncodedBlock::from_bytes(&bytes)
}

/// An encoder paired with a renderer.
pub struct Generator<R> {
    encoder: Encoder,
    renderer: R,
}

impl<R: Renderer> Generator<R> {
    pub fn new(encoder: Encoder, renderer: R) -> Self {
        Self { encoder, renderer }
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    /// Rendered random blocks, forever.
    pub fn fountain(&self) -> impl Iterator<Item = anyhow::Result<R::Output>> + '_ {
        self.encoder
            .fountain()
            .map(move |block| self.renderer.render(&block))
    }

    /// Render one block for an explicit index set.
    pub fn create_block(&self, indices: &[u32]) -> anyhow::Result<R::Output> {
        let block = self.encoder.create_block(indices)?;
        self.renderer.render(&block)
    }
}
