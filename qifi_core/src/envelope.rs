//! File-metadata envelope wrapped around a payload before encoding.
//!
//! ```text
//! [len: u32 BE][meta JSON][len: u32 BE][file bytes]
//! ```
//! The receiver learns the file name and content type from the same fountain
//! stream as the data, without a side channel.

use serde::{Deserialize, Serialize};

use crate::error::EnvelopeError;

/// Content type assumed when the sender did not name one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const LEN_PREFIX: usize = 4;

/// Descriptive metadata travelling with the file bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

impl Default for FileMeta {
    fn default() -> Self {
        Self {
            filename: None,
            content_type: default_content_type(),
        }
    }
}

/// Concatenate length-prefixed chunks.
pub fn merge_chunks<'a>(
    chunks: impl IntoIterator<Item = &'a [u8]>,
) -> Result<Vec<u8>, EnvelopeError> {
    let mut merged = Vec::new();
    for chunk in chunks {
        merged.extend_from_slice(&chunk_len(chunk.len())?.to_be_bytes());
        merged.extend_from_slice(chunk);
    }
    Ok(merged)
}

fn chunk_len(len: usize) -> Result<u32, EnvelopeError> {
    u32::try_from(len).map_err(|_| EnvelopeError::ChunkTooLarge { len })
}

/// Invert [`merge_chunks`].
pub fn split_chunks(merged: &[u8]) -> Result<Vec<&[u8]>, EnvelopeError> {
    let mut chunks = Vec::new();
    let mut offset = 0;
    while offset < merged.len() {
        let prefix = merged
            .get(offset..offset + LEN_PREFIX)
            .ok_or(EnvelopeError::Truncated {
                offset,
                declared: LEN_PREFIX,
                len: merged.len(),
            })?;
        let declared = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        offset += LEN_PREFIX;

        let chunk = offset
            .checked_add(declared)
            .and_then(|end| merged.get(offset..end))
            .ok_or(EnvelopeError::Truncated {
                offset,
                declared,
                len: merged.len(),
            })?;
        chunks.push(chunk);
        offset += declared;
    }
    Ok(chunks)
}

/// Prefix `data` with its serialized metadata.
pub fn append_file_meta(data: &[u8], meta: &FileMeta) -> Result<Vec<u8>, EnvelopeError> {
    // Two string fields cannot fail to serialize.
    let json = serde_json::to_vec(meta).unwrap_or_default();
    merge_chunks([json.as_slice(), data])
}

/// Split an envelope back into file bytes and metadata.
pub fn read_file_meta(buf: &[u8]) -> Result<(Vec<u8>, FileMeta), EnvelopeError> {
    let chunks = split_chunks(buf)?;
    let [meta, data] = chunks.as_slice() else {
        return Err(EnvelopeError::ChunkCount {
            count: chunks.len(),
        });
    };
    let mut meta: FileMeta = serde_json::from_slice(meta).map_err(|e| EnvelopeError::InvalidMeta {
        reason: e.to_string(),
    })?;
    if meta.content_type.is_empty() {
        meta.content_type = default_content_type();
    }
    Ok((data.to_vec(), meta))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_roundtrip() {
        let meta = FileMeta {
            filename: Some("photo.jpg".into()),
            content_type: "image/jpeg".into(),
        };
        let wrapped = append_file_meta(b"\xff\xd8\xff\xe0 jpeg body", &meta).unwrap();
        let (data, back) = read_file_meta(&wrapped).unwrap();
        assert_eq!(data, b"\xff\xd8\xff\xe0 jpeg body");
        assert_eq!(back, meta);
    }

    #[test]
    fn meta_uses_camel_case_json() {
        let wrapped = append_file_meta(
            b"x",
            &FileMeta {
                filename: Some("a.txt".into()),
                content_type: "text/plain".into(),
            },
        )
        .unwrap();
        let chunks = split_chunks(&wrapped).unwrap();
        assert_eq!(chunks[0], br#"{"filename":"a.txt","contentType":"text/plain"}"#);
        assert_eq!(chunks[1], b"x");
    }

    #[test]
    fn missing_content_type_defaults() {
        let wrapped =
            merge_chunks([br#"{"filename":"a.bin"}"#.as_slice(), b"data".as_slice()]).unwrap();
        let (_, meta) = read_file_meta(&wrapped).unwrap();
        assert_eq!(meta.filename.as_deref(), Some("a.bin"));
        assert_eq!(meta.content_type, DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn length_prefix_is_big_endian() {
        let merged = merge_chunks([b"abc".as_slice()]).unwrap();
        assert_eq!(merged, vec![0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn empty_chunks_survive() {
        let merged = merge_chunks([b"".as_slice(), b"".as_slice()]).unwrap();
        let chunks = split_chunks(&merged).unwrap();
        assert_eq!(chunks, vec![b"".as_slice(), b"".as_slice()]);
    }

    #[test]
    fn truncated_envelope_is_rejected() {
        let mut wrapped = append_file_meta(b"payload", &FileMeta::default()).unwrap();
        wrapped.truncate(wrapped.len() - 2);
        assert!(matches!(
            read_file_meta(&wrapped),
            Err(EnvelopeError::Truncated { .. })
        ));
        assert!(matches!(
            split_chunks(&[0, 0]),
            Err(EnvelopeError::Truncated { offset: 0, .. })
        ));
    }

    #[test]
    fn wrong_chunk_count_is_rejected() {
        let three =
            merge_chunks([b"{}".as_slice(), b"a".as_slice(), b"b".as_slice()]).unwrap();
        assert_eq!(
            read_file_meta(&three),
            Err(EnvelopeError::ChunkCount { count: 3 })
        );
    }

    #[test]
    fn bad_json_is_rejected() {
        let wrapped = merge_chunks([b"not json".as_slice(), b"a".as_slice()]).unwrap();
        assert!(matches!(
            read_file_meta(&wrapped),
            Err(EnvelopeError::InvalidMeta { .. })
        ));
    }

    #[test]
    fn chunk_length_must_fit_prefix() {
        assert_eq!(chunk_len(u32::MAX as usize), Ok(u32::MAX));
        #[cfg(target_pointer_width = "64")]
        {
            let len = u32::MAX as usize + 1;
            assert_eq!(chunk_len(len), Err(EnvelopeError::ChunkTooLarge { len }));
        }
    }
}
