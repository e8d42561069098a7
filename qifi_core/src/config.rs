use serde::{Deserialize, Serialize};

/// Default bytes per original block. Fits comfortably in a mid-size QR symbol
/// after base64 expansion and header overhead.
pub const DEFAULT_SLICE_SIZE: usize = 500;

/// Default ceiling on work-list items processed by one `add_block` call.
pub const DEFAULT_MAX_CASCADE_STEPS: usize = 1 << 20;

/// Fountain session parameters shared by sender and receiver tooling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FountainConfig {
    /// Bytes per original block.
    ///
    /// Default: 500
    pub slice_size: usize,

    /// Compress the payload with the session codec before slicing.
    ///
    /// Default: true
    pub compress: bool,

    /// Decoder safety ceiling for one resolution cascade.
    ///
    /// Default: 1 048 576
    pub max_cascade_steps: usize,
}

impl Default for FountainConfig {
    fn default() -> Self {
        Self {
            slice_size: DEFAULT_SLICE_SIZE,
            compress: true,
            max_cascade_steps: DEFAULT_MAX_CASCADE_STEPS,
        }
    }
}

impl FountainConfig {
    /// Number of original blocks `k` for a payload of `len` bytes.
    #[must_use]
    pub fn source_blocks(&self, len: usize) -> usize {
        if self.slice_size == 0 {
            return 0;
        }
        len.div_ceil(self.slice_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = FountainConfig::default();
        assert_eq!(config.slice_size, 500);
        assert!(config.compress);
        assert_eq!(config.max_cascade_steps, 1 << 20);
    }

    #[test]
    fn source_blocks_is_ceiling_division() {
        let config = FountainConfig {
            slice_size: 100,
            ..FountainConfig::default()
        };
        assert_eq!(config.source_blocks(0), 0);
        assert_eq!(config.source_blocks(1), 1);
        assert_eq!(config.source_blocks(100), 1);
        assert_eq!(config.source_blocks(101), 2);
        assert_eq!(config.source_blocks(295), 3);
    }

    #[test]
    fn zero_slice_size_yields_no_blocks() {
        let config = FountainConfig {
            slice_size: 0,
            ..FountainConfig::default()
        };
        assert_eq!(config.source_blocks(10), 0);
    }

    #[test]
    fn json_roundtrip_fills_missing_fields() {
        let config: FountainConfig = serde_json::from_str(r#"{"slice_size": 80}"#).unwrap();
        assert_eq!(config.slice_size, 80);
        assert!(config.compress);
        assert_eq!(config.max_cascade_steps, DEFAULT_MAX_CASCADE_STEPS);

        let json = serde_json::to_string(&config).unwrap();
        let back: FountainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
