//! Artifact compression modes
//!
//! Packed artifacts are stored as `<name>.tar<ext>`, where `<ext>` is derived
//! from the compression mode. The extension is part of the storage key, so the
//! mode used to write a blob can always be recovered from its key.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Compression algorithm for packed artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Plain tar archive (default)
    #[default]
    None,
    /// LZ4 - Fast compression, good for frequent checkpoints
    Lz4,
    /// ZSTD - Better ratio, slower
    Zstd,
}

impl Compression {
    /// Get algorithm name as string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Lz4 => "lz4",
            Self::Zstd => "zstd",
        }
    }

    /// Filename extension appended after `.tar`.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Lz4 => ".lz4",
            Self::Zstd => ".zst",
        }
    }

    /// Infer the compression mode from a storage key's suffix.
    #[must_use]
    pub fn from_key(key: &str) -> Self {
        if key.ends_with(Self::Lz4.extension()) {
            Self::Lz4
        } else if key.ends_with(Self::Zstd.extension()) {
            Self::Zstd
        } else {
            Self::None
        }
    }

    /// Compress data using this algorithm
    ///
    /// # Errors
    /// Returns error if compression fails (e.g., ZSTD internal error)
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
            Self::Zstd => zstd::encode_all(data, 3)
                .map_err(|e| Error::Compression(format!("ZSTD compression failed: {e}"))),
        }
    }

    /// Decompress data using this algorithm
    ///
    /// # Errors
    /// Returns error if decompression fails (e.g., corrupted data)
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Lz4 => lz4_flex::decompress_size_prepended(data)
                .map_err(|e| Error::Compression(format!("LZ4 decompression failed: {e}"))),
            Self::Zstd => zstd::decode_all(data)
                .map_err(|e| Error::Compression(format!("ZSTD decompression failed: {e}"))),
        }
    }
}

impl std::str::FromStr for Compression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "lz4" => Ok(Self::Lz4),
            "zstd" | "zst" => Ok(Self::Zstd),
            other => Err(Error::Config(format!("unknown compression mode: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_as_str() {
        assert_eq!(Compression::None.as_str(), "none");
        assert_eq!(Compression::Lz4.as_str(), "lz4");
        assert_eq!(Compression::Zstd.as_str(), "zstd");
    }

    #[test]
    fn test_compression_default() {
        assert_eq!(Compression::default(), Compression::None);
    }

    #[test]
    fn test_extension_roundtrip_through_key() {
        for mode in [Compression::None, Compression::Lz4, Compression::Zstd] {
            let key = format!("blobstore/abc.tar{}", mode.extension());
            assert_eq!(Compression::from_key(&key), mode);
        }
    }

    #[test]
    fn test_lz4_compress_decompress() {
        let data = b"hello world hello world hello world".to_vec();
        let compressed = Compression::Lz4.compress(&data).unwrap();
        let decompressed = Compression::Lz4.decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_zstd_compress_decompress() {
        let data = b"hello world hello world hello world".to_vec();
        let compressed = Compression::Zstd.compress(&data).unwrap();
        let decompressed = Compression::Zstd.decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_none_is_identity() {
        let data = b"raw tar bytes".to_vec();
        assert_eq!(Compression::None.compress(&data).unwrap(), data);
        assert_eq!(Compression::None.decompress(&data).unwrap(), data);
    }

    #[test]
    fn test_zstd_compresses_repeated_data() {
        let data = vec![0u8; 10000];
        let compressed = Compression::Zstd.compress(&data).unwrap();
        // ZSTD should achieve >10x compression on zeros
        assert!(compressed.len() < data.len() / 10);
    }

    #[test]
    fn test_corrupted_lz4_is_error() {
        let result = Compression::Lz4.decompress(b"\x05\x00\x00\x00ab");
        assert!(matches!(result, Err(Error::Compression(_))));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("LZ4".parse::<Compression>().unwrap(), Compression::Lz4);
        assert_eq!("zst".parse::<Compression>().unwrap(), Compression::Zstd);
        assert_eq!("".parse::<Compression>().unwrap(), Compression::None);
        assert!("bzip2".parse::<Compression>().is_err());
    }
}
