use std::io::{Read, Write};

use ob_core::config::{CompressionConfig, LzmaFormat};
use xz2::read::XzDecoder;
use xz2::stream::{Check, LzmaOptions, Stream};
use xz2::write::XzEncoder;

use crate::error::{CodecError, FrameDecodeError};

/// Compresseur LZMA à preset fixe.
///
/// # Example
/// ```
/// use ob_codec::entropy::{decompress, LzmaCodec};
/// use ob_core::config::LzmaFormat;
///
/// let codec = LzmaCodec::new(6, LzmaFormat::Alone).unwrap();
/// let data = vec![b'.'; 4096];
/// let packed = codec.compress(&data).unwrap();
/// assert!(packed.len() < 200);
/// assert_eq!(decompress(&packed, data.len()).unwrap(), data);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct LzmaCodec {
    preset: u32,
    format: LzmaFormat,
}

impl LzmaCodec {
    /// # Errors
    /// `Compression` when `preset > 9`.
    pub fn new(preset: u32, format: LzmaFormat) -> Result<Self, CodecError> {
        if preset > 9 {
            return Err(CodecError::Compression(format!(
                "preset {preset} hors de 0..=9"
            )));
        }
        Ok(Self { preset, format })
    }

    /// Codec from the compression section.
    ///
    /// # Errors
    /// Same as [`LzmaCodec::new`].
    pub fn from_config(config: &CompressionConfig) -> Result<Self, CodecError> {
        Self::new(config.lzma_preset, config.lzma_format)
    }

    fn encoder_stream(&self) -> Result<Stream, xz2::stream::Error> {
        match self.format {
            LzmaFormat::Alone => Stream::new_lzma_encoder(&LzmaOptions::new_preset(self.preset)?),
            LzmaFormat::Xz => Stream::new_easy_encoder(self.preset, Check::Crc64),
        }
    }

    /// Compress `data` into a standalone `.lzma` or `.xz` stream.
    ///
    /// # Errors
    /// `Compression` if liblzma refuses the options, `Io` on encoder failure.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let stream = self
            .encoder_stream()
            .map_err(|e| CodecError::Compression(e.to_string()))?;
        let mut encoder = XzEncoder::new_stream(Vec::with_capacity(data.len() / 4 + 64), stream);
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }
}

/// Decompress a `.lzma` or `.xz` stream (auto-detected) of `expected` bytes.
///
/// Reads at most `expected + 1` bytes so a lying header cannot inflate
/// memory usage.
///
/// # Errors
/// `Decompression` for a corrupt stream, `RawSizeMismatch` when the output
/// length differs from `expected`.
pub fn decompress(data: &[u8], expected: usize) -> Result<Vec<u8>, FrameDecodeError> {
    let stream = Stream::new_auto_decoder(u64::MAX, 0)
        .map_err(|e| FrameDecodeError::Decompression(e.to_string()))?;
    let decoder = XzDecoder::new_stream(data, stream);

    let mut out = Vec::with_capacity(expected.min(1 << 24));
    decoder
        .take(expected as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| FrameDecodeError::Decompression(e.to_string()))?;

    if out.len() != expected {
        return Err(FrameDecodeError::RawSizeMismatch {
            declared: u32::try_from(expected).unwrap_or(u32::MAX),
            actual: out.len(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        br#"[[" ",40],["@",3],[".",77]]"#.repeat(50)
    }

    #[test]
    fn both_formats_round_trip() {
        for format in [LzmaFormat::Alone, LzmaFormat::Xz] {
            let codec = LzmaCodec::new(6, format).unwrap();
            let data = sample();
            let packed = codec.compress(&data).unwrap();
            assert_eq!(decompress(&packed, data.len()).unwrap(), data);
        }
    }

    #[test]
    fn xz_stream_carries_magic() {
        let packed = LzmaCodec::new(1, LzmaFormat::Xz)
            .unwrap()
            .compress(b"hello")
            .unwrap();
        assert_eq!(&packed[..6], &[0xFD, b'7', b'z', b'X', b'Z', 0x00]);
    }

    #[test]
    fn every_preset_is_accepted() {
        let data = sample();
        for preset in 0..=9 {
            let packed = LzmaCodec::new(preset, LzmaFormat::Alone)
                .unwrap()
                .compress(&data)
                .unwrap();
            assert_eq!(decompress(&packed, data.len()).unwrap(), data);
        }
        assert!(LzmaCodec::new(10, LzmaFormat::Alone).is_err());
    }

    #[test]
    fn corrupt_stream_is_a_decompression_error() {
        let err = decompress(&[0xFF; 32], 10).unwrap_err();
        assert!(matches!(err, FrameDecodeError::Decompression(_)));
    }

    #[test]
    fn size_mismatch_is_detected() {
        let codec = LzmaCodec::new(6, LzmaFormat::Alone).unwrap();
        let packed = codec.compress(b"0123456789").unwrap();
        assert_eq!(
            decompress(&packed, 4),
            Err(FrameDecodeError::RawSizeMismatch {
                declared: 4,
                actual: 5
            })
        );
        assert!(matches!(
            decompress(&packed, 20),
            Err(FrameDecodeError::RawSizeMismatch { actual: 10, .. })
        ));
    }
}
