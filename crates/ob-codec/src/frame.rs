use ob_core::config::CompressionConfig;
use ob_core::frame::CharacterGrid;
use ob_core::ramp::Ramp;

use crate::entropy::{LzmaCodec, decompress};
use crate::error::{CodecError, FrameDecodeError};
use crate::rle::{decode_rle, encode_rle, max_raw_size, parse_runs, serialize_runs};

/// Tag de type de frame.
///
/// `Predicted` ('P') est réservé : l'encodeur n'écrit que des frames
/// `Intra`, et le décodeur traite un payload 'P' exactement comme 'I'.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// 'I' : frame complète, compressée indépendamment.
    Intra,
    /// 'P' : réservé pour un futur codage delta.
    Predicted,
}

impl FrameKind {
    /// Byte written in the frame header.
    #[must_use]
    pub fn tag(self) -> u8 {
        match self {
            Self::Intra => b'I',
            Self::Predicted => b'P',
        }
    }

    /// Parse a header tag.
    ///
    /// # Errors
    /// `UnknownKind` for anything but `I` and `P`.
    pub fn from_tag(tag: u8) -> Result<Self, FrameDecodeError> {
        match tag {
            b'I' => Ok(Self::Intra),
            b'P' => Ok(Self::Predicted),
            other => Err(FrameDecodeError::UnknownKind(other)),
        }
    }
}

/// Frame compressée telle que stockée dans le conteneur.
#[derive(Clone, Debug, PartialEq)]
pub struct CompressedFrame {
    /// Index dans la séquence.
    pub index: u32,
    /// Type de frame.
    pub kind: FrameKind,
    /// Timestamp en secondes.
    pub timestamp: f64,
    /// Taille de la liste de runs sérialisée, avant LZMA.
    pub raw_size: u32,
    /// Flux LZMA.
    pub payload: Vec<u8>,
}

impl CompressedFrame {
    /// Payload length as written in the header.
    #[must_use]
    pub fn compressed_size(&self) -> u32 {
        self.payload.len() as u32
    }
}

/// Grille → RLE → JSON → LZMA, avec vérification d'aller-retour optionnelle.
///
/// Sans état : partageable entre les workers.
///
/// # Example
/// ```
/// use ob_codec::frame::{decode_frame, FrameEncoder};
/// use ob_core::config::CompressionConfig;
/// use ob_core::frame::CharacterGrid;
/// use ob_core::ramp::Ramp;
///
/// let encoder = FrameEncoder::new(&CompressionConfig::default()).unwrap();
/// let grid = CharacterGrid::filled(40, 10, '.', 3, 0.1).unwrap();
/// let frame = encoder.encode(&grid).unwrap();
/// assert_eq!(frame.index, 3);
/// let back = decode_frame(&frame, 40, 10, &Ramp::default()).unwrap();
/// assert_eq!(back, grid);
/// ```
#[derive(Clone, Debug)]
pub struct FrameEncoder {
    codec: LzmaCodec,
    verify: bool,
}

impl FrameEncoder {
    /// # Errors
    /// `Compression` for an out-of-range preset.
    pub fn new(config: &CompressionConfig) -> Result<Self, CodecError> {
        Ok(Self {
            codec: LzmaCodec::from_config(config)?,
            verify: config.verify_round_trip,
        })
    }

    /// Compress one grid.
    ///
    /// # Errors
    /// `Compression`/`Io` from LZMA, `RoundTrip` when verification is on and
    /// the payload does not decode back to `grid`.
    pub fn encode(&self, grid: &CharacterGrid) -> Result<CompressedFrame, CodecError> {
        let raw = serialize_runs(&encode_rle(grid))?;
        let raw_size = u32::try_from(raw.len())
            .map_err(|_| CodecError::Compression(format!("liste de runs de {} octets", raw.len())))?;
        let payload = self.codec.compress(&raw)?;

        if self.verify && !Self::survives(&payload, &raw, grid) {
            return Err(CodecError::RoundTrip { index: grid.index });
        }

        Ok(CompressedFrame {
            index: grid.index,
            kind: FrameKind::Intra,
            timestamp: grid.timestamp,
            raw_size,
            payload,
        })
    }

    fn survives(payload: &[u8], raw: &[u8], grid: &CharacterGrid) -> bool {
        let Ok(back) = decompress(payload, raw.len()) else {
            return false;
        };
        if back != raw {
            return false;
        }
        parse_runs(&back)
            .and_then(|runs| decode_rle(&runs, grid.width(), grid.height()))
            .is_ok_and(|cells| cells == grid.cells())
    }
}

/// LZMA → JSON → RLE → grille.
///
/// 'I' and 'P' payloads are decoded identically. The announced raw size
/// is checked against [`max_raw_size`] before anything is decompressed.
///
/// # Errors
/// Any [`FrameDecodeError`]; the caller substitutes a fallback frame.
pub fn decode_frame(
    frame: &CompressedFrame,
    width: u32,
    height: u32,
    ramp: &Ramp,
) -> Result<CharacterGrid, FrameDecodeError> {
    let limit = max_raw_size(width, height);
    if u64::from(frame.raw_size) > limit {
        return Err(FrameDecodeError::RawSizeTooLarge {
            declared: frame.raw_size,
            limit,
        });
    }
    let raw = decompress(&frame.payload, frame.raw_size as usize)?;
    let runs = parse_runs(&raw)?;
    if let Some(stray) = runs.iter().find(|r| !ramp.contains(r.ch)) {
        return Err(FrameDecodeError::OutOfRamp(stray.ch));
    }
    let cells = decode_rle(&runs, width, height)?;
    CharacterGrid::from_cells(width, height, cells, frame.index, frame.timestamp)
        .map_err(|e| FrameDecodeError::Payload(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::grid_ratio;
    use ob_core::config::LzmaFormat;

    fn checker(width: u32, height: u32, index: u32) -> CharacterGrid {
        let ramp = Ramp::default();
        let cells = (0..width * height)
            .map(|i| ramp.get(((i % width) / 3 + (i / width) / 2 + index) as usize % ramp.len()))
            .collect();
        CharacterGrid::from_cells(width, height, cells, index, f64::from(index) / 24.0).unwrap()
    }

    #[test]
    fn round_trip_in_both_formats() {
        for format in [LzmaFormat::Alone, LzmaFormat::Xz] {
            let config = CompressionConfig {
                lzma_format: format,
                ..CompressionConfig::default()
            };
            let encoder = FrameEncoder::new(&config).unwrap();
            let grid = checker(37, 11, 5);
            let frame = encoder.encode(&grid).unwrap();
            assert_eq!(frame.kind, FrameKind::Intra);
            assert_eq!(frame.compressed_size() as usize, frame.payload.len());
            assert_eq!(decode_frame(&frame, 37, 11, &Ramp::default()).unwrap(), grid);
        }
    }

    #[test]
    fn predicted_tag_decodes_like_intra() {
        let encoder = FrameEncoder::new(&CompressionConfig::default()).unwrap();
        let grid = checker(8, 4, 1);
        let mut frame = encoder.encode(&grid).unwrap();
        frame.kind = FrameKind::from_tag(b'P').unwrap();
        assert_eq!(decode_frame(&frame, 8, 4, &Ramp::default()).unwrap(), grid);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert_eq!(
            FrameKind::from_tag(b'X'),
            Err(FrameDecodeError::UnknownKind(b'X'))
        );
    }

    #[test]
    fn wrong_dimensions_fail_the_sum_check() {
        let encoder = FrameEncoder::new(&CompressionConfig::default()).unwrap();
        let frame = encoder.encode(&checker(6, 6, 0)).unwrap();
        assert!(matches!(
            decode_frame(&frame, 6, 5, &Ramp::default()),
            Err(FrameDecodeError::RunLengthMismatch { .. })
        ));
    }

    #[test]
    fn foreign_characters_are_rejected() {
        let encoder = FrameEncoder::new(&CompressionConfig::default()).unwrap();
        let grid = CharacterGrid::filled(4, 4, 'x', 0, 0.0).unwrap();
        let frame = encoder.encode(&grid).unwrap();
        assert_eq!(
            decode_frame(&frame, 4, 4, &Ramp::default()),
            Err(FrameDecodeError::OutOfRamp('x'))
        );
    }

    #[test]
    fn impossible_raw_size_is_refused_before_decompression() {
        let encoder = FrameEncoder::new(&CompressionConfig::default()).unwrap();
        let mut frame = encoder.encode(&checker(6, 4, 0)).unwrap();
        frame.raw_size = u32::MAX;
        assert_eq!(
            decode_frame(&frame, 6, 4, &Ramp::default()),
            Err(FrameDecodeError::RawSizeTooLarge {
                declared: u32::MAX,
                limit: max_raw_size(6, 4),
            })
        );
    }

    #[test]
    fn uniform_megapixel_grid_compresses_over_twenty_to_one() {
        let encoder = FrameEncoder::new(&CompressionConfig::default()).unwrap();
        let grid = CharacterGrid::filled(1000, 1000, ' ', 0, 0.0).unwrap();
        let frame = encoder.encode(&grid).unwrap();
        let ratio = grid_ratio(&grid, &frame);
        assert!(ratio > 20.0, "ratio {ratio}");
    }
}
