use ob_core::config::CompressionConfig;
use ob_core::frame::CharacterGrid;
use serde::Serialize;

use crate::frame::CompressedFrame;

/// Qualité de compression selon les seuils configurés.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RatioRating {
    /// Sous le seuil acceptable.
    Poor,
    /// >= `acceptable_ratio`.
    Acceptable,
    /// >= `good_ratio`.
    Good,
    /// >= `excellent_ratio`.
    Excellent,
}

impl RatioRating {
    /// Classify `ratio` against the configured thresholds.
    ///
    /// # Example
    /// ```
    /// use ob_codec::stats::RatioRating;
    /// use ob_core::config::CompressionConfig;
    /// let config = CompressionConfig::default();
    /// assert_eq!(RatioRating::classify(12.0, &config), RatioRating::Excellent);
    /// assert_eq!(RatioRating::classify(5.0, &config), RatioRating::Acceptable);
    /// assert_eq!(RatioRating::classify(2.0, &config), RatioRating::Poor);
    /// ```
    #[must_use]
    pub fn classify(ratio: f64, config: &CompressionConfig) -> Self {
        if ratio >= config.excellent_ratio {
            Self::Excellent
        } else if ratio >= config.good_ratio {
            Self::Good
        } else if ratio >= config.acceptable_ratio {
            Self::Acceptable
        } else {
            Self::Poor
        }
    }

    /// Libellé court.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Poor => "poor",
            Self::Acceptable => "acceptable",
            Self::Good => "good",
            Self::Excellent => "excellent",
        }
    }
}

/// Ratio d'une frame : octets texte de la grille / octets compressés.
#[must_use]
pub fn grid_ratio(grid: &CharacterGrid, frame: &CompressedFrame) -> f64 {
    ratio(grid.byte_size() as u64, frame.payload.len() as u64)
}

fn ratio(raw: u64, compressed: u64) -> f64 {
    if compressed == 0 {
        0.0
    } else {
        raw as f64 / compressed as f64
    }
}

/// Statistiques cumulées d'un encodage. Purement indicatives : un ratio
/// faible ne bloque jamais l'encodage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct CompressionStats {
    /// Frames comptées.
    pub frames: u32,
    /// Octets texte des grilles (UTF-8, sans sauts de ligne).
    pub grid_bytes: u64,
    /// Octets des listes de runs sérialisées.
    pub rle_bytes: u64,
    /// Octets compressés.
    pub compressed_bytes: u64,
}

impl CompressionStats {
    /// Add one frame.
    pub fn record(&mut self, grid: &CharacterGrid, frame: &CompressedFrame) {
        self.frames += 1;
        self.grid_bytes += grid.byte_size() as u64;
        self.rle_bytes += u64::from(frame.raw_size);
        self.compressed_bytes += frame.payload.len() as u64;
    }

    /// Aggregate ratio, 0 when nothing was recorded.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        ratio(self.grid_bytes, self.compressed_bytes)
    }

    /// Rating of the aggregate ratio.
    #[must_use]
    pub fn rating(&self, config: &CompressionConfig) -> RatioRating {
        RatioRating::classify(self.ratio(), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameKind;

    fn frame(raw_size: u32, payload: usize) -> CompressedFrame {
        CompressedFrame {
            index: 0,
            kind: FrameKind::Intra,
            timestamp: 0.0,
            raw_size,
            payload: vec![0; payload],
        }
    }

    #[test]
    fn aggregate_ratio() {
        let grid = CharacterGrid::filled(10, 10, '.', 0, 0.0).unwrap();
        let mut stats = CompressionStats::default();
        stats.record(&grid, &frame(30, 10));
        stats.record(&grid, &frame(30, 30));
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.grid_bytes, 200);
        assert_eq!(stats.rle_bytes, 60);
        assert!((stats.ratio() - 5.0).abs() < 1e-9);
        assert_eq!(
            stats.rating(&CompressionConfig::default()),
            RatioRating::Acceptable
        );
    }

    #[test]
    fn empty_stats_have_zero_ratio() {
        let stats = CompressionStats::default();
        assert_eq!(stats.ratio(), 0.0);
        assert_eq!(stats.rating(&CompressionConfig::default()), RatioRating::Poor);
    }

    #[test]
    fn ratings_are_ordered() {
        assert!(RatioRating::Excellent > RatioRating::Good);
        assert!(RatioRating::Acceptable > RatioRating::Poor);
        assert_eq!(RatioRating::Good.label(), "good");
    }
}
