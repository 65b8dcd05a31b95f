use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ramp::{DEFAULT_FEATURE_COUNT, RAMP_STANDARD, Ramp};

/// Noms des presets built-in, dans l'ordre de [`CodecConfig::preset`].
pub const PRESET_NAMES: &[&str] = &["default", "high_quality", "high_compression", "fast"];

/// Configuration complète de l'encodeur.
///
/// Sérialisable en TOML. Chaque section et chaque champ est optionnel dans
/// le fichier et prend sa valeur par défaut sinon. Passée explicitement à
/// chaque étage : aucun état global.
///
/// # Example
/// ```
/// use ob_core::config::CodecConfig;
/// let config = CodecConfig::default();
/// assert_eq!(config.smoothing.gaussian_kernel_size, 9);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CodecConfig {
    /// Cascade de filtres avant conversion.
    pub smoothing: SmoothingConfig,
    /// Rampe, hystérésis et grille d'échantillonnage.
    pub conversion: ConversionConfig,
    /// Les quatre étages de nettoyage.
    pub cleanup: CleanupConfig,
    /// LZMA et seuils de ratio.
    pub compression: CompressionConfig,
}

/// Progressive smoothing parameters.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Diamètre du filtre bilatéral (impair).
    pub bilateral_diameter: u32,
    /// Sigma sur l'écart de luminance.
    pub bilateral_sigma_color: f32,
    /// Sigma sur la distance spatiale.
    pub bilateral_sigma_space: f32,
    /// Noyau gaussien (impair).
    pub gaussian_kernel_size: u32,
    /// Noyau médian (impair).
    pub median_kernel_size: u32,
    /// Clip limit CLAHE (> 0).
    pub clahe_clip_limit: f32,
    /// Grille de tuiles CLAHE (colonnes, lignes).
    pub clahe_tile_grid: (u32, u32),
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            bilateral_diameter: 15,
            bilateral_sigma_color: 80.0,
            bilateral_sigma_space: 80.0,
            gaussian_kernel_size: 9,
            median_kernel_size: 5,
            clahe_clip_limit: 1.5,
            clahe_tile_grid: (8, 8),
        }
    }
}

impl SmoothingConfig {
    /// Check kernel sizes, sigmas and CLAHE parameters.
    ///
    /// # Errors
    /// `InvalidKernel` for an even or zero kernel, `Config` otherwise.
    pub fn validate(&self) -> Result<(), CoreError> {
        check_kernel("bilateral_diameter", self.bilateral_diameter)?;
        check_kernel("gaussian_kernel_size", self.gaussian_kernel_size)?;
        check_kernel("median_kernel_size", self.median_kernel_size)?;
        if !positive(self.bilateral_sigma_color) || !positive(self.bilateral_sigma_space) {
            return Err(CoreError::Config(
                "les sigmas du filtre bilatéral doivent être positifs".into(),
            ));
        }
        if !positive(self.clahe_clip_limit) {
            return Err(CoreError::Config(
                "clahe_clip_limit doit être positif".into(),
            ));
        }
        if self.clahe_tile_grid.0 == 0 || self.clahe_tile_grid.1 == 0 {
            return Err(CoreError::Config(
                "clahe_tile_grid doit contenir au moins une tuile".into(),
            ));
        }
        Ok(())
    }
}

fn positive(v: f32) -> bool {
    v.is_finite() && v > 0.0
}

fn check_kernel(name: &'static str, size: u32) -> Result<(), CoreError> {
    if size == 0 || size % 2 == 0 {
        return Err(CoreError::InvalidKernel { name, size });
    }
    Ok(())
}

/// Thème d'affichage. `Light` inverse la rampe avant le mapping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Texte clair sur fond sombre.
    #[default]
    Dark,
    /// Texte sombre sur fond clair.
    Light,
}

/// Character conversion parameters.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ConversionConfig {
    /// Rampe, du plus sombre au plus clair.
    pub ramp: String,
    /// Thème de rendu.
    pub theme: Theme,
    /// Hystérésis anti-flicker, en unités de luminance. 0 = désactivée.
    pub hysteresis_threshold: u32,
    /// Largeur de la grille en caractères.
    pub width: u32,
    /// Hauteur forcée. `None` = dérivée du ratio source et de `aspect_compensation`.
    pub height: Option<u32>,
    /// Compensation du ratio des cellules terminal (hauteur / largeur d'un glyphe).
    pub aspect_compensation: f32,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            ramp: RAMP_STANDARD.to_string(),
            theme: Theme::Dark,
            hysteresis_threshold: 8,
            width: 120,
            height: None,
            aspect_compensation: 0.55,
        }
    }
}

impl ConversionConfig {
    /// The effective ramp, reversed for the light theme.
    ///
    /// # Errors
    /// Propagates ramp construction errors.
    ///
    /// # Example
    /// ```
    /// use ob_core::config::{ConversionConfig, Theme};
    /// let mut conv = ConversionConfig::default();
    /// conv.theme = Theme::Light;
    /// assert_eq!(conv.ramp().unwrap().get(0), '@');
    /// ```
    pub fn ramp(&self) -> Result<Ramp, CoreError> {
        let ramp = Ramp::new(&self.ramp)?;
        Ok(match self.theme {
            Theme::Dark => ramp,
            Theme::Light => ramp.reversed(),
        })
    }

    /// # Errors
    /// Ramp errors, zero width/height, non-positive aspect compensation.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.ramp()?;
        if self.width == 0 || self.height == Some(0) {
            return Err(CoreError::InvalidDimensions {
                width: self.width,
                height: self.height.unwrap_or(1),
            });
        }
        if !positive(self.aspect_compensation) {
            return Err(CoreError::Config(
                "aspect_compensation doit être positif".into(),
            ));
        }
        Ok(())
    }
}

/// Cleanup pipeline parameters.
#[allow(clippy::struct_excessive_bools)]
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CleanupConfig {
    /// Étage 1 : remplacement des caractères isolés.
    pub isolated_replacement: bool,
    /// Étage 2 : consolidation `A A B A A`.
    pub run_consolidation: bool,
    /// Étage 3 : lissage temporel.
    pub temporal_smoothing: bool,
    /// Étage 4 : cohérence spatiale.
    pub spatial_coherence: bool,
    /// Fréquence en dessous de laquelle un caractère est suspect [0, 1].
    pub spatial_coherence_threshold: f32,
    /// Part minimale du caractère dominant du voisinage [0, 1].
    pub spatial_uniformity_threshold: f32,
    /// Rayon du voisinage spatial (1 = 8 voisins, 2 = 24).
    pub spatial_radius: u32,
    /// Nombre de frames qu'un changement doit tenir pour être accepté.
    pub temporal_window: usize,
    /// Caractères jamais débruités. `None` = les plus denses de la rampe.
    pub feature_chars: Option<String>,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            isolated_replacement: true,
            run_consolidation: true,
            temporal_smoothing: true,
            spatial_coherence: true,
            spatial_coherence_threshold: 0.15,
            spatial_uniformity_threshold: 0.7,
            spatial_radius: 1,
            temporal_window: 2,
            feature_chars: None,
        }
    }
}

impl CleanupConfig {
    /// Resolve the feature-preserving characters for `ramp`.
    ///
    /// # Example
    /// ```
    /// use ob_core::config::CleanupConfig;
    /// use ob_core::ramp::Ramp;
    /// let ramp = Ramp::default();
    /// assert_eq!(CleanupConfig::default().feature_chars(&ramp), vec!['@', '%', '#', '*']);
    /// ```
    #[must_use]
    pub fn feature_chars(&self, ramp: &Ramp) -> Vec<char> {
        match &self.feature_chars {
            Some(chars) => chars.chars().collect(),
            None => ramp.densest(DEFAULT_FEATURE_COUNT),
        }
    }

    /// # Errors
    /// Thresholds outside [0, 1], radius outside 1..=2, empty window.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (name, v) in [
            ("spatial_coherence_threshold", self.spatial_coherence_threshold),
            ("spatial_uniformity_threshold", self.spatial_uniformity_threshold),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(CoreError::Config(format!(
                    "{name} doit être dans [0, 1] (reçu {v})"
                )));
            }
        }
        if !(1..=2).contains(&self.spatial_radius) {
            return Err(CoreError::Config(format!(
                "spatial_radius doit valoir 1 ou 2 (reçu {})",
                self.spatial_radius
            )));
        }
        if self.temporal_window == 0 {
            return Err(CoreError::Config("temporal_window doit être >= 1".into()));
        }
        Ok(())
    }
}

/// Format du flux LZMA.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LzmaFormat {
    /// `.lzma` legacy (LZMA1, pas de checksum).
    #[default]
    Alone,
    /// `.xz` avec CRC64.
    Xz,
}

/// Compression parameters and ratio thresholds.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CompressionConfig {
    /// Preset LZMA, 0 (rapide) à 9 (meilleur ratio).
    pub lzma_preset: u32,
    /// Format du flux compressé.
    pub lzma_format: LzmaFormat,
    /// Décompresser chaque frame après encodage pour vérifier l'aller-retour.
    pub verify_round_trip: bool,
    /// Ratio minimal acceptable.
    pub acceptable_ratio: f64,
    /// Seuil "bon".
    pub good_ratio: f64,
    /// Seuil "excellent".
    pub excellent_ratio: f64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            lzma_preset: 6,
            lzma_format: LzmaFormat::Alone,
            verify_round_trip: true,
            acceptable_ratio: 5.0,
            good_ratio: 7.0,
            excellent_ratio: 10.0,
        }
    }
}

impl CompressionConfig {
    /// # Errors
    /// Preset above 9, ratios not ordered `1 <= acceptable <= good <= excellent`.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.lzma_preset > 9 {
            return Err(CoreError::Config(format!(
                "lzma_preset doit être dans 0..=9 (reçu {})",
                self.lzma_preset
            )));
        }
        let ordered = self.acceptable_ratio >= 1.0
            && self.acceptable_ratio <= self.good_ratio
            && self.good_ratio <= self.excellent_ratio;
        if !ordered {
            return Err(CoreError::Config(
                "seuils de ratio attendus : 1 <= acceptable <= good <= excellent".into(),
            ));
        }
        Ok(())
    }
}

impl CodecConfig {
    /// Validate every section.
    ///
    /// # Errors
    /// Returns the first configuration error found.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.smoothing.validate()?;
        self.conversion.validate()?;
        self.cleanup.validate()?;
        self.compression.validate()?;
        Ok(())
    }

    /// Built-in preset by name, see [`PRESET_NAMES`].
    ///
    /// # Example
    /// ```
    /// use ob_core::config::CodecConfig;
    /// let fast = CodecConfig::preset("fast").unwrap();
    /// assert!(!fast.cleanup.temporal_smoothing);
    /// assert!(CodecConfig::preset("nope").is_none());
    /// ```
    #[must_use]
    pub fn preset(name: &str) -> Option<Self> {
        let mut config = Self::default();
        match name {
            "default" => {}
            "high_quality" => {
                config.smoothing.bilateral_diameter = 9;
                config.smoothing.gaussian_kernel_size = 5;
                config.smoothing.median_kernel_size = 3;
                config.smoothing.clahe_clip_limit = 1.0;
                config.cleanup.isolated_replacement = false;
                config.cleanup.spatial_coherence_threshold = 0.1;
                config.cleanup.spatial_uniformity_threshold = 0.8;
            }
            "high_compression" => {
                config.smoothing.bilateral_diameter = 21;
                config.smoothing.gaussian_kernel_size = 13;
                config.smoothing.median_kernel_size = 7;
                config.smoothing.clahe_clip_limit = 2.0;
                config.cleanup.spatial_coherence_threshold = 0.2;
                config.cleanup.spatial_uniformity_threshold = 0.6;
                config.compression.lzma_preset = 9;
            }
            "fast" => {
                config.smoothing.bilateral_diameter = 9;
                config.smoothing.gaussian_kernel_size = 5;
                config.smoothing.median_kernel_size = 3;
                config.cleanup.temporal_smoothing = false;
                config.cleanup.spatial_coherence = false;
                config.compression.lzma_preset = 1;
            }
            _ => return None,
        }
        Some(config)
    }

    /// JSON form embedded in the container metadata.
    #[must_use]
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Charge un fichier TOML, fusionne avec les valeurs par défaut et valide.
///
/// # Errors
/// Returns an error if the file cannot be read, parsed, or fails validation.
///
/// # Example
/// ```no_run
/// use ob_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<CodecConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;

    let config: CodecConfig = toml::from_str(&content)
        .with_context(|| format!("Erreur de parsing TOML dans {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("Configuration rejetée : {}", path.display()))?;
    log::info!("Configuration chargée depuis {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_presets_validate() {
        for name in PRESET_NAMES {
            let config = CodecConfig::preset(name).unwrap();
            assert!(config.validate().is_ok(), "preset {name}");
        }
    }

    #[test]
    fn even_kernel_is_rejected() {
        let mut config = CodecConfig::default();
        config.smoothing.median_kernel_size = 4;
        assert_eq!(
            config.validate(),
            Err(CoreError::InvalidKernel {
                name: "median_kernel_size",
                size: 4
            })
        );
    }

    #[test]
    fn zero_kernel_is_rejected() {
        let mut config = CodecConfig::default();
        config.smoothing.gaussian_kernel_size = 0;
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidKernel { size: 0, .. })
        ));
    }

    #[test]
    fn empty_ramp_is_rejected() {
        let mut config = CodecConfig::default();
        config.conversion.ramp.clear();
        assert_eq!(config.validate(), Err(CoreError::EmptyRamp));
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let mut config = CodecConfig::default();
        config.cleanup.spatial_uniformity_threshold = 1.5;
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn partial_toml_merges_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obfuscii.toml");
        std::fs::write(
            &path,
            "[smoothing]\nmedian_kernel_size = 3\n\n[cleanup]\nspatial_coherence = false\n\n[compression]\nlzma_format = \"xz\"\n",
        )
        .unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.smoothing.median_kernel_size, 3);
        assert_eq!(config.smoothing.gaussian_kernel_size, 9);
        assert!(!config.cleanup.spatial_coherence);
        assert!(config.cleanup.temporal_smoothing);
        assert_eq!(config.compression.lzma_format, LzmaFormat::Xz);
    }

    #[test]
    fn invalid_toml_values_fail_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[smoothing]\ngaussian_kernel_size = 8\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn shipped_default_file_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/default.toml");
        assert_eq!(load_config(&path).unwrap(), CodecConfig::default());
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = CodecConfig::preset("high_compression").unwrap();
        let text = toml::to_string(&config).unwrap();
        let back: CodecConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
