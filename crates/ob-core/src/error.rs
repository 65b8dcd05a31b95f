use thiserror::Error;

/// Errors originating from the core module.
///
/// Every variant is a configuration error: raised before any frame is
/// processed, never recovered.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Invalid configuration value or structure.
    #[error("Configuration invalide : {0}")]
    Config(String),

    /// Kernel size that is even or zero.
    #[error("Taille de noyau invalide pour {name} : {size} (impair et >= 1 requis)")]
    InvalidKernel {
        /// Name of the offending parameter.
        name: &'static str,
        /// The rejected size.
        size: u32,
    },

    /// Ramp without any character.
    #[error("La rampe de caractères est vide")]
    EmptyRamp,

    /// Ramp listing the same character twice.
    #[error("Caractère dupliqué dans la rampe : {0:?}")]
    DuplicateRampChar(char),

    /// Invalid width/height dimensions.
    #[error("Dimensions invalides : {width}×{height}")]
    InvalidDimensions {
        /// Width value.
        width: u32,
        /// Height value.
        height: u32,
    },

    /// Pixel or cell buffer whose length does not match its dimensions.
    #[error("Taille de buffer incohérente : {expected} attendus, {actual} reçus")]
    InvalidFrameData {
        /// Length implied by width × height.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },
}
