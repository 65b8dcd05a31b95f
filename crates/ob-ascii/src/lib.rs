pub mod cleanup;
/// Moteur de conversion luminance → caractères pour OBFUSCII.
///
/// Lissage progressif, échantillonnage compensé, mapping avec hystérésis
/// et pipeline de nettoyage en quatre étages.
pub mod mapper;
pub mod sampling;
pub mod smoothing;

pub use cleanup::{CleanupPipeline, CleanupReport};
pub use mapper::CharacterMapper;
pub use smoothing::Smoother;
