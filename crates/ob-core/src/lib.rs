/// Types partagés, configuration et erreurs pour OBFUSCII.
///
/// Ce crate ne dépend d'aucun autre crate du workspace : frames de
/// luminance, grilles de caractères, rampes, configuration du codec et le
/// trait [`traits::FrameSource`].
pub mod config;
pub mod error;
pub mod frame;
pub mod ramp;
pub mod traits;

pub use config::CodecConfig;
pub use error::CoreError;
pub use frame::{CharacterGrid, RasterFrame};
pub use ramp::Ramp;
pub use traits::FrameSource;
