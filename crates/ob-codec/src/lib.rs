/// Codec de frames et conteneur `.txv` pour OBFUSCII.
///
/// Grille → runs → JSON → LZMA par frame, puis un conteneur binaire
/// little-endian à accès aléatoire. Le décodage ne s'arrête jamais sur une
/// frame illisible : elle est remplacée par une frame de repli déterministe.
pub mod container;
pub mod entropy;
pub mod error;
pub mod fallback;
pub mod frame;
pub mod rle;
pub mod stats;

pub use container::{ContainerBuilder, ContainerMetadata, TxvFile, read_container, validate_container};
pub use error::{CodecError, FrameDecodeError};
pub use frame::{CompressedFrame, FrameEncoder, FrameKind, decode_frame};
pub use stats::{CompressionStats, RatioRating};
