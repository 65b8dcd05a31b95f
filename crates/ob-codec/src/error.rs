use ob_core::error::CoreError;
use thiserror::Error;

/// Erreurs fatales du codec : conteneur illisible, configuration, I/O,
/// ou frame qui ne survit pas à son propre aller-retour à l'encodage.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Magic, version, longueur ou métadonnées invalides.
    #[error("Conteneur malformé à l'offset {offset} : {reason}")]
    Malformed {
        /// Byte offset where validation failed.
        offset: usize,
        /// Human-readable cause.
        reason: String,
    },

    /// Décompresser ce qui vient d'être compressé ne redonne pas la grille.
    #[error("Aller-retour invalide pour la frame {index}")]
    RoundTrip {
        /// Index of the offending frame.
        index: u32,
    },

    /// Échec de l'encodeur LZMA.
    #[error("Compression LZMA : {0}")]
    Compression(String),

    /// Métadonnées impossibles à sérialiser ou incohérentes.
    #[error("Métadonnées : {0}")]
    Metadata(String),

    /// Conteneur sans aucune frame.
    #[error("Aucune frame à écrire")]
    EmptyContainer,

    /// Paramètres invalides.
    #[error(transparent)]
    Config(#[from] CoreError),

    /// Sérialisation JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Lecture / écriture fichier.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Erreur locale à une frame. Jamais propagée au-delà de la frame : le
/// décodeur la remplace par une frame de repli et continue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameDecodeError {
    /// Flux LZMA corrompu.
    #[error("décompression LZMA : {0}")]
    Decompression(String),

    /// Taille décompressée différente de la taille annoncée.
    #[error("taille brute annoncée {declared}, obtenue {actual}")]
    RawSizeMismatch {
        /// Size from the frame header.
        declared: u32,
        /// Bytes actually produced.
        actual: usize,
    },

    /// Taille brute annoncée impossible pour la grille.
    #[error("taille brute annoncée {declared}, au plus {limit} pour cette grille")]
    RawSizeTooLarge {
        /// Size from the frame header.
        declared: u32,
        /// Largest run list the grid can serialize to.
        limit: u64,
    },

    /// Liste de runs illisible.
    #[error("liste de runs illisible : {0}")]
    Payload(String),

    /// Run de longueur nulle.
    #[error("run de longueur nulle (run {position})")]
    ZeroRun {
        /// Position in the run list.
        position: usize,
    },

    /// Run qui déborde sur la ligne suivante.
    #[error("run de {len} en colonne {column} dépasse la largeur {width}")]
    RunCrossesRow {
        /// Column where the run starts.
        column: u32,
        /// Run length.
        len: u32,
        /// Grid width.
        width: u32,
    },

    /// Somme des runs différente de largeur × hauteur.
    #[error("somme des runs {actual}, {expected} attendus")]
    RunLengthMismatch {
        /// `width * height`.
        expected: u64,
        /// Sum of run lengths.
        actual: u64,
    },

    /// Caractère absent de la rampe.
    #[error("caractère {0:?} hors rampe")]
    OutOfRamp(char),

    /// En-tête ou payload au-delà de la fin des données.
    #[error("frame tronquée : {needed} octets requis, {available} disponibles")]
    Truncated {
        /// Bytes the record requires.
        needed: usize,
        /// Bytes left in the container.
        available: usize,
    },

    /// Tag de type ni 'I' ni 'P'.
    #[error("type de frame inconnu : 0x{0:02x}")]
    UnknownKind(u8),
}
