use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// OBFUSCII : vidéo → ASCII, conteneur `.txv` compressé.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encoder une vidéo, une image ou un dossier d'images en `.txv`.
    Encode(EncodeArgs),
    /// Afficher les métadonnées et tailles d'un `.txv` sans le décoder.
    Info {
        /// Fichier `.txv`.
        path: PathBuf,
        /// Sortie JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Vérifier l'intégrité complète d'un `.txv`.
    Validate {
        /// Fichier `.txv`.
        path: PathBuf,
    },
    /// Décoder et imprimer les frames en texte.
    Decode {
        /// Fichier `.txv`.
        path: PathBuf,
        /// Une seule frame (accès direct).
        #[arg(long)]
        frame: Option<usize>,
    },
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Vidéo (via ffmpeg), image, ou dossier d'images.
    pub input: PathBuf,

    /// Fichier de sortie. Défaut : `<nom>_<date>.txv` dans le dossier courant.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Fichier de configuration TOML.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Preset nommé : default, high_quality, high_compression, fast (ignore --config).
    #[arg(long)]
    pub preset: Option<String>,

    /// Largeur de la grille en caractères.
    #[arg(long)]
    pub width: Option<u32>,

    /// Cadence des images fixes et des séquences d'images.
    #[arg(long, default_value_t = 24.0)]
    pub fps: f64,

    /// Arrêter après N frames.
    #[arg(long)]
    pub max_frames: Option<u32>,
}
