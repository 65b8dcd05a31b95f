/// Sources de frames pour OBFUSCII (image, séquence d'images, vidéo).
pub mod image;
pub mod video;

use std::path::Path;

use anyhow::Result;
use ob_core::traits::FrameSource;

/// Choisit la source selon le chemin : dossier → séquence d'images,
/// extension image → image fixe, sinon vidéo via ffmpeg.
///
/// `fps` sert aux images fixes et aux séquences ; la vidéo garde sa cadence.
///
/// # Errors
/// Returns an error if the source cannot be opened.
pub fn open_source(path: &Path, fps: f64, max_frames: Option<u32>) -> Result<Box<dyn FrameSource>> {
    if path.is_dir() {
        let max = max_frames.map(|m| m as usize);
        return Ok(Box::new(image::ImageSequenceSource::new(path, fps, max)?));
    }
    if image::is_image_path(path) {
        return Ok(Box::new(image::ImageSource::new(path, fps)?));
    }
    if !video::is_video_path(path) {
        log::warn!(
            "Extension inconnue pour {}, tentative de décodage vidéo",
            path.display()
        );
    }
    Ok(Box::new(video::VideoSource::open(path, max_frames)?))
}
