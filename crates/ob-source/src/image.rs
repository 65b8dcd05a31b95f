use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ob_core::frame::RasterFrame;
use ob_core::traits::FrameSource;

/// Extensions image reconnues.
pub const IMAGE_EXTS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];

/// `true` si l'extension de `path` est une image reconnue.
#[must_use]
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| IMAGE_EXTS.contains(&ext.to_lowercase().as_str()))
}

/// Charge une image en luminance 8 bits.
///
/// # Errors
/// Returns an error if the image cannot be opened or decoded.
pub fn load_luma(path: &Path, index: u32, timestamp: f64) -> Result<RasterFrame> {
    let img = image::open(path)
        .with_context(|| format!("Impossible de charger {}", path.display()))?;
    let gray = img.to_luma8();
    let (width, height) = gray.dimensions();
    RasterFrame::new(width, height, gray.into_raw(), index, timestamp)
        .with_context(|| format!("Image vide : {}", path.display()))
}

fn check_fps(fps: f64) -> Result<()> {
    if !(fps.is_finite() && fps > 0.0) {
        anyhow::bail!("fps invalide : {fps}");
    }
    Ok(())
}

/// Source d'image statique : une seule frame, puis épuisée.
///
/// La cadence est celle demandée par l'appelant et finit dans les
/// métadonnées du conteneur.
///
/// # Example
/// ```no_run
/// use ob_core::traits::FrameSource;
/// use ob_source::image::ImageSource;
/// use std::path::Path;
/// let mut source = ImageSource::new(Path::new("still.png"), 24.0).unwrap();
/// assert_eq!(source.fps(), 24.0);
/// assert!(source.next_frame().unwrap().is_some());
/// assert!(source.next_frame().unwrap().is_none());
/// ```
pub struct ImageSource {
    frame: Option<RasterFrame>,
    fps: f64,
    size: (u32, u32),
}

impl ImageSource {
    /// Load an image from disk, announced at `fps`.
    ///
    /// # Errors
    /// Returns an error if `fps` is not a positive finite number or the
    /// image cannot be loaded.
    pub fn new(path: &Path, fps: f64) -> Result<Self> {
        check_fps(fps)?;
        let frame = load_luma(path, 0, 0.0)?;
        log::info!("Image {}×{} @ {fps}fps : {}", frame.width, frame.height, path.display());
        Ok(Self {
            fps,
            size: (frame.width, frame.height),
            frame: Some(frame),
        })
    }
}

impl FrameSource for ImageSource {
    fn next_frame(&mut self) -> Result<Option<RasterFrame>> {
        Ok(self.frame.take())
    }

    fn native_size(&self) -> (u32, u32) {
        self.size
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count_hint(&self) -> Option<u64> {
        Some(1)
    }
}

/// Dossier d'images lues dans l'ordre des noms, une image par frame.
///
/// Toutes les images doivent avoir les dimensions de la première.
pub struct ImageSequenceSource {
    files: Vec<PathBuf>,
    next: usize,
    fps: f64,
    size: (u32, u32),
}

impl ImageSequenceSource {
    /// Scan `folder` (non récursif) and keep recognised images, sorted by name.
    ///
    /// # Errors
    /// Returns an error if the folder cannot be read, contains no image,
    /// or the first image cannot be decoded.
    pub fn new(folder: &Path, fps: f64, max_frames: Option<usize>) -> Result<Self> {
        check_fps(fps)?;
        let mut files = Vec::new();
        for entry in fs::read_dir(folder)
            .with_context(|| format!("Impossible de lire le dossier {}", folder.display()))?
        {
            let path = entry?.path();
            if path.is_file() && is_image_path(&path) {
                files.push(path);
            }
        }
        files.sort();
        if let Some(max) = max_frames {
            files.truncate(max);
        }
        let Some(first) = files.first() else {
            anyhow::bail!("Aucune image trouvée dans {}", folder.display());
        };
        let first_frame = load_luma(first, 0, 0.0)?;
        log::info!(
            "Séquence de {} images {}×{} @ {fps}fps : {}",
            files.len(),
            first_frame.width,
            first_frame.height,
            folder.display()
        );
        Ok(Self {
            size: (first_frame.width, first_frame.height),
            files,
            next: 0,
            fps,
        })
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<RasterFrame>> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        let index = u32::try_from(self.next).context("Trop d'images")?;
        let frame = load_luma(path, index, f64::from(index) / self.fps)?;
        if (frame.width, frame.height) != self.size {
            anyhow::bail!(
                "{} fait {}×{}, la séquence est en {}×{}",
                path.display(),
                frame.width,
                frame.height,
                self.size.0,
                self.size.1
            );
        }
        self.next += 1;
        Ok(Some(frame))
    }

    fn native_size(&self) -> (u32, u32) {
        self.size
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count_hint(&self) -> Option<u64> {
        Some(self.files.len() as u64)
    }
}
