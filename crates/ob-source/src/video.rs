// Décodage vidéo par subprocess : `ffprobe` pour les métadonnées, `ffmpeg`
// pour un flux brut en niveaux de gris 8 bits sur stdout.
// Prérequis : `ffmpeg` et `ffprobe` accessibles dans PATH.

use std::io::Read;
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use anyhow::{Context, Result};
use ob_core::frame::RasterFrame;
use ob_core::traits::FrameSource;

/// Extensions vidéo reconnues.
pub const VIDEO_EXTS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm", "m4v"];

/// `true` si l'extension de `path` est une vidéo reconnue.
#[must_use]
pub fn is_video_path(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| VIDEO_EXTS.contains(&ext.to_lowercase().as_str()))
}

/// Métadonnées extraites via ffprobe.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoInfo {
    /// Largeur native en pixels.
    pub width: u32,
    /// Hauteur native en pixels.
    pub height: u32,
    /// Images par seconde (ex: 23.976, 24.0, 30.0).
    pub fps: f64,
    /// `nb_frames` du flux, absent pour certains conteneurs.
    pub frame_count: Option<u64>,
}

/// Parse un débit ffprobe `"30000/1001"` ou `"24"`.
fn parse_rate(val: &str) -> Option<f64> {
    let mut parts = val.trim().splitn(2, '/');
    let num: f64 = parts.next()?.parse().ok()?;
    let den: f64 = parts.next().map_or(Some(1.0), |s| s.parse().ok())?;
    (den > 0.0 && num > 0.0).then_some(num / den)
}

/// Parse la sortie `key=value` de ffprobe.
///
/// # Errors
/// Returns an error when no usable width/height is found.
pub fn parse_probe_output(text: &str) -> Result<VideoInfo> {
    let mut width = 0u32;
    let mut height = 0u32;
    let mut fps: Option<f64> = None;
    let mut frame_count = None;

    for line in text.lines() {
        if let Some(val) = line.strip_prefix("width=") {
            width = val.trim().parse().unwrap_or(0);
        } else if let Some(val) = line.strip_prefix("height=") {
            height = val.trim().parse().unwrap_or(0);
        } else if let Some(val) = line.strip_prefix("avg_frame_rate=") {
            fps = parse_rate(val).or(fps);
        } else if let Some(val) = line.strip_prefix("r_frame_rate=") {
            if fps.is_none() {
                fps = parse_rate(val);
            }
        } else if let Some(val) = line.strip_prefix("nb_frames=") {
            frame_count = val.trim().parse().ok().filter(|&n: &u64| n > 0);
        }
    }

    if width == 0 || height == 0 {
        anyhow::bail!("ffprobe n'a trouvé aucun flux vidéo");
    }
    Ok(VideoInfo {
        width,
        height,
        fps: fps.unwrap_or(30.0),
        frame_count,
    })
}

/// Interroge `ffprobe` pour obtenir les métadonnées du flux vidéo principal.
///
/// # Errors
/// Retourne une erreur si `ffprobe` est introuvable ou si le fichier
/// ne contient aucun flux vidéo décodable.
pub fn probe_video(path: &Path) -> Result<VideoInfo> {
    let path_str = path.to_str().context("Chemin vidéo invalide (non-UTF8)")?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,avg_frame_rate,r_frame_rate,nb_frames",
            "-of",
            "default=noprint_wrappers=1",
            "-i",
            path_str,
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .context(
            "Impossible de lancer ffprobe. Vérifiez que ffprobe est installé et dans le PATH.",
        )?;

    let info = parse_probe_output(&String::from_utf8_lossy(&output.stdout))
        .with_context(|| format!("Vidéo illisible : {}", path.display()))?;
    log::info!(
        "probe_video: {}x{} @ {:.3}fps ({:?} frames) : {}",
        info.width,
        info.height,
        info.fps,
        info.frame_count,
        path.display()
    );
    Ok(info)
}

/// Lance `ffmpeg` en sortie rawvideo gray (1 octet par pixel, sans padding).
///
/// # Errors
/// Returns an error if the process cannot be spawned.
pub fn spawn_ffmpeg_gray(path: &Path) -> Result<Child> {
    let path_str = path.to_str().context("Chemin vidéo invalide (non-UTF8)")?;
    let child = Command::new("ffmpeg")
        .args([
            "-i",
            path_str,
            "-f",
            "rawvideo",
            "-pix_fmt",
            "gray",
            "-an",
            "-hide_banner",
            "-loglevel",
            "error",
            "pipe:1",
        ])
        .stdout(Stdio::piped())
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("Impossible de lancer ffmpeg. Vérifiez qu'il est installé et dans le PATH.")?;
    log::debug!("ffmpeg spawné : {}", path.display());
    Ok(child)
}

/// Lit exactement `buf.len()` bytes depuis `reader`.
///
/// # Errors
/// Retourne `Ok(true)` si lu avec succès, `Ok(false)` sur EOF avant complétion,
/// `Err` sur erreur I/O fatale.
pub fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool> {
    let mut total = 0usize;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => return Ok(false),
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

/// Source vidéo : lecture séquentielle jusqu'à EOF ou `max_frames`.
///
/// Une frame partielle en fin de flux est ignorée.
pub struct VideoSource {
    info: VideoInfo,
    child: Child,
    stdout: ChildStdout,
    next_index: u32,
    max_frames: Option<u32>,
}

impl VideoSource {
    /// Probe then spawn the decoder.
    ///
    /// # Errors
    /// ffprobe/ffmpeg missing or the file has no video stream.
    ///
    /// # Example
    /// ```no_run
    /// use ob_core::traits::FrameSource;
    /// use ob_source::video::VideoSource;
    /// use std::path::Path;
    /// let mut source = VideoSource::open(Path::new("clip.mp4"), Some(48)).unwrap();
    /// while let Some(frame) = source.next_frame().unwrap() {
    ///     println!("{} @ {:.2}s", frame.index, frame.timestamp);
    /// }
    /// ```
    pub fn open(path: &Path, max_frames: Option<u32>) -> Result<Self> {
        let info = probe_video(path)?;
        let mut child = spawn_ffmpeg_gray(path)?;
        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            anyhow::bail!("ffmpeg sans stdout");
        };
        Ok(Self {
            info,
            child,
            stdout,
            next_index: 0,
            max_frames,
        })
    }

    /// Métadonnées du flux.
    #[must_use]
    pub fn info(&self) -> VideoInfo {
        self.info
    }
}

impl FrameSource for VideoSource {
    fn next_frame(&mut self) -> Result<Option<RasterFrame>> {
        if self.max_frames.is_some_and(|max| self.next_index >= max) {
            return Ok(None);
        }
        let (w, h) = (self.info.width, self.info.height);
        let mut luma = vec![0u8; w as usize * h as usize];
        if !read_exact_or_eof(&mut self.stdout, &mut luma)? {
            log::info!("Vidéo : EOF après {} frames", self.next_index);
            return Ok(None);
        }
        let index = self.next_index;
        self.next_index += 1;
        let frame = RasterFrame::new(w, h, luma, index, f64::from(index) / self.info.fps)?;
        Ok(Some(frame))
    }

    fn native_size(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }

    fn fps(&self) -> f64 {
        self.info.fps
    }

    fn frame_count_hint(&self) -> Option<u64> {
        match (self.info.frame_count, self.max_frames) {
            (Some(n), Some(max)) => Some(n.min(u64::from(max))),
            (Some(n), None) => Some(n),
            (None, max) => max.map(u64::from),
        }
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_fields_are_parsed() {
        let text = "width=1920\nheight=1080\navg_frame_rate=30000/1001\nr_frame_rate=30/1\nnb_frames=240\n";
        let info = parse_probe_output(text).unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
        assert!((info.fps - 29.97).abs() < 0.01);
        assert_eq!(info.frame_count, Some(240));
    }

    #[test]
    fn missing_frame_rate_falls_back() {
        let text = "width=640\nheight=360\navg_frame_rate=0/0\nr_frame_rate=25/1\nnb_frames=N/A\n";
        let info = parse_probe_output(text).unwrap();
        assert!((info.fps - 25.0).abs() < f64::EPSILON);
        assert_eq!(info.frame_count, None);
    }

    #[test]
    fn no_video_stream_is_an_error() {
        assert!(parse_probe_output("").is_err());
        assert!(parse_probe_output("width=0\nheight=0\n").is_err());
    }

    #[test]
    fn read_exact_or_eof_reports_short_reads() {
        let mut buf = [0u8; 4];
        assert!(read_exact_or_eof(&mut &[1u8, 2, 3, 4, 5][..], &mut buf).unwrap());
        assert_eq!(buf, [1, 2, 3, 4]);
        assert!(!read_exact_or_eof(&mut &[1u8, 2][..], &mut buf).unwrap());
    }

    #[test]
    fn extensions_are_case_insensitive() {
        assert!(is_video_path(Path::new("clip.MP4")));
        assert!(!is_video_path(Path::new("clip.png")));
    }
}
