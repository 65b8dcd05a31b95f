use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use ob_core::frame::CharacterGrid;
use ob_core::ramp::Ramp;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{CodecError, FrameDecodeError};
use crate::fallback::fallback_grid;
use crate::frame::{CompressedFrame, FrameKind, decode_frame};

/// Magic en tête de tout fichier `.txv`.
pub const MAGIC: &[u8; 8] = b"OBFUSCII";
/// Version du format binaire.
pub const FORMAT_VERSION: u32 = 1;
/// Version inscrite dans les métadonnées.
pub const METADATA_VERSION: &str = "1.0";
/// Algorithme inscrit dans les métadonnées.
pub const COMPRESSION_ALGORITHM: &str = "rle-lzma";
/// En-tête fixe de chaque frame : index, tag, padding, timestamp, tailles.
pub const FRAME_HEADER_SIZE: usize = 24;
/// Magic + version + longueur des métadonnées.
pub const PREAMBLE_SIZE: usize = 16;
/// Au-delà, une grille est refusée plutôt qu'allouée.
pub const MAX_GRID_CELLS: u64 = 1 << 26;

/// Métadonnées globales, JSON UTF-8 dans l'en-tête.
///
/// Les clés inconnues sont conservées dans `extra` et réécrites telles quelles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContainerMetadata {
    /// Version des métadonnées ("1.0").
    #[serde(default = "default_version")]
    pub version: String,
    /// Largeur de grille en caractères.
    pub width: u32,
    /// Hauteur de grille en caractères.
    pub height: u32,
    /// Images par seconde.
    pub fps: f64,
    /// Nombre de frames annoncé.
    #[serde(default)]
    pub total_frames: u32,
    /// Durée en secondes.
    #[serde(default)]
    pub duration_seconds: f64,
    /// Toujours "rle-lzma".
    #[serde(default = "default_algorithm")]
    pub compression_algorithm: String,
    /// Outil ayant produit le fichier.
    #[serde(default)]
    pub created_by: String,
    /// Date de création ISO-8601.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<String>,
    /// Vidéo source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_file: Option<String>,
    /// Ratio global octets texte / octets compressés.
    #[serde(default)]
    pub compression_ratio: f64,
    /// Rampe utilisée, dans l'ordre de luminance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ramp: Option<String>,
    /// Paramètres de traitement.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub processing: serde_json::Value,
    /// Clés non reconnues.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_version() -> String {
    METADATA_VERSION.to_string()
}

fn default_algorithm() -> String {
    COMPRESSION_ALGORITHM.to_string()
}

impl ContainerMetadata {
    /// Fresh metadata stamped with the current local time.
    ///
    /// # Example
    /// ```
    /// use ob_codec::container::ContainerMetadata;
    /// let meta = ContainerMetadata::new(120, 40, 24.0);
    /// assert_eq!(meta.created_by, "OBFUSCII");
    /// assert!(meta.creation_timestamp.is_some());
    /// ```
    #[must_use]
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            version: default_version(),
            width,
            height,
            fps,
            total_frames: 0,
            duration_seconds: 0.0,
            compression_algorithm: default_algorithm(),
            created_by: "OBFUSCII".to_string(),
            creation_timestamp: Some(chrono::Local::now().to_rfc3339()),
            original_file: None,
            compression_ratio: 0.0,
            ramp: None,
            processing: serde_json::Value::Null,
            extra: serde_json::Map::new(),
        }
    }

    /// The ramp frames were encoded with, the standard ramp when absent or invalid.
    #[must_use]
    pub fn ramp(&self) -> Ramp {
        self.ramp
            .as_deref()
            .and_then(|r| Ramp::new(r).ok())
            .unwrap_or_default()
    }

    fn check(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("dimensions nulles {}×{}", self.width, self.height));
        }
        if u64::from(self.width) * u64::from(self.height) > MAX_GRID_CELLS {
            return Err(format!("grille trop grande {}×{}", self.width, self.height));
        }
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(format!("fps invalide : {}", self.fps));
        }
        Ok(())
    }
}

/// Tampon d'ordonnancement : les frames arrivent dans n'importe quel
/// ordre, sont écrites par index croissant.
///
/// # Example
/// ```
/// use ob_codec::container::{read_container, ContainerBuilder, ContainerMetadata};
/// use ob_codec::frame::FrameEncoder;
/// use ob_core::config::CompressionConfig;
/// use ob_core::frame::CharacterGrid;
///
/// let encoder = FrameEncoder::new(&CompressionConfig::default()).unwrap();
/// let mut builder = ContainerBuilder::new(ContainerMetadata::new(4, 2, 10.0));
/// for i in [1u32, 0] {
///     let grid = CharacterGrid::filled(4, 2, '.', i, f64::from(i) / 10.0).unwrap();
///     builder.insert(encoder.encode(&grid).unwrap());
/// }
/// let bytes = builder.to_bytes().unwrap();
/// let file = read_container(&bytes).unwrap();
/// assert_eq!(file.metadata.total_frames, 2);
/// assert_eq!(file.frames[0].as_ref().unwrap().index, 0);
/// ```
#[derive(Debug)]
pub struct ContainerBuilder {
    metadata: ContainerMetadata,
    frames: BTreeMap<u32, CompressedFrame>,
}

impl ContainerBuilder {
    /// Empty builder.
    #[must_use]
    pub fn new(metadata: ContainerMetadata) -> Self {
        Self {
            metadata,
            frames: BTreeMap::new(),
        }
    }

    /// Metadata to be written.
    #[must_use]
    pub fn metadata(&self) -> &ContainerMetadata {
        &self.metadata
    }

    /// Mutable metadata, e.g. to set the final ratio.
    pub fn metadata_mut(&mut self) -> &mut ContainerMetadata {
        &mut self.metadata
    }

    /// Add a frame, replacing (and returning) any frame with the same index.
    pub fn insert(&mut self, frame: CompressedFrame) -> Option<CompressedFrame> {
        let replaced = self.frames.insert(frame.index, frame);
        if let Some(old) = &replaced {
            log::warn!("Frame {} insérée deux fois, la première est remplacée", old.index);
        }
        replaced
    }

    /// Frames buffered so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// `true` before the first insert.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Serialize the whole container.
    ///
    /// `total_frames` and `duration_seconds` are derived from the buffered
    /// frames.
    ///
    /// # Errors
    /// `EmptyContainer` without frames, `Metadata` for invalid dimensions or
    /// fps, `Json` if the metadata cannot be encoded.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        if self.frames.is_empty() {
            return Err(CodecError::EmptyContainer);
        }
        let count = u32::try_from(self.frames.len())
            .map_err(|_| CodecError::Metadata("plus de 2^32 frames".into()))?;

        let mut metadata = self.metadata.clone();
        metadata.check().map_err(CodecError::Metadata)?;
        metadata.total_frames = count;
        metadata.duration_seconds = f64::from(count) / metadata.fps;
        let meta_bytes = serde_json::to_vec(&metadata)?;
        let meta_len = u32::try_from(meta_bytes.len())
            .map_err(|_| CodecError::Metadata("métadonnées > 4 Gio".into()))?;

        let payload_total: usize = self
            .frames
            .values()
            .map(|f| FRAME_HEADER_SIZE + f.payload.len())
            .sum();
        let mut out = Vec::with_capacity(PREAMBLE_SIZE + meta_bytes.len() + 4 + payload_total);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&meta_len.to_le_bytes());
        out.extend_from_slice(&meta_bytes);
        out.extend_from_slice(&count.to_le_bytes());

        let mut expected = 0u32;
        for frame in self.frames.values() {
            if frame.index != expected {
                log::warn!("Trou dans la séquence : frame {expected} attendue, {} écrite", frame.index);
            }
            expected = frame.index.saturating_add(1);
            write_frame_record(&mut out, frame);
        }
        Ok(out)
    }

    /// Write the container to `path` atomically: staged in a temporary file
    /// in the same directory, then renamed. An interrupted write leaves no
    /// partial `.txv` behind.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    /// Serialization errors from [`ContainerBuilder::to_bytes`], `Io` on
    /// write or rename failure.
    pub fn write_atomic(&self, path: &Path) -> Result<u64, CodecError> {
        let bytes = self.to_bytes()?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut staged = tempfile::NamedTempFile::new_in(dir)?;
        staged.write_all(&bytes)?;
        staged.as_file().sync_all()?;
        staged.persist(path).map_err(|e| CodecError::Io(e.error))?;
        log::info!("Conteneur écrit : {} ({} octets)", path.display(), bytes.len());
        Ok(bytes.len() as u64)
    }
}

fn write_frame_record(out: &mut Vec<u8>, frame: &CompressedFrame) {
    out.extend_from_slice(&frame.index.to_le_bytes());
    out.push(frame.kind.tag());
    out.extend_from_slice(&[0u8; 3]);
    out.extend_from_slice(&frame.timestamp.to_le_bytes());
    out.extend_from_slice(&frame.raw_size.to_le_bytes());
    out.extend_from_slice(&frame.compressed_size().to_le_bytes());
    out.extend_from_slice(&frame.payload);
}

/// Curseur de lecture avec offset pour les messages d'erreur.
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::Malformed {
                offset: self.pos,
                reason: format!(
                    "{what} tronqué : {n} octets attendus, {} disponibles",
                    self.remaining()
                ),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u32(&mut self, what: &str) -> Result<u32, CodecError> {
        let bytes = self.take(4, what)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Lecture d'un enregistrement de frame : les erreurs restent locales.
    fn frame_record(&mut self) -> Result<Result<CompressedFrame, FrameDecodeError>, FrameDecodeError> {
        if self.remaining() < FRAME_HEADER_SIZE {
            return Err(FrameDecodeError::Truncated {
                needed: FRAME_HEADER_SIZE,
                available: self.remaining(),
            });
        }
        let h = &self.data[self.pos..self.pos + FRAME_HEADER_SIZE];
        let le32 = |at: usize| u32::from_le_bytes([h[at], h[at + 1], h[at + 2], h[at + 3]]);
        let index = le32(0);
        let tag = h[4];
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&h[8..16]);
        let timestamp = f64::from_le_bytes(ts);
        let raw_size = le32(16);
        let compressed = le32(20) as usize;

        let available = self.remaining() - FRAME_HEADER_SIZE;
        if compressed > available {
            return Err(FrameDecodeError::Truncated {
                needed: FRAME_HEADER_SIZE + compressed,
                available: self.remaining(),
            });
        }
        let start = self.pos + FRAME_HEADER_SIZE;
        let payload = &self.data[start..start + compressed];
        self.pos = start + compressed;

        Ok(FrameKind::from_tag(tag).map(|kind| CompressedFrame {
            index,
            kind,
            timestamp,
            raw_size,
            payload: payload.to_vec(),
        }))
    }
}

/// Conteneur `.txv` parsé. Les payloads ne sont pas encore décompressés.
///
/// `frames[i]` est l'enregistrement à la position `i`, ou l'erreur qui le
/// rend illisible (tag inconnu, troncature).
#[derive(Debug)]
pub struct TxvFile {
    /// Version du format binaire.
    pub version: u32,
    /// Métadonnées globales.
    pub metadata: ContainerMetadata,
    /// Nombre de frames annoncé dans l'en-tête.
    pub declared_frames: u32,
    /// Taille du préambule, des métadonnées et du compteur de frames.
    pub header_size: usize,
    /// Taille totale lue.
    pub file_size: usize,
    /// Enregistrements, dans l'ordre du fichier.
    pub frames: Vec<Result<CompressedFrame, FrameDecodeError>>,
}

/// Parse a container.
///
/// The preamble, metadata and frame count are validated strictly: a count
/// larger than the remaining bytes can hold (one fixed header per frame) is
/// fatal. Frame records are read best-effort: once a record runs past the
/// end of the data it and every following record are marked `Truncated`.
///
/// # Errors
/// `Malformed` with the failing offset for a bad magic, unsupported version,
/// truncated header, unparsable metadata or impossible frame count.
pub fn read_container(data: &[u8]) -> Result<TxvFile, CodecError> {
    let mut reader = ByteReader::new(data);

    let magic = reader.take(MAGIC.len(), "magic")?;
    if magic != MAGIC {
        return Err(CodecError::Malformed {
            offset: 0,
            reason: format!("magic invalide {:?}", String::from_utf8_lossy(magic)),
        });
    }
    let version_offset = reader.pos;
    let version = reader.u32("version")?;
    if version != FORMAT_VERSION {
        return Err(CodecError::Malformed {
            offset: version_offset,
            reason: format!("version {version} non supportée"),
        });
    }

    let meta_len = reader.u32("longueur des métadonnées")? as usize;
    let meta_offset = reader.pos;
    let meta_bytes = reader.take(meta_len, "métadonnées")?;
    let metadata: ContainerMetadata =
        serde_json::from_slice(meta_bytes).map_err(|e| CodecError::Malformed {
            offset: meta_offset,
            reason: format!("métadonnées illisibles : {e}"),
        })?;
    metadata.check().map_err(|reason| CodecError::Malformed {
        offset: meta_offset,
        reason,
    })?;

    let count_offset = reader.pos;
    let declared_frames = reader.u32("nombre de frames")?;
    let header_size = reader.pos;

    // Chaque frame occupe au moins son en-tête fixe.
    let room = reader.remaining() / FRAME_HEADER_SIZE;
    if declared_frames as usize > room {
        return Err(CodecError::Malformed {
            offset: count_offset,
            reason: format!(
                "{declared_frames} frames annoncées, {} octets ne peuvent en contenir que {room}",
                reader.remaining()
            ),
        });
    }

    let mut frames = Vec::with_capacity(declared_frames as usize);
    let mut truncated: Option<FrameDecodeError> = None;
    for position in 0..declared_frames {
        if let Some(err) = &truncated {
            frames.push(Err(err.clone()));
            continue;
        }
        match reader.frame_record() {
            Ok(record) => {
                if let Err(err) = &record {
                    log::warn!("Frame {position} : {err}");
                }
                frames.push(record);
            }
            Err(err) => {
                log::warn!(
                    "Frame {position} tronquée, {} frames suivantes perdues : {err}",
                    declared_frames - position - 1
                );
                frames.push(Err(err.clone()));
                truncated = Some(err);
            }
        }
    }
    if reader.remaining() > 0 {
        log::warn!("{} octets en trop après la dernière frame", reader.remaining());
    }

    Ok(TxvFile {
        version,
        metadata,
        declared_frames,
        header_size,
        file_size: data.len(),
        frames,
    })
}

/// Résumé d'un décodage complet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodeReport {
    /// Frames décodées correctement.
    pub decoded: usize,
    /// Position et cause de chaque frame remplacée par une frame de repli.
    pub failures: Vec<(usize, FrameDecodeError)>,
}

impl DecodeReport {
    /// Number of fallback frames.
    #[must_use]
    pub fn fallback_count(&self) -> usize {
        self.failures.len()
    }

    /// `true` when every frame decoded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Séquence décodée, une grille par frame annoncée.
#[derive(Clone, Debug)]
pub struct DecodedVideo {
    /// Métadonnées du conteneur.
    pub metadata: ContainerMetadata,
    /// Grilles dans l'ordre du fichier.
    pub grids: Vec<CharacterGrid>,
    /// Frames de repli.
    pub report: DecodeReport,
}

/// Ce que `info` affiche, sans rien décompresser.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContainerInfo {
    /// Version du format binaire.
    pub version: u32,
    /// Métadonnées.
    pub metadata: ContainerMetadata,
    /// Taille du fichier.
    pub file_size: u64,
    /// Préambule + métadonnées + compteur.
    pub header_size: u64,
    /// `file_size - header_size`.
    pub frame_data_size: u64,
    /// Nombre de frames annoncé.
    pub frame_count: u32,
    /// Enregistrements lisibles.
    pub frames_readable: usize,
    /// Taille moyenne d'une frame compressée (hors en-tête).
    pub average_frame_size: f64,
}

/// Rapport de `validate`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationReport {
    /// Frames vérifiées.
    pub frames_checked: usize,
    /// Problèmes trouvés, lisibles.
    pub issues: Vec<String>,
}

impl ValidationReport {
    /// `true` without any issue.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

impl TxvFile {
    /// Parse from memory, see [`read_container`].
    ///
    /// # Errors
    /// Same as [`read_container`].
    pub fn from_bytes(data: &[u8]) -> Result<Self, CodecError> {
        read_container(data)
    }

    /// Read and parse a file.
    ///
    /// # Errors
    /// `Io` when the file cannot be read, otherwise as [`read_container`].
    pub fn open(path: &Path) -> Result<Self, CodecError> {
        let data = std::fs::read(path)?;
        read_container(&data)
    }

    /// Number of frame records (declared count).
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Ramp from the metadata.
    #[must_use]
    pub fn ramp(&self) -> Ramp {
        self.metadata.ramp()
    }

    /// Deterministic replacement for the frame at `position`.
    ///
    /// # Errors
    /// Only for zero dimensions, which [`read_container`] already rejects.
    pub fn fallback(&self, position: usize) -> Result<CharacterGrid, CodecError> {
        let index = position as u32;
        let timestamp = f64::from(index) / self.metadata.fps;
        Ok(fallback_grid(
            index,
            timestamp,
            self.metadata.width,
            self.metadata.height,
            &self.ramp(),
        )?)
    }

    /// Decode one frame, `None` past the end.
    #[must_use]
    pub fn decode_frame(&self, position: usize) -> Option<Result<CharacterGrid, FrameDecodeError>> {
        let ramp = self.ramp();
        self.frames.get(position).map(|record| {
            record.clone().and_then(|frame| {
                decode_frame(&frame, self.metadata.width, self.metadata.height, &ramp)
            })
        })
    }

    /// Decode every frame in parallel; unreadable frames become fallback frames.
    ///
    /// # Errors
    /// Only if a fallback frame cannot be built (zero dimensions).
    pub fn decode_all(&self) -> Result<DecodedVideo, CodecError> {
        let ramp = self.ramp();
        let (w, h) = (self.metadata.width, self.metadata.height);
        let decoded: Vec<Result<CharacterGrid, FrameDecodeError>> = self
            .frames
            .par_iter()
            .map(|record| match record {
                Ok(frame) => decode_frame(frame, w, h, &ramp),
                Err(err) => Err(err.clone()),
            })
            .collect();

        let mut report = DecodeReport::default();
        let mut grids = Vec::with_capacity(decoded.len());
        for (position, result) in decoded.into_iter().enumerate() {
            match result {
                Ok(grid) => {
                    report.decoded += 1;
                    grids.push(grid);
                }
                Err(err) => {
                    log::warn!("Frame {position} remplacée par une frame de repli : {err}");
                    grids.push(self.fallback(position)?);
                    report.failures.push((position, err));
                }
            }
        }
        if !report.is_clean() {
            log::warn!(
                "{} frame(s) de repli sur {}",
                report.fallback_count(),
                grids.len()
            );
        }
        Ok(DecodedVideo {
            metadata: self.metadata.clone(),
            grids,
            report,
        })
    }

    /// Size summary without decompressing anything.
    #[must_use]
    pub fn info(&self) -> ContainerInfo {
        let readable: Vec<&CompressedFrame> = self.frames.iter().filter_map(|f| f.as_ref().ok()).collect();
        let payload: u64 = readable.iter().map(|f| f.payload.len() as u64).sum();
        let average_frame_size = if readable.is_empty() {
            0.0
        } else {
            payload as f64 / readable.len() as f64
        };
        ContainerInfo {
            version: self.version,
            metadata: self.metadata.clone(),
            file_size: self.file_size as u64,
            header_size: self.header_size as u64,
            frame_data_size: (self.file_size - self.header_size) as u64,
            frame_count: self.declared_frames,
            frames_readable: readable.len(),
            average_frame_size,
        }
    }
}

/// Full integrity check: metadata fields, frame count, index order, and
/// that every frame decodes without fallback.
///
/// # Example
/// ```
/// use ob_codec::container::{validate_container, ContainerBuilder, ContainerMetadata, TxvFile};
/// use ob_codec::frame::FrameEncoder;
/// use ob_core::config::CompressionConfig;
/// use ob_core::frame::CharacterGrid;
///
/// let encoder = FrameEncoder::new(&CompressionConfig::default()).unwrap();
/// let mut builder = ContainerBuilder::new(ContainerMetadata::new(3, 3, 12.0));
/// builder.insert(encoder.encode(&CharacterGrid::filled(3, 3, '#', 0, 0.0).unwrap()).unwrap());
/// let file = TxvFile::from_bytes(&builder.to_bytes().unwrap()).unwrap();
/// assert!(validate_container(&file).is_valid());
/// ```
#[must_use]
pub fn validate_container(file: &TxvFile) -> ValidationReport {
    let mut report = ValidationReport::default();
    let meta = &file.metadata;

    if meta.version.is_empty() {
        report.issues.push("champ `version` vide".into());
    }
    if meta.compression_algorithm != COMPRESSION_ALGORITHM {
        report.issues.push(format!(
            "algorithme {:?}, {COMPRESSION_ALGORITHM:?} attendu",
            meta.compression_algorithm
        ));
    }
    if meta.total_frames != file.declared_frames {
        report.issues.push(format!(
            "total_frames = {} mais {} frames dans l'en-tête",
            meta.total_frames, file.declared_frames
        ));
    }

    for position in 0..file.frame_count() {
        report.frames_checked += 1;
        if let Some(Ok(frame)) = file.frames.get(position)
            && frame.index as usize != position
        {
            report.issues.push(format!(
                "frame {position} : index {} hors séquence",
                frame.index
            ));
        }
        if let Some(Err(err)) = file.decode_frame(position) {
            report.issues.push(format!("frame {position} : {err}"));
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameEncoder;
    use ob_core::config::CompressionConfig;

    const W: u32 = 10;
    const H: u32 = 8;
    const FPS: f64 = 12.5;

    fn synthetic(index: u32) -> CharacterGrid {
        let ramp = Ramp::default();
        let cells = (0..W * H)
            .map(|i| {
                let (x, y) = (i % W, i / W);
                ramp.get(((x / 2 + y / 3 + index) % 10) as usize)
            })
            .collect();
        CharacterGrid::from_cells(W, H, cells, index, f64::from(index) / FPS).unwrap()
    }

    fn encoded(n: u32) -> (Vec<CharacterGrid>, Vec<u8>) {
        let encoder = FrameEncoder::new(&CompressionConfig::default()).unwrap();
        let mut meta = ContainerMetadata::new(W, H, FPS);
        meta.ramp = Some(Ramp::default().as_string());
        let mut builder = ContainerBuilder::new(meta);
        let grids: Vec<CharacterGrid> = (0..n).map(synthetic).collect();
        // Ordre d'arrivée inversé : le builder réordonne.
        for grid in grids.iter().rev() {
            builder.insert(encoder.encode(grid).unwrap());
        }
        (grids, builder.to_bytes().unwrap())
    }

    /// Offset du payload de la frame `position`.
    fn payload_range(bytes: &[u8], position: usize) -> std::ops::Range<usize> {
        let file = read_container(bytes).unwrap();
        let mut offset = file.header_size;
        for f in file.frames.iter().take(position) {
            offset += FRAME_HEADER_SIZE + f.as_ref().unwrap().payload.len();
        }
        let len = file.frames[position].as_ref().unwrap().payload.len();
        offset + FRAME_HEADER_SIZE..offset + FRAME_HEADER_SIZE + len
    }

    #[test]
    fn five_frames_round_trip() {
        let (grids, bytes) = encoded(5);
        let file = read_container(&bytes).unwrap();
        assert_eq!(file.metadata.width, W);
        assert_eq!(file.metadata.height, H);
        assert!((file.metadata.fps - FPS).abs() < f64::EPSILON);
        assert_eq!(file.metadata.total_frames, 5);
        assert_eq!(file.frame_count(), 5);

        let video = file.decode_all().unwrap();
        assert!(video.report.is_clean());
        assert_eq!(video.grids, grids);
    }

    #[test]
    fn layout_is_byte_exact() {
        let (_, bytes) = encoded(1);
        assert_eq!(&bytes[..8], b"OBFUSCII");
        assert_eq!(&bytes[8..12], &1u32.to_le_bytes());
        let meta_len = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;
        let meta: serde_json::Value = serde_json::from_slice(&bytes[16..16 + meta_len]).unwrap();
        assert_eq!(meta["compression_algorithm"], "rle-lzma");
        let at = 16 + meta_len;
        assert_eq!(&bytes[at..at + 4], &1u32.to_le_bytes());
        let frame = at + 4;
        assert_eq!(&bytes[frame..frame + 4], &0u32.to_le_bytes());
        assert_eq!(bytes[frame + 4], b'I');
        assert_eq!(&bytes[frame + 8..frame + 16], &0.0f64.to_le_bytes());
        let compressed = u32::from_le_bytes(bytes[frame + 20..frame + 24].try_into().unwrap());
        assert_eq!(bytes.len(), frame + FRAME_HEADER_SIZE + compressed as usize);
    }

    #[test]
    fn corrupt_payload_degrades_to_one_fallback_frame() {
        let (grids, mut bytes) = encoded(5);
        let range = payload_range(&bytes, 2);
        bytes[range].fill(0xFF);

        let video = read_container(&bytes).unwrap().decode_all().unwrap();
        assert_eq!(video.grids.len(), 5);
        assert_eq!(video.report.decoded, 4);
        assert_eq!(video.report.fallback_count(), 1);
        assert_eq!(video.report.failures[0].0, 2);
        for i in [0, 1, 3, 4] {
            assert_eq!(video.grids[i], grids[i]);
        }
        let expected = fallback_grid(2, 2.0 / FPS, W, H, &Ramp::default()).unwrap();
        assert_eq!(video.grids[2], expected);
    }

    #[test]
    fn bad_magic_is_fatal_at_offset_zero() {
        let (_, mut bytes) = encoded(1);
        bytes[0] = b'X';
        assert!(matches!(
            read_container(&bytes),
            Err(CodecError::Malformed { offset: 0, .. })
        ));
    }

    #[test]
    fn unsupported_version_is_fatal() {
        let (_, mut bytes) = encoded(1);
        bytes[8..12].copy_from_slice(&2u32.to_le_bytes());
        assert!(matches!(
            read_container(&bytes),
            Err(CodecError::Malformed { offset: 8, .. })
        ));
    }

    #[test]
    fn oversized_metadata_length_is_fatal() {
        let (_, mut bytes) = encoded(1);
        bytes[12..16].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            read_container(&bytes),
            Err(CodecError::Malformed { offset: 16, .. })
        ));
    }

    #[test]
    fn unparsable_metadata_is_fatal() {
        let (_, mut bytes) = encoded(1);
        bytes[16] = b'#';
        assert!(matches!(
            read_container(&bytes),
            Err(CodecError::Malformed { offset: 16, .. })
        ));
    }

    #[test]
    fn truncated_header_is_fatal() {
        let (_, bytes) = encoded(1);
        assert!(matches!(
            read_container(&bytes[..10]),
            Err(CodecError::Malformed { offset: 8, .. })
        ));
    }

    #[test]
    fn truncated_tail_only_loses_the_last_frames() {
        let (grids, bytes) = encoded(3);
        let cut = payload_range(&bytes, 2).start + 3;
        let video = read_container(&bytes[..cut]).unwrap().decode_all().unwrap();
        assert_eq!(video.grids.len(), 3);
        assert_eq!(video.grids[..2], grids[..2]);
        assert!(matches!(
            video.report.failures.as_slice(),
            [(2, FrameDecodeError::Truncated { .. })]
        ));
    }

    #[test]
    fn impossible_frame_count_is_fatal() {
        let (_, mut bytes) = encoded(1);
        let count_at = read_container(&bytes).unwrap().header_size - 4;
        bytes[count_at..count_at + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        match read_container(&bytes) {
            Err(CodecError::Malformed { offset, .. }) => assert_eq!(offset, count_at),
            other => panic!("Malformed attendu, obtenu {other:?}"),
        }

        bytes[count_at..count_at + 4].copy_from_slice(&20_000_000u32.to_le_bytes());
        assert!(matches!(
            read_container(&bytes),
            Err(CodecError::Malformed { .. })
        ));
    }

    #[test]
    fn fallbacks_are_bounded_by_the_data() {
        // Deux frames annoncées, la place pour deux en-têtes, une seule réelle.
        let (grids, mut bytes) = encoded(1);
        let count_at = read_container(&bytes).unwrap().header_size - 4;
        bytes[count_at..count_at + 4].copy_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; FRAME_HEADER_SIZE - 1]);
        let video = read_container(&bytes).unwrap().decode_all().unwrap();
        assert_eq!(video.grids.len(), 2);
        assert_eq!(video.grids[0], grids[0]);
        assert!(matches!(
            video.report.failures.as_slice(),
            [(1, FrameDecodeError::Truncated { .. })]
        ));
    }

    #[test]
    fn inflated_raw_size_becomes_a_fallback_frame() {
        let (grids, mut bytes) = encoded(2);
        let raw_size_at = payload_range(&bytes, 0).start - 8;
        bytes[raw_size_at..raw_size_at + 4].copy_from_slice(&u32::MAX.to_le_bytes());

        let video = read_container(&bytes).unwrap().decode_all().unwrap();
        assert!(matches!(
            video.report.failures.as_slice(),
            [(0, FrameDecodeError::RawSizeTooLarge { declared: u32::MAX, .. })]
        ));
        let expected = fallback_grid(0, 0.0, W, H, &Ramp::default()).unwrap();
        assert_eq!(video.grids[0], expected);
        assert_eq!(video.grids[1], grids[1]);
    }

    #[test]
    fn unknown_kind_only_affects_its_frame() {
        let (grids, mut bytes) = encoded(3);
        let tag_at = payload_range(&bytes, 1).start - FRAME_HEADER_SIZE + 4;
        bytes[tag_at] = b'Z';
        let video = read_container(&bytes).unwrap().decode_all().unwrap();
        assert_eq!(video.grids[0], grids[0]);
        assert_eq!(video.grids[2], grids[2]);
        assert_eq!(
            video.report.failures,
            vec![(1, FrameDecodeError::UnknownKind(b'Z'))]
        );
    }

    #[test]
    fn predicted_frames_decode_like_intra() {
        let (grids, mut bytes) = encoded(2);
        let tag_at = payload_range(&bytes, 1).start - FRAME_HEADER_SIZE + 4;
        bytes[tag_at] = b'P';
        let file = read_container(&bytes).unwrap();
        assert_eq!(file.frames[1].as_ref().unwrap().kind, FrameKind::Predicted);
        assert_eq!(file.decode_frame(1).unwrap().unwrap(), grids[1]);
    }

    #[test]
    fn random_access_and_out_of_range() {
        let (grids, bytes) = encoded(4);
        let file = TxvFile::from_bytes(&bytes).unwrap();
        assert_eq!(file.decode_frame(3).unwrap().unwrap(), grids[3]);
        assert!(file.decode_frame(4).is_none());
    }

    #[test]
    fn info_accounts_for_every_byte() {
        let (_, bytes) = encoded(5);
        let info = TxvFile::from_bytes(&bytes).unwrap().info();
        assert_eq!(info.file_size, bytes.len() as u64);
        assert_eq!(info.header_size + info.frame_data_size, info.file_size);
        assert_eq!(info.frame_count, 5);
        assert_eq!(info.frames_readable, 5);
        let payload = info.frame_data_size - 5 * FRAME_HEADER_SIZE as u64;
        assert!((info.average_frame_size - payload as f64 / 5.0).abs() < 1e-9);
    }

    #[test]
    fn validation_flags_corruption_and_count_mismatch() {
        let (_, bytes) = encoded(3);
        let clean = TxvFile::from_bytes(&bytes).unwrap();
        assert!(validate_container(&clean).is_valid());

        let mut broken = bytes.clone();
        let range = payload_range(&broken, 0);
        broken[range].fill(0xFF);
        let mut file = TxvFile::from_bytes(&broken).unwrap();
        file.metadata.total_frames = 9;
        let report = validate_container(&file);
        assert_eq!(report.frames_checked, 3);
        assert_eq!(report.issues.len(), 2);
    }

    #[test]
    fn out_of_order_indices_are_reported() {
        let encoder = FrameEncoder::new(&CompressionConfig::default()).unwrap();
        let mut builder = ContainerBuilder::new(ContainerMetadata::new(W, H, FPS));
        builder.insert(encoder.encode(&synthetic(0)).unwrap());
        builder.insert(encoder.encode(&synthetic(2)).unwrap());
        let file = TxvFile::from_bytes(&builder.to_bytes().unwrap()).unwrap();
        let report = validate_container(&file);
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].contains("index 2"));
    }

    #[test]
    fn unknown_metadata_keys_are_preserved() {
        let mut meta = ContainerMetadata::new(W, H, FPS);
        meta.extra.insert("encoder_host".into(), serde_json::json!("studio-3"));
        meta.original_file = Some("clip.mp4".into());
        let encoder = FrameEncoder::new(&CompressionConfig::default()).unwrap();
        let mut builder = ContainerBuilder::new(meta);
        builder.insert(encoder.encode(&synthetic(0)).unwrap());
        let file = TxvFile::from_bytes(&builder.to_bytes().unwrap()).unwrap();
        assert_eq!(file.metadata.extra["encoder_host"], "studio-3");
        assert_eq!(file.metadata.original_file.as_deref(), Some("clip.mp4"));
    }

    #[test]
    fn empty_builder_is_rejected() {
        let builder = ContainerBuilder::new(ContainerMetadata::new(W, H, FPS));
        assert!(matches!(builder.to_bytes(), Err(CodecError::EmptyContainer)));
    }

    #[test]
    fn atomic_write_leaves_only_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("clip.txv");
        let encoder = FrameEncoder::new(&CompressionConfig::default()).unwrap();
        let mut builder = ContainerBuilder::new(ContainerMetadata::new(W, H, FPS));
        builder.insert(encoder.encode(&synthetic(0)).unwrap());

        let written = builder.write_atomic(&target).unwrap();
        assert_eq!(written, std::fs::metadata(&target).unwrap().len());
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(TxvFile::open(&target).unwrap().frame_count(), 1);
    }

    #[test]
    fn failed_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("clip.txv");
        let builder = ContainerBuilder::new(ContainerMetadata::new(W, H, FPS));
        assert!(builder.write_atomic(&target).is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
