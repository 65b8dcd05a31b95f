use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::{Context, Result};
use ob_ascii::{CharacterMapper, CleanupPipeline, CleanupReport, Smoother};
use ob_codec::container::{ContainerBuilder, ContainerMetadata};
use ob_codec::frame::FrameEncoder;
use ob_codec::stats::{CompressionStats, RatioRating};
use ob_core::config::CodecConfig;
use ob_core::frame::{CharacterGrid, RasterFrame};
use ob_core::traits::FrameSource;
use rayon::prelude::*;

/// Frames lissées et compressées ensemble sur le pool rayon.
const BATCH_SIZE: usize = 32;

/// Résultat d'un encodage réussi.
#[derive(Clone, Debug)]
pub struct EncodeSummary {
    /// Frames écrites.
    pub frames: u32,
    /// Dimensions de la grille.
    pub grid_size: (u32, u32),
    /// Octets du fichier `.txv`.
    pub bytes_written: u64,
    /// Statistiques de compression cumulées.
    pub stats: CompressionStats,
    /// Qualité du ratio global.
    pub rating: RatioRating,
    /// Cellules modifiées par le nettoyage.
    pub cleanup: CleanupReport,
}

/// État d'un encodage en cours.
///
/// Le mapping et le nettoyage forment une chaîne : frame `i` dépend
/// uniquement de frame `i - 1`. Le lissage et la compression sont
/// indépendants par frame.
struct EncodeState {
    smoother: Smoother,
    mapper: CharacterMapper,
    cleanup: CleanupPipeline,
    encoder: FrameEncoder,
    previous: Option<CharacterGrid>,
    report: CleanupReport,
    builder: ContainerBuilder,
    stats: CompressionStats,
    native: (u32, u32),
    next_index: u32,
}

impl EncodeState {
    /// Mapping + nettoyage d'une frame lissée, dans l'ordre des index.
    fn step(&mut self, frame: &RasterFrame) -> Result<CharacterGrid> {
        let mapped = self
            .mapper
            .map(frame, self.previous.as_ref())
            .with_context(|| format!("Mapping de la frame {}", frame.index))?;
        self.previous = Some(mapped.clone());
        let (cleaned, report) = self.cleanup.process(mapped);
        self.report.accumulate(&report);
        Ok(cleaned)
    }

    /// Renumérote et vérifie les dimensions d'une frame source.
    fn admit(&mut self, mut frame: RasterFrame) -> Result<RasterFrame> {
        if (frame.width, frame.height) != self.native {
            anyhow::bail!(
                "Frame {} en {}×{}, la source annonce {}×{}",
                frame.index,
                frame.width,
                frame.height,
                self.native.0,
                self.native.1
            );
        }
        frame.index = self.next_index;
        self.next_index += 1;
        Ok(frame)
    }

    fn encode_batch(&mut self, batch: &[RasterFrame]) -> Result<()> {
        let smoother = &self.smoother;
        let smoothed: Vec<RasterFrame> = batch.par_iter().map(|f| smoother.apply(f)).collect();
        let grids = smoothed
            .iter()
            .map(|f| self.step(f))
            .collect::<Result<Vec<_>>>()?;
        let encoder = &self.encoder;
        let frames = grids
            .par_iter()
            .map(|g| encoder.encode(g))
            .collect::<Result<Vec<_>, _>>()?;

        for (grid, frame) in grids.iter().zip(frames) {
            self.stats.record(grid, &frame);
            self.builder.insert(frame);
        }
        log::info!("{} frames encodées", self.stats.frames);
        Ok(())
    }

    /// Consomme le canal par lots jusqu'à la fin de la source.
    fn consume(
        &mut self,
        rx: &flume::Receiver<Result<RasterFrame>>,
        cancel: &AtomicBool,
    ) -> Result<()> {
        let mut batch = Vec::with_capacity(BATCH_SIZE);
        loop {
            batch.clear();
            while batch.len() < BATCH_SIZE {
                match rx.recv() {
                    Ok(frame) => batch.push(self.admit(frame?)?),
                    Err(flume::RecvError::Disconnected) => break,
                }
            }
            if cancel.load(Ordering::Relaxed) {
                anyhow::bail!("Encodage annulé après {} frames", self.stats.frames);
            }
            if batch.is_empty() {
                return Ok(());
            }
            self.encode_batch(&batch)?;
        }
    }
}

/// Encode every frame of `source` into `output`.
///
/// Frames are read on a dedicated thread, smoothed and compressed in
/// parallel batches, while mapping and cleanup run in index order. Nothing
/// is written unless the whole source was encoded: on error or when
/// `cancel` is raised the target path is left untouched.
///
/// # Errors
/// Invalid configuration, source read errors, round-trip violations,
/// cancellation, or write failure.
pub fn encode(
    source: Box<dyn FrameSource>,
    config: &CodecConfig,
    output: &Path,
    original_file: Option<&str>,
    cancel: &AtomicBool,
) -> Result<EncodeSummary> {
    config.validate().context("Configuration invalide")?;
    let smoother = Smoother::new(&config.smoothing)?;
    let mapper = CharacterMapper::new(&config.conversion)?;
    let cleanup = CleanupPipeline::new(&config.cleanup, mapper.ramp())?;
    let encoder = FrameEncoder::new(&config.compression)?;

    let native = source.native_size();
    let grid_size = mapper.grid_size(native.0, native.1);
    let fps = source.fps();
    log::info!(
        "Encodage {}×{} px → {}×{} caractères @ {fps:.3}fps ({:?} frames attendues)",
        native.0,
        native.1,
        grid_size.0,
        grid_size.1,
        source.frame_count_hint()
    );

    let mut metadata = ContainerMetadata::new(grid_size.0, grid_size.1, fps);
    metadata.ramp = Some(mapper.ramp().as_string());
    metadata.processing = config.to_json_value();
    metadata.original_file = original_file.map(str::to_string);

    let mut state = EncodeState {
        smoother,
        mapper,
        cleanup,
        encoder,
        previous: None,
        report: CleanupReport::default(),
        builder: ContainerBuilder::new(metadata),
        stats: CompressionStats::default(),
        native,
        next_index: 0,
    };

    let (frame_tx, frame_rx) = flume::bounded::<Result<RasterFrame>>(BATCH_SIZE * 2);
    let reader = thread::Builder::new()
        .name("ob-source".to_string())
        .spawn(move || read_frames(source, &frame_tx))
        .context("Impossible de lancer le thread source")?;

    let outcome = state.consume(&frame_rx, cancel);
    // Débloque le lecteur s'il attend de la place dans le canal.
    drop(frame_rx);
    if reader.join().is_err() {
        log::warn!("Le thread source a paniqué");
    }
    outcome?;

    if state.builder.is_empty() {
        anyhow::bail!("La source n'a produit aucune frame");
    }
    let ratio = state.stats.ratio();
    state.builder.metadata_mut().compression_ratio = ratio;
    let bytes_written = state
        .builder
        .write_atomic(output)
        .with_context(|| format!("Écriture de {}", output.display()))?;

    let rating = state.stats.rating(&config.compression);
    if rating == RatioRating::Poor {
        log::warn!(
            "Ratio de compression {ratio:.1}:1 sous le seuil acceptable ({}:1)",
            config.compression.acceptable_ratio
        );
    } else {
        log::info!("Ratio de compression {ratio:.1}:1 ({})", rating.label());
    }

    Ok(EncodeSummary {
        frames: state.stats.frames,
        grid_size,
        bytes_written,
        stats: state.stats,
        rating,
        cleanup: state.report,
    })
}

/// Boucle du thread source. S'arrête à la fin de la source, à la première
/// erreur, ou quand le consommateur a abandonné.
#[allow(clippy::needless_pass_by_value)]
fn read_frames(mut source: Box<dyn FrameSource>, tx: &flume::Sender<Result<RasterFrame>>) {
    loop {
        match source.next_frame() {
            Ok(Some(frame)) => {
                if tx.send(Ok(frame)).is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(e) => {
                let _ = tx.send(Err(e));
                return;
            }
        }
    }
}
