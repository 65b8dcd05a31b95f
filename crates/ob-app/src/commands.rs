use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use ob_codec::container::{ContainerInfo, TxvFile, validate_container};
use ob_core::config::{CodecConfig, PRESET_NAMES, load_config};

use crate::cli::EncodeArgs;
use crate::pipeline;

/// Resolve config: preset takes priority over --config, then CLI overrides.
///
/// # Errors
/// Unknown preset, unreadable config file, or invalid override.
pub fn resolve_config(args: &EncodeArgs) -> Result<CodecConfig> {
    let mut config = if let Some(ref name) = args.preset {
        CodecConfig::preset(name).with_context(|| {
            format!("Preset inconnu : {name}. Disponibles : {}", PRESET_NAMES.join(", "))
        })?
    } else if let Some(ref path) = args.config {
        load_config(path)?
    } else {
        CodecConfig::default()
    };
    if let Some(width) = args.width {
        config.conversion.width = width;
    }
    config.validate().context("Configuration invalide")?;
    Ok(config)
}

/// `<nom>_<AAAAMMJJ_HHMMSS>.txv` dans le dossier courant.
fn default_output(input: &Path) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("obfuscii");
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let mut p = std::env::current_dir()?;
    p.push(format!("{stem}_{timestamp}.txv"));
    Ok(p)
}

/// `encode` : source → `.txv`. Ctrl+C annule sans laisser de fichier partiel.
///
/// # Errors
/// See [`pipeline::encode`].
pub fn run_encode(args: &EncodeArgs) -> Result<()> {
    let config = resolve_config(args)?;
    let output = match &args.output {
        Some(p) => p.clone(),
        None => default_output(&args.input)?,
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        log::warn!("Interruption reçue, annulation de l'encodage...");
        flag.store(true, std::sync::atomic::Ordering::Relaxed);
    })
    .context("Impossible d'installer le handler Ctrl+C")?;

    let source = ob_source::open_source(&args.input, args.fps, args.max_frames)?;
    let original = args.input.file_name().and_then(|n| n.to_str());
    let summary = pipeline::encode(source, &config, &output, original, &cancel)?;

    let mut stdout = std::io::stdout().lock();
    writeln!(
        stdout,
        "{} : {} frames {}×{}, {} octets, ratio {:.1}:1 ({}), {} cellules nettoyées",
        output.display(),
        summary.frames,
        summary.grid_size.0,
        summary.grid_size.1,
        summary.bytes_written,
        summary.stats.ratio(),
        summary.rating.label(),
        summary.cleanup.total()
    )?;
    Ok(())
}

/// Texte lisible pour `info`.
#[must_use]
pub fn format_info(info: &ContainerInfo) -> String {
    let meta = &info.metadata;
    let mut out = String::new();
    let _ = writeln!(out, "Format        : OBFUSCII v{} (métadonnées {})", info.version, meta.version);
    let _ = writeln!(out, "Grille        : {}×{} caractères", meta.width, meta.height);
    let _ = writeln!(
        out,
        "Frames        : {} ({} lisibles) @ {:.3}fps, {:.2}s",
        info.frame_count, info.frames_readable, meta.fps, meta.duration_seconds
    );
    let _ = writeln!(out, "Compression   : {}, ratio {:.1}:1", meta.compression_algorithm, meta.compression_ratio);
    if let Some(ref ramp) = meta.ramp {
        let _ = writeln!(out, "Rampe         : {ramp:?}");
    }
    if let Some(ref original) = meta.original_file {
        let _ = writeln!(out, "Source        : {original}");
    }
    if let Some(ref created) = meta.creation_timestamp {
        let _ = writeln!(out, "Créé          : {created} par {}", meta.created_by);
    }
    let _ = writeln!(
        out,
        "Tailles       : fichier {} o, en-tête {} o, frames {} o, moyenne {:.1} o/frame",
        info.file_size, info.header_size, info.frame_data_size, info.average_frame_size
    );
    out
}

/// `info` : en-tête seulement, aucune décompression.
///
/// # Errors
/// Unreadable or malformed container.
pub fn run_info(path: &Path, json: bool) -> Result<()> {
    let file = TxvFile::open(path).with_context(|| format!("Lecture de {}", path.display()))?;
    let info = file.info();
    let mut stdout = std::io::stdout().lock();
    if json {
        writeln!(stdout, "{}", serde_json::to_string_pretty(&info)?)?;
    } else {
        write!(stdout, "{}", format_info(&info))?;
    }
    Ok(())
}

/// `validate` : échoue (code de sortie non nul) si un problème est trouvé.
///
/// # Errors
/// Unreadable or malformed container, or any validation issue.
pub fn run_validate(path: &Path) -> Result<()> {
    let file = TxvFile::open(path).with_context(|| format!("Lecture de {}", path.display()))?;
    let report = validate_container(&file);
    let mut stdout = std::io::stdout().lock();
    for issue in &report.issues {
        writeln!(stdout, "  - {issue}")?;
    }
    if !report.is_valid() {
        anyhow::bail!(
            "{} : {} problème(s) sur {} frames",
            path.display(),
            report.issues.len(),
            report.frames_checked
        );
    }
    writeln!(stdout, "{} : valide ({} frames)", path.display(), report.frames_checked)?;
    Ok(())
}

/// `decode` : imprime les frames en texte, séparées par une ligne vide.
///
/// # Errors
/// Unreadable or malformed container, or a frame index out of range.
pub fn run_decode(path: &Path, frame: Option<usize>) -> Result<()> {
    let file = TxvFile::open(path).with_context(|| format!("Lecture de {}", path.display()))?;
    let mut stdout = std::io::stdout().lock();

    if let Some(i) = frame {
        let grid = match file.decode_frame(i) {
            None => anyhow::bail!("Frame {i} hors limites (0..{})", file.frame_count()),
            Some(Ok(grid)) => grid,
            Some(Err(e)) => {
                log::warn!("Frame {i} illisible, frame de repli : {e}");
                file.fallback(i)?
            }
        };
        writeln!(stdout, "{}", grid.to_text())?;
        return Ok(());
    }

    let video = file.decode_all()?;
    for grid in &video.grids {
        writeln!(stdout, "{}\n", grid.to_text())?;
    }
    if !video.report.is_clean() {
        eprintln!(
            "{} frame(s) de repli sur {}",
            video.report.fallback_count(),
            video.grids.len()
        );
    }
    Ok(())
}
