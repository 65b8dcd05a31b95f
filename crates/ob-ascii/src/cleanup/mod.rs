/// Consolidation des runs `A A B A A`.
pub mod consolidation;
/// Remplacement des caractères isolés.
pub mod isolated;
/// Copie figée de voisinage.
pub mod neighbourhood;
/// Cohérence spatiale (débruitage).
pub mod spatial;
/// Lissage temporel.
pub mod temporal;

use ob_core::config::CleanupConfig;
use ob_core::error::CoreError;
use ob_core::frame::CharacterGrid;
use ob_core::ramp::Ramp;

use consolidation::RunConsolidation;
use isolated::IsolatedReplacement;
use spatial::SpatialCoherence;
use temporal::TemporalSmoother;

/// Identifie un étage dans les rapports et les logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageKind {
    /// Étage 1.
    Isolated,
    /// Étage 2.
    Consolidation,
    /// Étage 3.
    Temporal,
    /// Étage 4.
    Spatial,
}

impl StageKind {
    /// Nom lisible pour le debug.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Isolated => "isolated",
            Self::Consolidation => "consolidation",
            Self::Temporal => "temporal",
            Self::Spatial => "spatial",
        }
    }
}

/// Un étage de nettoyage. Modifie les cellules en place, jamais la taille.
///
/// # Example
/// ```
/// use ob_ascii::cleanup::{CleanupStage, StageKind};
/// use ob_core::frame::CharacterGrid;
///
/// struct Noop;
/// impl CleanupStage for Noop {
///     fn kind(&self) -> StageKind { StageKind::Spatial }
///     fn apply(&mut self, _grid: &mut CharacterGrid) -> usize { 0 }
/// }
/// ```
pub trait CleanupStage: Send {
    /// Which stage this is.
    fn kind(&self) -> StageKind;

    /// Clean `grid` in place, returns the number of cells changed.
    fn apply(&mut self, grid: &mut CharacterGrid) -> usize;
}

/// Cellules modifiées par étage, pour le diagnostic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Étage 1.
    pub isolated: usize,
    /// Étage 2.
    pub consolidated: usize,
    /// Étage 3.
    pub temporal: usize,
    /// Étage 4.
    pub spatial: usize,
}

impl CleanupReport {
    /// Sum over all stages.
    #[must_use]
    pub fn total(&self) -> usize {
        self.isolated + self.consolidated + self.temporal + self.spatial
    }

    /// Add `other` into `self`.
    pub fn accumulate(&mut self, other: &CleanupReport) {
        self.isolated += other.isolated;
        self.consolidated += other.consolidated;
        self.temporal += other.temporal;
        self.spatial += other.spatial;
    }

    fn record(&mut self, kind: StageKind, changed: usize) {
        match kind {
            StageKind::Isolated => self.isolated += changed,
            StageKind::Consolidation => self.consolidated += changed,
            StageKind::Temporal => self.temporal += changed,
            StageKind::Spatial => self.spatial += changed,
        }
    }
}

/// Les quatre étages activés, dans l'ordre fixe 1 → 4.
///
/// Avec état (lissage temporel) : appeler [`CleanupPipeline::process`] une
/// fois par frame, dans l'ordre des index.
///
/// # Example
/// ```
/// use ob_ascii::cleanup::CleanupPipeline;
/// use ob_core::config::CleanupConfig;
/// use ob_core::frame::CharacterGrid;
/// use ob_core::ramp::Ramp;
///
/// let mut pipeline = CleanupPipeline::new(&CleanupConfig::default(), &Ramp::default()).unwrap();
/// let grid = CharacterGrid::filled(8, 4, '.', 0, 0.0).unwrap();
/// let (cleaned, report) = pipeline.process(grid.clone());
/// assert_eq!(cleaned, grid);
/// assert_eq!(report.total(), 0);
/// ```
pub struct CleanupPipeline {
    stages: Vec<Box<dyn CleanupStage>>,
}

impl CleanupPipeline {
    /// Build the enabled stages.
    ///
    /// # Errors
    /// Threshold, radius or window errors from the cleanup section.
    pub fn new(config: &CleanupConfig, ramp: &Ramp) -> Result<Self, CoreError> {
        config.validate()?;
        let mut stages: Vec<Box<dyn CleanupStage>> = Vec::with_capacity(4);
        if config.isolated_replacement {
            stages.push(Box::new(IsolatedReplacement));
        }
        if config.run_consolidation {
            stages.push(Box::new(RunConsolidation));
        }
        if config.temporal_smoothing {
            stages.push(Box::new(TemporalSmoother::new(
                ramp.clone(),
                config.temporal_window,
            )));
        }
        if config.spatial_coherence {
            stages.push(Box::new(SpatialCoherence::new(
                config.feature_chars(ramp),
                config.spatial_coherence_threshold,
                config.spatial_uniformity_threshold,
                config.spatial_radius,
            )));
        }
        log::debug!(
            "Pipeline de nettoyage : [{}]",
            stages
                .iter()
                .map(|s| s.kind().name())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Self { stages })
    }

    /// Number of enabled stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Run every enabled stage over `grid`, taking ownership and handing it back.
    pub fn process(&mut self, mut grid: CharacterGrid) -> (CharacterGrid, CleanupReport) {
        let mut report = CleanupReport::default();
        for stage in &mut self.stages {
            let changed = stage.apply(&mut grid);
            report.record(stage.kind(), changed);
        }
        if report.total() > 0 {
            log::debug!(
                "Frame {} : {} cellules nettoyées {:?}",
                grid.index,
                report.total(),
                report
            );
        }
        (grid, report)
    }
}
