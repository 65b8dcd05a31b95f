use ob_core::frame::CharacterGrid;
use rayon::prelude::*;

use super::neighbourhood::Neighbourhood;
use super::{CleanupStage, StageKind};

/// Décision de débruitage spatial pour une cellule.
///
/// Fonction pure sur une copie du voisinage. Retourne le caractère de
/// remplacement, ou `None` pour conserver la cellule. Dans l'ordre :
///
/// 1. un caractère de détail (`features`) n'est jamais remplacé ;
/// 2. un caractère présent dans au moins `coherence` du voisinage est cohérent ;
/// 3. sans caractère dominant unique, le voisinage est ambigu : on conserve ;
/// 4. on ne remplace que si le dominant occupe au moins `uniformity` du voisinage.
///
/// # Example
/// ```
/// use ob_ascii::cleanup::neighbourhood::Neighbourhood;
/// use ob_ascii::cleanup::spatial::spatial_verdict;
///
/// let calm = Neighbourhood::from_chars(&['.'; 8]);
/// assert_eq!(spatial_verdict(':', &calm, &['@'], 0.15, 0.7), Some('.'));
/// assert_eq!(spatial_verdict('@', &calm, &['@'], 0.15, 0.7), None);
/// ```
#[must_use]
pub fn spatial_verdict(
    ch: char,
    neighbours: &Neighbourhood,
    features: &[char],
    coherence: f32,
    uniformity: f32,
) -> Option<char> {
    if features.contains(&ch) || neighbours.is_empty() {
        return None;
    }
    let total = neighbours.len() as f32;
    if neighbours.count_of(ch) as f32 / total >= coherence {
        return None;
    }
    let (dominant, count) = neighbours.dominant()?;
    if dominant == ch || (count as f32 / total) < uniformity {
        return None;
    }
    Some(dominant)
}

/// Étage 4 : cohérence spatiale (débruitage sel-et-poivre).
#[derive(Debug)]
pub struct SpatialCoherence {
    features: Vec<char>,
    coherence: f32,
    uniformity: f32,
    radius: u32,
}

impl SpatialCoherence {
    /// Build the stage. `features` are never replaced.
    #[must_use]
    pub fn new(features: Vec<char>, coherence: f32, uniformity: f32, radius: u32) -> Self {
        Self {
            features,
            coherence,
            uniformity,
            radius,
        }
    }
}

impl CleanupStage for SpatialCoherence {
    fn kind(&self) -> StageKind {
        StageKind::Spatial
    }

    fn apply(&mut self, grid: &mut CharacterGrid) -> usize {
        let snapshot = grid.clone();
        let width = grid.width() as usize;
        grid.cells_mut()
            .par_chunks_mut(width)
            .enumerate()
            .map(|(y, row)| {
                let mut changed = 0;
                for (x, cell) in row.iter_mut().enumerate() {
                    let n = Neighbourhood::gather(&snapshot, x as u32, y as u32, self.radius);
                    if let Some(replacement) =
                        spatial_verdict(*cell, &n, &self.features, self.coherence, self.uniformity)
                    {
                        *cell = replacement;
                        changed += 1;
                    }
                }
                changed
            })
            .sum()
    }
}
