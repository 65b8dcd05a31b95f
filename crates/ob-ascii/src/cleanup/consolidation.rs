use ob_core::frame::CharacterGrid;
use rayon::prelude::*;

use super::{CleanupStage, StageKind};

/// Étage 2 : absorbe un caractère isolé entre deux paires identiques
/// (`A A B A A` → `A A A A A`), ligne par ligne, jusqu'à stabilité.
#[derive(Debug, Default)]
pub struct RunConsolidation;

/// Consolidate one row in place, returns the number of cells changed.
///
/// # Example
/// ```
/// use ob_ascii::cleanup::consolidation::consolidate_row;
/// let mut row: Vec<char> = "..#..::".chars().collect();
/// assert_eq!(consolidate_row(&mut row), 1);
/// assert_eq!(row.iter().collect::<String>(), ".....::");
/// ```
pub fn consolidate_row(row: &mut [char]) -> usize {
    if row.len() < 5 {
        return 0;
    }
    let mut total = 0;
    loop {
        let mut changed = 0;
        let mut i = 0;
        while i + 4 < row.len() {
            let a = row[i];
            if row[i + 1] == a && row[i + 3] == a && row[i + 4] == a && row[i + 2] != a {
                row[i + 2] = a;
                changed += 1;
                i += 5;
            } else {
                i += 1;
            }
        }
        if changed == 0 {
            return total;
        }
        total += changed;
    }
}

impl CleanupStage for RunConsolidation {
    fn kind(&self) -> StageKind {
        StageKind::Consolidation
    }

    fn apply(&mut self, grid: &mut CharacterGrid) -> usize {
        let width = grid.width() as usize;
        grid.cells_mut()
            .par_chunks_mut(width)
            .map(consolidate_row)
            .sum()
    }
}
