use ob_core::frame::CharacterGrid;
use rayon::prelude::*;

use super::neighbourhood::Neighbourhood;
use super::{CleanupStage, StageKind};

/// Minimum de voisins pour juger une cellule (les coins en ont 3).
const MIN_NEIGHBOURS: usize = 3;

/// Étage 1 : une cellule dont aucun des 8 voisins ne partage le caractère
/// prend le caractère majoritaire du voisinage.
///
/// Une telle cellule casse déjà tous les runs autour d'elle. Sans majorité
/// claire (égalité, ou moins de `len / 2` voisins, division entière), elle
/// est conservée.
#[derive(Debug, Default)]
pub struct IsolatedReplacement;

/// Remplacement proposé pour `ch`, `None` pour le conserver.
#[must_use]
pub fn isolated_verdict(ch: char, neighbours: &Neighbourhood) -> Option<char> {
    if neighbours.len() < MIN_NEIGHBOURS || neighbours.count_of(ch) > 0 {
        return None;
    }
    let (majority, count) = neighbours.dominant()?;
    (count >= neighbours.len() / 2).then_some(majority)
}

impl CleanupStage for IsolatedReplacement {
    fn kind(&self) -> StageKind {
        StageKind::Isolated
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
                    let n = Neighbourhood::gather(&snapshot, x as u32, y as u32, 1);
                    if let Some(replacement) = isolated_verdict(*cell, &n) {
                        *cell = replacement;
                        changed += 1;
                    }
                }
                changed
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&str]) -> CharacterGrid {
        let cells: Vec<char> = rows.iter().flat_map(|r| r.chars()).collect();
        CharacterGrid::from_cells(rows[0].chars().count() as u32, rows.len() as u32, cells, 0, 0.0)
            .unwrap()
    }

    #[test]
    fn lone_cell_takes_majority() {
        let mut g = grid(&["...", ".#.", "..."]);
        assert_eq!(IsolatedReplacement.apply(&mut g), 1);
        assert_eq!(g.get(1, 1), '.');
    }

    #[test]
    fn cell_with_a_twin_is_kept() {
        let mut g = grid(&["...", ".##", "..."]);
        assert_eq!(IsolatedReplacement.apply(&mut g), 0);
        assert_eq!(g.get(1, 1), '#');
    }

    #[test]
    fn no_majority_keeps_cell() {
        let mut g = grid(&["abc", "d#e", "fgh"]);
        assert_eq!(IsolatedReplacement.apply(&mut g), 0);
    }

    #[test]
    fn tie_keeps_cell() {
        assert_eq!(
            isolated_verdict('#', &Neighbourhood::from_chars(&['a', 'a', 'b', 'b'])),
            None
        );
    }

    #[test]
    fn edge_cell_accepts_floor_half_majority() {
        // 5 voisins : 2 suffisent (5 / 2 = 2).
        assert_eq!(
            isolated_verdict('#', &Neighbourhood::from_chars(&['a', 'a', 'b', 'c', 'd'])),
            Some('a')
        );
        let mut g = grid(&[".#ab", "cd.e"]);
        assert_eq!(isolated_verdict('#', &Neighbourhood::gather(&g, 1, 0, 1)), Some('.'));
        assert!(IsolatedReplacement.apply(&mut g) >= 1);
        assert_eq!(g.get(1, 0), '.');
    }

    #[test]
    fn decisions_read_the_snapshot() {
        // Les deux '#' sont isolés l'un de l'autre ; chacun est jugé sur
        // la grille d'origine.
        let mut g = grid(&["#....", ".....", "....#"]);
        assert_eq!(IsolatedReplacement.apply(&mut g), 2);
        assert!(g.cells().iter().all(|&c| c == '.'));
    }
}
