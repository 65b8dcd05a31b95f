use std::collections::VecDeque;

use ob_core::frame::CharacterGrid;
use ob_core::ramp::Ramp;

use super::{CleanupStage, StageKind};

/// Étage 3 : supprime les changements transitoires d'une frame à l'autre.
///
/// Un changement est transitoire si le nouveau caractère est adjacent dans
/// la rampe au caractère émis à la frame précédente, n'était pas déjà
/// présent dans les `window - 1` entrées précédentes, et si moins de la
/// moitié des voisins ont changé en même temps. Le caractère précédent est
/// alors conservé. Seul étage avec état : les frames doivent arriver dans
/// l'ordre.
#[derive(Debug)]
pub struct TemporalSmoother {
    ramp: Ramp,
    window: usize,
    /// Dernières entrées brutes (avant lissage), la plus récente en fin.
    history: VecDeque<CharacterGrid>,
    previous_output: Option<CharacterGrid>,
}

impl TemporalSmoother {
    /// `window` is clamped to at least 1; a window of 1 accepts every change.
    #[must_use]
    pub fn new(ramp: Ramp, window: usize) -> Self {
        let window = window.max(1);
        Self {
            ramp,
            window,
            history: VecDeque::with_capacity(window),
            previous_output: None,
        }
    }

    /// Forget all history, e.g. before a new sequence.
    pub fn reset(&mut self) {
        self.history.clear();
        self.previous_output = None;
    }

    fn adjacent(&self, a: char, b: char) -> bool {
        match (self.ramp.index_of(a), self.ramp.index_of(b)) {
            (Some(i), Some(j)) => i.abs_diff(j) == 1,
            _ => false,
        }
    }

    fn persisted(&self, x: u32, y: u32, ch: char) -> bool {
        let needed = self.window - 1;
        needed == 0
            || (self.history.len() >= needed
                && self
                    .history
                    .iter()
                    .rev()
                    .take(needed)
                    .all(|h| h.get(x, y) == ch))
    }
}

/// Nombre de voisins (8-connexité) marqués dans `changed`, et total.
fn changed_neighbours(changed: &[bool], width: u32, height: u32, x: u32, y: u32) -> (usize, usize) {
    let mut count = 0;
    let mut total = 0;
    for dy in -1i64..=1 {
        for dx in -1i64..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let (nx, ny) = (i64::from(x) + dx, i64::from(y) + dy);
            if nx < 0 || ny < 0 || nx >= i64::from(width) || ny >= i64::from(height) {
                continue;
            }
            total += 1;
            if changed[ny as usize * width as usize + nx as usize] {
                count += 1;
            }
        }
    }
    (count, total)
}

impl CleanupStage for TemporalSmoother {
    fn kind(&self) -> StageKind {
        StageKind::Temporal
    }

    fn apply(&mut self, grid: &mut CharacterGrid) -> usize {
        if self
            .previous_output
            .as_ref()
            .is_some_and(|prev| !prev.same_shape(grid))
        {
            log::debug!("Lissage temporel : dimensions changées, historique réinitialisé");
            self.reset();
        }

        let input = grid.clone();
        let mut kept = 0;
        if let Some(prev) = &self.previous_output {
            let (w, h) = (grid.width(), grid.height());
            let changed: Vec<bool> = input
                .cells()
                .iter()
                .zip(prev.cells())
                .map(|(a, b)| a != b)
                .collect();
            for y in 0..h {
                for x in 0..w {
                    if !changed[y as usize * w as usize + x as usize] {
                        continue;
                    }
                    let (current, before) = (input.get(x, y), prev.get(x, y));
                    if !self.adjacent(current, before) || self.persisted(x, y, current) {
                        continue;
                    }
                    let (n_changed, n_total) = changed_neighbours(&changed, w, h, x, y);
                    if n_changed * 2 < n_total {
                        grid.set(x, y, before);
                        kept += 1;
                    }
                }
            }
        }

        self.history.push_back(input);
        while self.history.len() > self.window - 1 {
            self.history.pop_front();
        }
        self.previous_output = Some(grid.clone());
        kept
    }
}
