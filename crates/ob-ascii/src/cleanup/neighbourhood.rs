use ob_core::frame::CharacterGrid;

/// Capacité maximale : rayon 2 → 5×5 − 1.
pub const MAX_NEIGHBOURS: usize = 24;

/// Copie figée du voisinage d'une cellule (centre exclu).
///
/// Les décisions de débruitage lisent toujours une copie, jamais la grille
/// en cours de modification.
///
/// # Example
/// ```
/// use ob_ascii::cleanup::neighbourhood::Neighbourhood;
/// let n = Neighbourhood::from_chars(&['a', 'a', 'b']);
/// assert_eq!(n.count_of('a'), 2);
/// assert_eq!(n.dominant(), Some(('a', 2)));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Neighbourhood {
    chars: [char; MAX_NEIGHBOURS],
    len: usize,
}

impl Neighbourhood {
    /// Cells within Chebyshev distance `radius` of (x, y), inside the grid.
    ///
    /// `radius` is clamped to 2.
    #[must_use]
    pub fn gather(grid: &CharacterGrid, x: u32, y: u32, radius: u32) -> Self {
        let r = i64::from(radius.min(2));
        let (w, h) = (i64::from(grid.width()), i64::from(grid.height()));
        let mut out = Self {
            chars: [' '; MAX_NEIGHBOURS],
            len: 0,
        };
        for dy in -r..=r {
            for dx in -r..=r {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let (nx, ny) = (i64::from(x) + dx, i64::from(y) + dy);
                if (0..w).contains(&nx) && (0..h).contains(&ny) {
                    out.chars[out.len] = grid.get(nx as u32, ny as u32);
                    out.len += 1;
                }
            }
        }
        out
    }

    /// Build from explicit characters, truncated to [`MAX_NEIGHBOURS`].
    #[must_use]
    pub fn from_chars(chars: &[char]) -> Self {
        let len = chars.len().min(MAX_NEIGHBOURS);
        let mut out = Self {
            chars: [' '; MAX_NEIGHBOURS],
            len,
        };
        out.chars[..len].copy_from_slice(&chars[..len]);
        out
    }

    /// Nombre de voisins.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` for a 1×1 grid.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Neighbour characters.
    #[must_use]
    pub fn chars(&self) -> &[char] {
        &self.chars[..self.len]
    }

    /// Occurrences of `ch` among the neighbours.
    #[must_use]
    pub fn count_of(&self, ch: char) -> usize {
        self.chars().iter().filter(|&&c| c == ch).count()
    }

    /// Most frequent character and its count.
    ///
    /// `None` when empty or when two characters tie for first place: an
    /// ambiguous neighbourhood has no dominant character.
    #[must_use]
    pub fn dominant(&self) -> Option<(char, usize)> {
        let mut best: Option<(char, usize)> = None;
        let mut tied = false;
        for (i, &c) in self.chars().iter().enumerate() {
            if self.chars[..i].contains(&c) {
                continue;
            }
            let count = self.count_of(c);
            match best {
                Some((_, n)) if count == n => tied = true,
                Some((_, n)) if count < n => {}
                _ => {
                    best = Some((c, count));
                    tied = false;
                }
            }
        }
        if tied { None } else { best }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corner_has_three_neighbours() {
        let grid = CharacterGrid::filled(4, 4, '.', 0, 0.0).unwrap();
        assert_eq!(Neighbourhood::gather(&grid, 0, 0, 1).len(), 3);
        assert_eq!(Neighbourhood::gather(&grid, 1, 1, 1).len(), 8);
        assert_eq!(Neighbourhood::gather(&grid, 2, 2, 2).len(), 15);
    }

    #[test]
    fn single_cell_grid_is_empty() {
        let grid = CharacterGrid::filled(1, 1, '#', 0, 0.0).unwrap();
        let n = Neighbourhood::gather(&grid, 0, 0, 1);
        assert!(n.is_empty());
        assert_eq!(n.dominant(), None);
    }

    #[test]
    fn tie_has_no_dominant() {
        let n = Neighbourhood::from_chars(&['a', 'b', 'a', 'b']);
        assert_eq!(n.dominant(), None);
        let n = Neighbourhood::from_chars(&['a', 'b', 'a', 'b', 'b']);
        assert_eq!(n.dominant(), Some(('b', 3)));
    }

    #[test]
    fn gather_excludes_center() {
        let mut grid = CharacterGrid::filled(3, 3, '.', 0, 0.0).unwrap();
        grid.set(1, 1, '@');
        let n = Neighbourhood::gather(&grid, 1, 1, 1);
        assert_eq!(n.count_of('@'), 0);
        assert_eq!(n.count_of('.'), 8);
    }
}
