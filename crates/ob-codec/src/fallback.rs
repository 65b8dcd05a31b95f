use ob_core::error::CoreError;
use ob_core::frame::CharacterGrid;
use ob_core::ramp::Ramp;

/// Frame de repli déterministe pour une frame illisible.
///
/// Cellule (x, y) de la frame `index` : `ramp[(x + y + index) % len]`, une
/// diagonale qui défile d'une frame à l'autre. Lisible, visiblement fausse,
/// et identique à chaque décodage.
///
/// # Errors
/// `InvalidDimensions` for a zero dimension.
///
/// # Example
/// ```
/// use ob_codec::fallback::fallback_grid;
/// use ob_core::ramp::Ramp;
/// let ramp = Ramp::new(" .:#").unwrap();
/// let grid = fallback_grid(1, 0.0, 3, 2, &ramp).unwrap();
/// assert_eq!(grid.to_text(), ".:#\n:# ");
/// ```
pub fn fallback_grid(
    index: u32,
    timestamp: f64,
    width: u32,
    height: u32,
    ramp: &Ramp,
) -> Result<CharacterGrid, CoreError> {
    let len = ramp.len() as u64;
    let cells = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| {
            let slot = (u64::from(x) + u64::from(y) + u64::from(index)) % len;
            ramp.get(slot as usize)
        })
        .collect();
    CharacterGrid::from_cells(width, height, cells, index, timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_is_deterministic() {
        let ramp = Ramp::default();
        let a = fallback_grid(7, 0.2, 10, 8, &ramp).unwrap();
        let b = fallback_grid(7, 0.2, 10, 8, &ramp).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, fallback_grid(8, 0.2, 10, 8, &ramp).unwrap());
    }

    #[test]
    fn fallback_only_uses_ramp_members() {
        let ramp = Ramp::new("ab").unwrap();
        let grid = fallback_grid(u32::MAX, 0.0, 5, 5, &ramp).unwrap();
        assert!(grid.cells().iter().all(|&c| ramp.contains(c)));
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(fallback_grid(0, 0.0, 0, 4, &Ramp::default()).is_err());
    }
}
