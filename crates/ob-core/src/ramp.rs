use crate::error::CoreError;

/// 10 caractères : rampe par défaut, sombre→clair sur fond noir.
pub const RAMP_STANDARD: &str = " .:-=+*#%@";

/// 70 caractères, Paul Bourke extended.
pub const RAMP_EXTENDED: &str =
    " .'`^\",:;Il!i><~+_-?][}{1)(|/tfjrxnuvczXYUJCLQ0OZmwqpdbkhao*#MW&8%B@$";

/// Blocs Unicode, pseudo-pixels.
pub const RAMP_BLOCKS: &str = " ░▒▓█";

/// Minimal, haut contraste.
pub const RAMP_MINIMAL: &str = " .:#";

/// Nombre de caractères denses préservés par défaut par le débruitage.
pub const DEFAULT_FEATURE_COUNT: usize = 4;

/// Longueur maximale d'une rampe (un index doit tenir dans un `u8`).
pub const MAX_RAMP_LEN: usize = 256;

/// Ordered alphabet approximating a luminance gradient.
///
/// Index 0 is the character used for the lowest luminance. A rampe
/// `inverted` (thème clair) lists the same glyphs in the opposite order, so
/// the glyph density order is tracked separately from the luminance order.
///
/// # Example
/// ```
/// use ob_core::ramp::Ramp;
/// let ramp = Ramp::new(" .:#@").unwrap();
/// assert_eq!(ramp.len(), 5);
/// assert_eq!(ramp.index_of('#'), Some(3));
/// assert_eq!(ramp.reversed().index_of('#'), Some(1));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ramp {
    chars: Vec<char>,
    inverted: bool,
}

impl Ramp {
    /// Build a ramp from a string ordered darkest→lightest.
    ///
    /// # Errors
    /// `EmptyRamp` for an empty string, `DuplicateRampChar` when a glyph
    /// appears twice, `Config` when longer than [`MAX_RAMP_LEN`].
    pub fn new(chars: &str) -> Result<Self, CoreError> {
        let chars: Vec<char> = chars.chars().collect();
        if chars.is_empty() {
            return Err(CoreError::EmptyRamp);
        }
        if chars.len() > MAX_RAMP_LEN {
            return Err(CoreError::Config(format!(
                "rampe de {} caractères (max {MAX_RAMP_LEN})",
                chars.len()
            )));
        }
        for (i, &c) in chars.iter().enumerate() {
            if chars[..i].contains(&c) {
                return Err(CoreError::DuplicateRampChar(c));
            }
        }
        Ok(Self {
            chars,
            inverted: false,
        })
    }

    /// The same glyphs in reverse luminance order (thème clair).
    ///
    /// Pure function: presentation concern applied before mapping.
    #[must_use]
    pub fn reversed(&self) -> Self {
        let mut chars = self.chars.clone();
        chars.reverse();
        Self {
            chars,
            inverted: !self.inverted,
        }
    }

    /// Number of characters.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Always `false`: construction rejects empty ramps.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// `true` if this ramp was produced by [`Ramp::reversed`] an odd number of times.
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// Character at luminance slot `index`, clamped to the last slot.
    #[inline(always)]
    #[must_use]
    pub fn get(&self, index: usize) -> char {
        self.chars[index.min(self.chars.len() - 1)]
    }

    /// Luminance slot of `ch`, `None` if `ch` is not a ramp member.
    #[inline]
    #[must_use]
    pub fn index_of(&self, ch: char) -> Option<usize> {
        self.chars.iter().position(|&c| c == ch)
    }

    /// `true` if `ch` belongs to the ramp.
    #[inline]
    #[must_use]
    pub fn contains(&self, ch: char) -> bool {
        self.chars.contains(&ch)
    }

    /// Glyphs in luminance order.
    #[must_use]
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    /// The `n` glyphs with the most ink, densest first.
    ///
    /// # Example
    /// ```
    /// use ob_core::ramp::{Ramp, RAMP_STANDARD};
    /// let ramp = Ramp::new(RAMP_STANDARD).unwrap();
    /// assert_eq!(ramp.densest(2), vec!['@', '%']);
    /// assert_eq!(ramp.reversed().densest(2), vec!['@', '%']);
    /// ```
    #[must_use]
    pub fn densest(&self, n: usize) -> Vec<char> {
        let n = n.min(self.chars.len());
        if self.inverted {
            self.chars[..n].to_vec()
        } else {
            self.chars.iter().rev().take(n).copied().collect()
        }
    }

    /// Lookup table luminance [0..255] → raw slot index.
    ///
    /// `index = floor(lum / (256 / len))`, computed in integers as
    /// `lum * len / 256`, which never exceeds `len - 1`.
    ///
    /// # Example
    /// ```
    /// use ob_core::ramp::Ramp;
    /// let lut = Ramp::new(" .:#@").unwrap().index_lut();
    /// assert_eq!(lut[0], 0);
    /// assert_eq!(lut[255], 4);
    /// assert_eq!(lut[128], 2);
    /// ```
    #[must_use]
    pub fn index_lut(&self) -> [u8; 256] {
        let len = self.chars.len();
        let mut lut = [0u8; 256];
        for (lum, slot) in lut.iter_mut().enumerate() {
            *slot = (lum * len / 256) as u8;
        }
        lut
    }

    /// Width of one luminance bin, `256 / len`.
    #[inline]
    #[must_use]
    pub fn bin_width(&self) -> f32 {
        256.0 / self.chars.len() as f32
    }

    /// The ramp as a string, luminance order.
    #[must_use]
    pub fn as_string(&self) -> String {
        self.chars.iter().collect()
    }
}

impl Default for Ramp {
    fn default() -> Self {
        Self {
            chars: RAMP_STANDARD.chars().collect(),
            inverted: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lut_maps_extremes_and_is_monotonic() {
        let ramp = Ramp::new(RAMP_STANDARD).unwrap();
        let lut = ramp.index_lut();
        assert_eq!(lut[0], 0);
        assert_eq!(lut[255], 9);
        for pair in lut.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn lut_matches_floor_division() {
        let ramp = Ramp::new(RAMP_EXTENDED).unwrap();
        let lut = ramp.index_lut();
        let width = ramp.bin_width();
        for lum in 0..=255usize {
            let expected = ((lum as f32 / width).floor() as usize).min(ramp.len() - 1);
            assert_eq!(usize::from(lut[lum]), expected, "lum {lum}");
        }
    }

    #[test]
    fn rejects_empty_and_duplicates() {
        assert_eq!(Ramp::new(""), Err(CoreError::EmptyRamp));
        assert_eq!(Ramp::new(" .. "), Err(CoreError::DuplicateRampChar('.')));
    }

    #[test]
    fn single_char_ramp_maps_everything_to_it() {
        let ramp = Ramp::new("#").unwrap();
        assert!(ramp.index_lut().iter().all(|&i| i == 0));
        assert_eq!(ramp.get(7), '#');
    }

    #[test]
    fn reversal_is_an_involution() {
        let ramp = Ramp::new(RAMP_BLOCKS).unwrap();
        assert_eq!(ramp.reversed().reversed(), ramp);
        assert_eq!(ramp.reversed().get(0), '█');
    }
}
