use crate::error::CoreError;

/// Frame de luminance brute produite par une source.
///
/// Un échantillon `u8` par pixel, row-major. Immuable une fois créée :
/// chaque étage produit un nouveau buffer.
///
/// # Example
/// ```
/// use ob_core::frame::RasterFrame;
/// let frame = RasterFrame::new(4, 2, vec![0u8; 8], 0, 0.0).unwrap();
/// assert_eq!(frame.luma.len(), 8);
/// assert_eq!(frame.luminance(3, 1), 0);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct RasterFrame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Luminance samples, row-major, one byte per pixel.
    pub luma: Vec<u8>,
    /// Position dans la séquence source.
    pub index: u32,
    /// Timestamp en secondes.
    pub timestamp: f64,
}

impl RasterFrame {
    /// Wrap a luminance buffer.
    ///
    /// # Errors
    /// `InvalidDimensions` for a zero width or height, `InvalidFrameData`
    /// when `luma.len() != width * height`.
    pub fn new(
        width: u32,
        height: u32,
        luma: Vec<u8>,
        index: u32,
        timestamp: f64,
    ) -> Result<Self, CoreError> {
        if width == 0 || height == 0 {
            return Err(CoreError::InvalidDimensions { width, height });
        }
        let expected = width as usize * height as usize;
        if luma.len() != expected {
            return Err(CoreError::InvalidFrameData {
                expected,
                actual: luma.len(),
            });
        }
        Ok(Self {
            width,
            height,
            luma,
            index,
            timestamp,
        })
    }

    /// Build a frame from RGBA pixels using BT.709 perceptual luminance.
    ///
    /// # Errors
    /// Same conditions as [`RasterFrame::new`], with `rgba.len()` checked
    /// against `width * height * 4`.
    ///
    /// # Example
    /// ```
    /// use ob_core::frame::RasterFrame;
    /// let frame = RasterFrame::from_rgba(1, 1, &[255, 255, 255, 255], 0, 0.0).unwrap();
    /// assert_eq!(frame.luminance(0, 0), 255);
    /// ```
    pub fn from_rgba(
        width: u32,
        height: u32,
        rgba: &[u8],
        index: u32,
        timestamp: f64,
    ) -> Result<Self, CoreError> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(CoreError::InvalidFrameData {
                expected,
                actual: rgba.len(),
            });
        }
        let luma = rgba
            .chunks_exact(4)
            .map(|px| {
                ((u32::from(px[0]) * 2126 + u32::from(px[1]) * 7152 + u32::from(px[2]) * 722)
                    / 10000) as u8
            })
            .collect();
        Self::new(width, height, luma, index, timestamp)
    }

    /// Luminance at (x, y).
    #[inline(always)]
    #[must_use]
    pub fn luminance(&self, x: u32, y: u32) -> u8 {
        debug_assert!(x < self.width && y < self.height, "pixel out of bounds");
        self.luma[y as usize * self.width as usize + x as usize]
    }

    /// Same index/timestamp, different pixels. Used by filters.
    #[must_use]
    pub fn with_luma(&self, luma: Vec<u8>) -> Self {
        debug_assert_eq!(luma.len(), self.luma.len());
        Self {
            width: self.width,
            height: self.height,
            luma,
            index: self.index,
            timestamp: self.timestamp,
        }
    }
}

/// Grille de caractères d'une frame.
///
/// Les dimensions sont fixées à la création. Les étages de nettoyage
/// modifient les cellules en place, jamais la taille.
///
/// # Example
/// ```
/// use ob_core::frame::CharacterGrid;
/// let mut grid = CharacterGrid::filled(3, 2, ' ', 0, 0.0).unwrap();
/// grid.set(1, 1, '@');
/// assert_eq!(grid.get(1, 1), '@');
/// assert_eq!(grid.to_text(), "   \n @ ");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct CharacterGrid {
    cells: Vec<char>,
    width: u32,
    height: u32,
    /// Frame index this grid derives from.
    pub index: u32,
    /// Timestamp of the source frame, seconds.
    pub timestamp: f64,
}

impl CharacterGrid {
    /// Wrap existing cells.
    ///
    /// # Errors
    /// `InvalidDimensions` for a zero dimension, `InvalidFrameData` when
    /// the cell count differs from `width * height`.
    pub fn from_cells(
        width: u32,
        height: u32,
        cells: Vec<char>,
        index: u32,
        timestamp: f64,
    ) -> Result<Self, CoreError> {
        if width == 0 || height == 0 {
            return Err(CoreError::InvalidDimensions { width, height });
        }
        let expected = width as usize * height as usize;
        if cells.len() != expected {
            return Err(CoreError::InvalidFrameData {
                expected,
                actual: cells.len(),
            });
        }
        Ok(Self {
            cells,
            width,
            height,
            index,
            timestamp,
        })
    }

    /// Grid with every cell set to `ch`.
    ///
    /// # Errors
    /// `InvalidDimensions` for a zero dimension.
    pub fn filled(
        width: u32,
        height: u32,
        ch: char,
        index: u32,
        timestamp: f64,
    ) -> Result<Self, CoreError> {
        let len = width as usize * height as usize;
        Self::from_cells(width, height, vec![ch; len], index, timestamp)
    }

    /// Width in characters.
    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in characters.
    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Cell at (x, y).
    #[inline(always)]
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> char {
        self.cells[y as usize * self.width as usize + x as usize]
    }

    /// Overwrite cell at (x, y).
    #[inline(always)]
    pub fn set(&mut self, x: u32, y: u32, ch: char) {
        self.cells[y as usize * self.width as usize + x as usize] = ch;
    }

    /// All cells, row-major.
    #[must_use]
    pub fn cells(&self) -> &[char] {
        &self.cells
    }

    /// Mutable cells, row-major. Length is fixed.
    pub fn cells_mut(&mut self) -> &mut [char] {
        &mut self.cells
    }

    /// Row `y` as a slice.
    #[must_use]
    pub fn row(&self, y: u32) -> &[char] {
        let w = self.width as usize;
        let start = y as usize * w;
        &self.cells[start..start + w]
    }

    /// Iterate over rows.
    pub fn rows(&self) -> impl Iterator<Item = &[char]> {
        self.cells.chunks_exact(self.width as usize)
    }

    /// `true` if both grids have the same width and height.
    #[must_use]
    pub fn same_shape(&self, other: &CharacterGrid) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Size of the grid as text, one UTF-8 encoded char per cell, no newlines.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.cells.iter().map(|c| c.len_utf8()).sum()
    }

    /// Render as text, rows separated by `\n`, no trailing newline.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity(self.byte_size() + self.height as usize);
        for (y, row) in self.rows().enumerate() {
            if y > 0 {
                out.push('\n');
            }
            out.extend(row.iter());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raster_rejects_zero_dimensions() {
        assert_eq!(
            RasterFrame::new(0, 4, vec![], 0, 0.0),
            Err(CoreError::InvalidDimensions {
                width: 0,
                height: 4
            })
        );
    }

    #[test]
    fn raster_rejects_short_buffer() {
        let err = RasterFrame::new(2, 2, vec![0; 3], 0, 0.0).unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidFrameData {
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn rgba_conversion_weights_green_most() {
        let frame = RasterFrame::from_rgba(2, 1, &[255, 0, 0, 255, 0, 255, 0, 255], 0, 0.0)
            .unwrap();
        assert!(frame.luminance(1, 0) > frame.luminance(0, 0));
    }

    #[test]
    fn grid_rows_and_byte_size() {
        let grid = CharacterGrid::from_cells(2, 2, vec!['a', 'b', '░', 'd'], 3, 0.1).unwrap();
        assert_eq!(grid.row(1), &['░', 'd']);
        assert_eq!(grid.rows().count(), 2);
        assert_eq!(grid.byte_size(), 6);
        assert_eq!(grid.index, 3);
    }
}
