use ob_core::config::ConversionConfig;
use ob_core::error::CoreError;
use ob_core::frame::{CharacterGrid, RasterFrame};
use ob_core::ramp::Ramp;
use rayon::prelude::*;

use crate::sampling;

/// Quantifie la luminance en caractères de la rampe, avec hystérésis.
///
/// Index brut : `floor(lum / (256 / len))`, borné au dernier slot. Si la
/// grille précédente existe et que la luminance ne sort de l'intervalle du
/// caractère précédent que de moins de `hysteresis_threshold`, le caractère
/// précédent est conservé.
///
/// # Example
/// ```
/// use ob_ascii::mapper::CharacterMapper;
/// use ob_core::config::ConversionConfig;
/// use ob_core::frame::RasterFrame;
///
/// let conv = ConversionConfig { width: 4, height: Some(1), ..ConversionConfig::default() };
/// let mapper = CharacterMapper::new(&conv).unwrap();
/// let frame = RasterFrame::new(4, 1, vec![0, 80, 160, 255], 0, 0.0).unwrap();
/// let grid = mapper.map(&frame, None).unwrap();
/// assert_eq!(grid.to_text(), " -*@");
/// ```
pub struct CharacterMapper {
    ramp: Ramp,
    lut: [u8; 256],
    bin_width: f32,
    threshold: f32,
    conversion: ConversionConfig,
}

impl CharacterMapper {
    /// Build a mapper for the effective ramp (theme applied).
    ///
    /// # Errors
    /// Ramp or dimension errors from the conversion section.
    pub fn new(conversion: &ConversionConfig) -> Result<Self, CoreError> {
        conversion.validate()?;
        let ramp = conversion.ramp()?;
        Ok(Self {
            lut: ramp.index_lut(),
            bin_width: ramp.bin_width(),
            threshold: conversion.hysteresis_threshold as f32,
            ramp,
            conversion: conversion.clone(),
        })
    }

    /// The ramp cells are drawn from.
    #[must_use]
    pub fn ramp(&self) -> &Ramp {
        &self.ramp
    }

    /// Grid size for a source of the given pixel size.
    #[must_use]
    pub fn grid_size(&self, src_width: u32, src_height: u32) -> (u32, u32) {
        sampling::grid_size(src_width, src_height, &self.conversion)
    }

    /// Resample `frame` to grid resolution, then map it.
    ///
    /// `previous` is the mapped grid of frame `i - 1`; it is ignored when its
    /// shape differs.
    ///
    /// # Errors
    /// `InvalidDimensions` for an empty frame.
    pub fn map(
        &self,
        frame: &RasterFrame,
        previous: Option<&CharacterGrid>,
    ) -> Result<CharacterGrid, CoreError> {
        if frame.width == 0 || frame.height == 0 || frame.luma.is_empty() {
            return Err(CoreError::InvalidDimensions {
                width: frame.width,
                height: frame.height,
            });
        }
        let (w, h) = self.grid_size(frame.width, frame.height);
        let sampled = sampling::resample(frame, w, h)?;
        self.map_sampled(&sampled, previous)
    }

    /// Map a frame that is already at grid resolution (one pixel per cell).
    ///
    /// # Errors
    /// `InvalidDimensions` / `InvalidFrameData` for an inconsistent frame.
    pub fn map_sampled(
        &self,
        frame: &RasterFrame,
        previous: Option<&CharacterGrid>,
    ) -> Result<CharacterGrid, CoreError> {
        let width = frame.width as usize;
        if width == 0 {
            return Err(CoreError::InvalidDimensions {
                width: frame.width,
                height: frame.height,
            });
        }
        let previous = previous.filter(|p| p.width() == frame.width && p.height() == frame.height);

        let mut cells = vec![self.ramp.get(0); frame.luma.len()];
        cells
            .par_chunks_mut(width)
            .zip(frame.luma.par_chunks(width))
            .enumerate()
            .for_each(|(y, (row, lum_row))| {
                let prev_row = previous.map(|p| p.row(y as u32));
                for (x, (cell, &lum)) in row.iter_mut().zip(lum_row).enumerate() {
                    let raw = usize::from(self.lut[usize::from(lum)]);
                    let idx = match prev_row.and_then(|r| self.ramp.index_of(r[x])) {
                        Some(prev) if prev != raw && self.holds(prev, lum) => prev,
                        _ => raw,
                    };
                    *cell = self.ramp.get(idx);
                }
            });

        CharacterGrid::from_cells(frame.width, frame.height, cells, frame.index, frame.timestamp)
    }

    /// `true` if `lum` is within the hysteresis band of slot `prev`.
    #[inline(always)]
    fn holds(&self, prev: usize, lum: u8) -> bool {
        let lo = prev as f32 * self.bin_width;
        let hi = lo + self.bin_width;
        let l = f32::from(lum);
        let distance = if l < lo {
            lo - l
        } else if l >= hi {
            l - hi
        } else {
            0.0
        };
        distance < self.threshold
    }
}
