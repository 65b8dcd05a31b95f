use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use ob_core::config::ConversionConfig;
use ob_core::error::CoreError;
use ob_core::frame::RasterFrame;

/// Taille de grille pour une source `src_width × src_height`.
///
/// Sans hauteur explicite : `round(h / w × width × aspect)`, au moins 1.
/// L'aspect compense les cellules de terminal plus hautes que larges ;
/// c'est une décision de taux d'échantillonnage, pas de luminance.
///
/// # Example
/// ```
/// use ob_ascii::sampling::grid_size;
/// use ob_core::config::ConversionConfig;
/// let conv = ConversionConfig::default();
/// assert_eq!(grid_size(1920, 1080, &conv), (120, 37));
/// ```
#[must_use]
pub fn grid_size(src_width: u32, src_height: u32, conv: &ConversionConfig) -> (u32, u32) {
    let width = conv.width.max(1);
    let height = conv.height.unwrap_or_else(|| {
        let ratio = f64::from(src_height) / f64::from(src_width.max(1));
        (ratio * f64::from(width) * f64::from(conv.aspect_compensation)).round() as u32
    });
    (width, height.max(1))
}

/// Rééchantillonne la luminance vers `width × height` (bilinéaire).
///
/// Retourne un clone quand les dimensions correspondent déjà.
///
/// # Errors
/// `InvalidDimensions` when a target dimension is zero or the resize fails.
///
/// # Example
/// ```
/// use ob_ascii::sampling::resample;
/// use ob_core::frame::RasterFrame;
/// let frame = RasterFrame::new(100, 50, vec![200; 5000], 0, 0.0).unwrap();
/// let small = resample(&frame, 10, 3).unwrap();
/// assert_eq!(small.luma, vec![200; 30]);
/// ```
pub fn resample(frame: &RasterFrame, width: u32, height: u32) -> Result<RasterFrame, CoreError> {
    if width == 0 || height == 0 {
        return Err(CoreError::InvalidDimensions { width, height });
    }
    if frame.width == width && frame.height == height {
        return Ok(frame.clone());
    }
    let invalid = |_| CoreError::InvalidDimensions { width, height };

    let src = Image::from_vec_u8(frame.width, frame.height, frame.luma.clone(), PixelType::U8)
        .map_err(invalid)?;
    let mut dst = Image::new(width, height, PixelType::U8);
    let options =
        ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    Resizer::new()
        .resize(&src, &mut dst, Some(&options))
        .map_err(|_| CoreError::InvalidDimensions { width, height })?;

    RasterFrame::new(width, height, dst.into_vec(), frame.index, frame.timestamp)
}
