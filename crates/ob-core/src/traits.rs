use crate::frame::RasterFrame;

/// Fournit des frames de luminance au pipeline d'encodage.
///
/// Implémenté par : `ImageSource`, `ImageSequenceSource`, `VideoSource`.
///
/// # Example
/// ```
/// use ob_core::traits::FrameSource;
/// use ob_core::frame::RasterFrame;
///
/// struct Blank(u32);
/// impl FrameSource for Blank {
///     fn next_frame(&mut self) -> anyhow::Result<Option<RasterFrame>> {
///         if self.0 == 0 { return Ok(None); }
///         self.0 -= 1;
///         Ok(Some(RasterFrame::new(2, 2, vec![0; 4], 0, 0.0)?))
///     }
///     fn native_size(&self) -> (u32, u32) { (2, 2) }
///     fn fps(&self) -> f64 { 30.0 }
/// }
///
/// let mut src = Blank(1);
/// assert!(src.next_frame().unwrap().is_some());
/// assert!(src.next_frame().unwrap().is_none());
/// ```
pub trait FrameSource: Send {
    /// Prochaine frame, `Ok(None)` quand la source est épuisée.
    ///
    /// # Errors
    /// Erreur de lecture ou de décodage de la source.
    fn next_frame(&mut self) -> anyhow::Result<Option<RasterFrame>>;

    /// Dimensions natives en pixels.
    fn native_size(&self) -> (u32, u32);

    /// Cadence nominale, en frames par seconde.
    fn fps(&self) -> f64;

    /// Nombre de frames attendues, si connu à l'avance.
    fn frame_count_hint(&self) -> Option<u64> {
        None
    }
}
