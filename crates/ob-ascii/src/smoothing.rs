use ob_core::config::SmoothingConfig;
use ob_core::error::CoreError;
use ob_core::frame::RasterFrame;
use rayon::prelude::*;

/// Cascade de lissage progressif : bilatéral → gaussien → médian → CLAHE.
///
/// Les noyaux sont précalculés à la construction. [`Smoother::apply`] ne
/// modifie jamais la frame d'entrée et produit un buffer neuf de mêmes
/// dimensions.
///
/// # Example
/// ```
/// use ob_ascii::smoothing::Smoother;
/// use ob_core::config::SmoothingConfig;
/// use ob_core::frame::RasterFrame;
///
/// let smoother = Smoother::new(&SmoothingConfig::default()).unwrap();
/// let frame = RasterFrame::new(16, 8, vec![90; 128], 0, 0.0).unwrap();
/// let out = smoother.apply(&frame);
/// assert_eq!((out.width, out.height), (16, 8));
/// ```
pub struct Smoother {
    bilateral: Bilateral,
    gaussian: Vec<f32>,
    median_radius: usize,
    clahe_clip: f32,
    clahe_tiles: (u32, u32),
}

impl Smoother {
    /// Build the filter cascade.
    ///
    /// # Errors
    /// `InvalidKernel` for an even or zero kernel size, `Config` for
    /// non-positive sigmas or clip limit.
    pub fn new(config: &SmoothingConfig) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self {
            bilateral: Bilateral::new(
                config.bilateral_diameter,
                config.bilateral_sigma_color,
                config.bilateral_sigma_space,
            ),
            gaussian: gaussian_kernel(config.gaussian_kernel_size),
            median_radius: (config.median_kernel_size / 2) as usize,
            clahe_clip: config.clahe_clip_limit,
            clahe_tiles: config.clahe_tile_grid,
        })
    }

    /// Apply the four filters in order.
    #[must_use]
    pub fn apply(&self, frame: &RasterFrame) -> RasterFrame {
        let (w, h) = (frame.width as usize, frame.height as usize);
        let luma = self.bilateral.apply(&frame.luma, w, h);
        let luma = convolve_separable(&luma, w, h, &self.gaussian);
        let luma = median(&luma, w, h, self.median_radius);
        let luma = clahe(&luma, w, h, self.clahe_clip, self.clahe_tiles);
        frame.with_luma(luma)
    }
}

/// Pixel lookup with clamped borders.
#[inline(always)]
fn sample(src: &[u8], width: usize, height: usize, x: isize, y: isize) -> u8 {
    let x = x.clamp(0, width as isize - 1) as usize;
    let y = y.clamp(0, height as isize - 1) as usize;
    src[y * width + x]
}

/// Filtre bilatéral à fenêtre circulaire.
struct Bilateral {
    /// (dx, dy, poids spatial) pour chaque tap du disque.
    taps: Vec<(isize, isize, f32)>,
    /// Poids de similarité indexé par |Δluminance|.
    color_lut: [f32; 256],
}

impl Bilateral {
    fn new(diameter: u32, sigma_color: f32, sigma_space: f32) -> Self {
        let radius = (diameter / 2) as isize;
        let space_coeff = -0.5 / (sigma_space * sigma_space);
        let color_coeff = -0.5 / (sigma_color * sigma_color);

        let mut taps = Vec::new();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let r2 = dx * dx + dy * dy;
                if r2 > radius * radius {
                    continue;
                }
                taps.push((dx, dy, (r2 as f32 * space_coeff).exp()));
            }
        }

        let mut color_lut = [0.0f32; 256];
        for (d, w) in color_lut.iter_mut().enumerate() {
            let d = d as f32;
            *w = (d * d * color_coeff).exp();
        }
        Self { taps, color_lut }
    }

    fn apply(&self, src: &[u8], width: usize, height: usize) -> Vec<u8> {
        let mut out = vec![0u8; src.len()];
        out.par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, px) in row.iter_mut().enumerate() {
                    let center = src[y * width + x];
                    let mut sum = 0.0f32;
                    let mut weight_sum = 0.0f32;
                    for &(dx, dy, ws) in &self.taps {
                        let v = sample(src, width, height, x as isize + dx, y as isize + dy);
                        let w = ws * self.color_lut[usize::from(v.abs_diff(center))];
                        sum += w * f32::from(v);
                        weight_sum += w;
                    }
                    // Le tap central pèse 1 : weight_sum >= 1.
                    *px = (sum / weight_sum).round().clamp(0.0, 255.0) as u8;
                }
            });
        out
    }
}

/// Noyau gaussien 1D normalisé, sigma dérivé de la taille.
fn gaussian_kernel(size: u32) -> Vec<f32> {
    let radius = (size / 2) as i32;
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= sum;
    }
    kernel
}

/// Convolution séparable : passe horizontale en f32, puis verticale.
fn convolve_separable(src: &[u8], width: usize, height: usize, kernel: &[f32]) -> Vec<u8> {
    let radius = (kernel.len() / 2) as isize;

    let mut tmp = vec![0.0f32; src.len()];
    tmp.par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                *out = kernel
                    .iter()
                    .enumerate()
                    .map(|(k, w)| {
                        let sx = x as isize + k as isize - radius;
                        w * f32::from(sample(src, width, height, sx, y as isize))
                    })
                    .sum();
            }
        });

    let mut out = vec![0u8; src.len()];
    out.par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.iter_mut().enumerate() {
                let mut acc = 0.0f32;
                for (k, w) in kernel.iter().enumerate() {
                    let sy = (y as isize + k as isize - radius).clamp(0, height as isize - 1);
                    acc += w * tmp[sy as usize * width + x];
                }
                *px = acc.round().clamp(0.0, 255.0) as u8;
            }
        });
    out
}

/// Filtre médian carré de côté `2 * radius + 1`.
fn median(src: &[u8], width: usize, height: usize, radius: usize) -> Vec<u8> {
    if radius == 0 {
        return src.to_vec();
    }
    let r = radius as isize;
    let mut out = vec![0u8; src.len()];
    out.par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            let mut window = Vec::with_capacity((2 * radius + 1).pow(2));
            for (x, px) in row.iter_mut().enumerate() {
                window.clear();
                for dy in -r..=r {
                    for dx in -r..=r {
                        window.push(sample(src, width, height, x as isize + dx, y as isize + dy));
                    }
                }
                let mid = window.len() / 2;
                *px = *window.select_nth_unstable(mid).1;
            }
        });
    out
}

/// Égalisation d'histogramme adaptative à contraste limité.
///
/// Une LUT par tuile, puis interpolation bilinéaire entre les quatre
/// tuiles les plus proches pour éviter les blocs visibles.
fn clahe(src: &[u8], width: usize, height: usize, clip_limit: f32, grid: (u32, u32)) -> Vec<u8> {
    let tiles_x = (grid.0 as usize).clamp(1, width);
    let tiles_y = (grid.1 as usize).clamp(1, height);
    let bounds = |i: usize, n: usize, len: usize| (i * len / n, (i + 1) * len / n);

    let luts: Vec<[u8; 256]> = (0..tiles_x * tiles_y)
        .into_par_iter()
        .map(|t| {
            let (x0, x1) = bounds(t % tiles_x, tiles_x, width);
            let (y0, y1) = bounds(t / tiles_x, tiles_y, height);
            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for &v in &src[y * width + x0..y * width + x1] {
                    hist[usize::from(v)] += 1;
                }
            }
            tile_lut(&mut hist, ((x1 - x0) * (y1 - y0)) as u32, clip_limit)
        })
        .collect();

    let tile_w = width as f32 / tiles_x as f32;
    let tile_h = height as f32 / tiles_y as f32;

    let mut out = vec![0u8; src.len()];
    out.par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            let (ty0, ty1, ay) = interp_coord(y, tile_h, tiles_y);
            for (x, px) in row.iter_mut().enumerate() {
                let (tx0, tx1, ax) = interp_coord(x, tile_w, tiles_x);
                let v = usize::from(src[y * width + x]);
                let at = |tx: usize, ty: usize| f32::from(luts[ty * tiles_x + tx][v]);
                let top = at(tx0, ty0) * (1.0 - ax) + at(tx1, ty0) * ax;
                let bottom = at(tx0, ty1) * (1.0 - ax) + at(tx1, ty1) * ax;
                *px = (top * (1.0 - ay) + bottom * ay).round().clamp(0.0, 255.0) as u8;
            }
        });
    out
}

/// Tuiles voisines et poids d'interpolation pour une coordonnée pixel.
fn interp_coord(pos: usize, tile: f32, tiles: usize) -> (usize, usize, f32) {
    let f = (pos as f32 + 0.5) / tile - 0.5;
    if f <= 0.0 {
        return (0, 0, 0.0);
    }
    let i0 = f.floor() as usize;
    if i0 >= tiles - 1 {
        return (tiles - 1, tiles - 1, 0.0);
    }
    (i0, i0 + 1, f - i0 as f32)
}

/// Histogramme clippé + redistribution de l'excédent → LUT d'égalisation.
fn tile_lut(hist: &mut [u32; 256], area: u32, clip_limit: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    if area == 0 {
        for (i, v) in lut.iter_mut().enumerate() {
            *v = i as u8;
        }
        return lut;
    }

    let clip = ((clip_limit * area as f32 / 256.0) as u32).max(1);
    let mut excess = 0u32;
    for h in hist.iter_mut() {
        if *h > clip {
            excess += *h - clip;
            *h = clip;
        }
    }
    let bonus = excess / 256;
    let residual = (excess % 256) as usize;
    for h in hist.iter_mut() {
        *h += bonus;
    }
    if residual > 0 {
        let step = (256 / residual).max(1);
        for i in (0..256).step_by(step).take(residual) {
            hist[i] += 1;
        }
    }

    let scale = 255.0 / area as f32;
    let mut cdf = 0u32;
    for (v, &h) in lut.iter_mut().zip(hist.iter()) {
        cdf += h;
        *v = (cdf as f32 * scale).round().min(255.0) as u8;
    }
    lut
}
