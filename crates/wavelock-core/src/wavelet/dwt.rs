//! Single-level 2D discrete wavelet transform with periodization.
//!
//! Boundary policy: a channel plane with an odd width or height is first
//! extended by repeating its last column/row, which makes both dimensions
//! even. The orthonormal transform then wraps periodically, producing
//! subbands of exactly half the padded size. Reconstruction inverts the
//! transform and crops the padding, so output dimensions always equal input
//! dimensions.

use super::WaveletBasis;

/// A rectangular block of transform coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct Subband {
    pub width: usize,
    pub height: usize,
    /// Row-major coefficients.
    pub data: Vec<f64>,
}

impl Subband {
    fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }
}

/// One level of decomposition of one channel.
///
/// Subband naming follows the direction of the edges each one responds to:
/// `horizontal` is low-pass along x and high-pass along y.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelCoefficients {
    pub approximation: Subband,
    pub horizontal: Subband,
    pub vertical: Subband,
    pub diagonal: Subband,
    /// Dimensions of the plane before padding.
    pub source_width: usize,
    pub source_height: usize,
}

impl ChannelCoefficients {
    /// Mutable access to the three detail subbands.
    pub fn details_mut(&mut self) -> [&mut Subband; 3] {
        [&mut self.horizontal, &mut self.vertical, &mut self.diagonal]
    }

    /// Shared access to the three detail subbands.
    pub fn details(&self) -> [&Subband; 3] {
        [&self.horizontal, &self.vertical, &self.diagonal]
    }
}

/// Forward transform of a row-major `width x height` plane.
///
/// # Panics
///
/// Debug builds assert that `plane.len() == width * height`.
pub fn decompose(
    plane: &[f64],
    width: usize,
    height: usize,
    basis: WaveletBasis,
) -> ChannelCoefficients {
    debug_assert_eq!(plane.len(), width * height);

    let (padded, pw, ph) = pad_to_even(plane, width, height);
    let lo = basis.scaling_filter();
    let hi = basis.wavelet_filter();
    let (hw, hh) = (pw / 2, ph / 2);

    // Rows: each row splits into a low half and a high half.
    let mut row_lo = vec![0.0; hw * ph];
    let mut row_hi = vec![0.0; hw * ph];
    for y in 0..ph {
        analyze(
            &padded[y * pw..(y + 1) * pw],
            lo,
            &hi,
            &mut row_lo[y * hw..(y + 1) * hw],
            &mut row_hi[y * hw..(y + 1) * hw],
        );
    }

    // Columns of each half.
    let mut approximation = Subband::zeros(hw, hh);
    let mut horizontal = Subband::zeros(hw, hh);
    let mut vertical = Subband::zeros(hw, hh);
    let mut diagonal = Subband::zeros(hw, hh);

    let mut column = vec![0.0; ph];
    let mut col_lo = vec![0.0; hh];
    let mut col_hi = vec![0.0; hh];
    for (source, low_out, high_out) in [
        (&row_lo, &mut approximation, &mut horizontal),
        (&row_hi, &mut vertical, &mut diagonal),
    ] {
        for x in 0..hw {
            for y in 0..ph {
                column[y] = source[y * hw + x];
            }
            analyze(&column, lo, &hi, &mut col_lo, &mut col_hi);
            for y in 0..hh {
                low_out.data[y * hw + x] = col_lo[y];
                high_out.data[y * hw + x] = col_hi[y];
            }
        }
    }

    ChannelCoefficients {
        approximation,
        horizontal,
        vertical,
        diagonal,
        source_width: width,
        source_height: height,
    }
}

/// Inverse transform, cropped back to the source dimensions.
pub fn reconstruct(coeffs: &ChannelCoefficients, basis: WaveletBasis) -> Vec<f64> {
    let lo = basis.scaling_filter();
    let hi = basis.wavelet_filter();
    let (hw, hh) = (coeffs.approximation.width, coeffs.approximation.height);
    let (pw, ph) = (hw * 2, hh * 2);

    // Columns first, undoing the second analysis pass.
    let mut row_lo = vec![0.0; hw * ph];
    let mut row_hi = vec![0.0; hw * ph];

    let mut col_lo = vec![0.0; hh];
    let mut col_hi = vec![0.0; hh];
    let mut column = vec![0.0; ph];
    for (low_in, high_in, target) in [
        (&coeffs.approximation, &coeffs.horizontal, &mut row_lo),
        (&coeffs.vertical, &coeffs.diagonal, &mut row_hi),
    ] {
        for x in 0..hw {
            for y in 0..hh {
                col_lo[y] = low_in.data[y * hw + x];
                col_hi[y] = high_in.data[y * hw + x];
            }
            synthesize(&col_lo, &col_hi, lo, &hi, &mut column);
            for y in 0..ph {
                target[y * hw + x] = column[y];
            }
        }
    }

    let mut padded = vec![0.0; pw * ph];
    for y in 0..ph {
        synthesize(
            &row_lo[y * hw..(y + 1) * hw],
            &row_hi[y * hw..(y + 1) * hw],
            lo,
            &hi,
            &mut padded[y * pw..(y + 1) * pw],
        );
    }

    crop(&padded, pw, coeffs.source_width, coeffs.source_height)
}

/// Periodized analysis of an even-length signal.
fn analyze(input: &[f64], lo: &[f64], hi: &[f64], approx: &mut [f64], detail: &mut [f64]) {
    let n = input.len();
    for k in 0..n / 2 {
        let mut a = 0.0;
        let mut d = 0.0;
        for (t, (&l, &h)) in lo.iter().zip(hi).enumerate() {
            let x = input[(2 * k + t) % n];
            a += l * x;
            d += h * x;
        }
        approx[k] = a;
        detail[k] = d;
    }
}

/// Periodized synthesis; the transpose of [`analyze`].
fn synthesize(approx: &[f64], detail: &[f64], lo: &[f64], hi: &[f64], out: &mut [f64]) {
    let n = out.len();
    out.fill(0.0);
    for k in 0..approx.len() {
        for (t, (&l, &h)) in lo.iter().zip(hi).enumerate() {
            out[(2 * k + t) % n] += l * approx[k] + h * detail[k];
        }
    }
}

/// Extend odd dimensions by repeating the last column/row.
fn pad_to_even(plane: &[f64], width: usize, height: usize) -> (Vec<f64>, usize, usize) {
    let pw = width + width % 2;
    let ph = height + height % 2;
    if pw == width && ph == height {
        return (plane.to_vec(), pw, ph);
    }

    let mut padded = Vec::with_capacity(pw * ph);
    for y in 0..ph {
        let src = &plane[y.min(height - 1) * width..][..width];
        padded.extend_from_slice(src);
        if pw > width {
            padded.push(src[width - 1]);
        }
    }
    (padded, pw, ph)
}

fn crop(padded: &[f64], padded_width: usize, width: usize, height: usize) -> Vec<f64> {
    (0..height)
        .flat_map(|y| padded[y * padded_width..][..width].iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(width: usize, height: usize) -> Vec<f64> {
        (0..width * height)
            .map(|i| ((i % width) * 7 + (i / width) * 13) as f64 % 256.0)
            .collect()
    }

    fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max)
    }

    #[test]
    fn test_perfect_reconstruction_even() {
        let plane = ramp(16, 12);
        for basis in [WaveletBasis::Db2, WaveletBasis::Db3, WaveletBasis::Db4] {
            let coeffs = decompose(&plane, 16, 12, basis);
            let back = reconstruct(&coeffs, basis);
            assert!(max_abs_diff(&plane, &back) < 1e-9, "{basis}");
        }
    }

    #[test]
    fn test_perfect_reconstruction_odd_dimensions() {
        let plane = ramp(9, 7);
        let coeffs = decompose(&plane, 9, 7, WaveletBasis::Db2);

        assert_eq!(coeffs.approximation.width, 5);
        assert_eq!(coeffs.approximation.height, 4);

        let back = reconstruct(&coeffs, WaveletBasis::Db2);
        assert_eq!(back.len(), 9 * 7);
        assert!(max_abs_diff(&plane, &back) < 1e-9);
    }

    #[test]
    fn test_single_pixel_plane() {
        let coeffs = decompose(&[42.0], 1, 1, WaveletBasis::Db4);
        let back = reconstruct(&coeffs, WaveletBasis::Db4);
        assert!((back[0] - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_plane_has_no_detail() {
        let plane = vec![100.0; 8 * 8];
        let coeffs = decompose(&plane, 8, 8, WaveletBasis::Db2);
        for band in coeffs.details() {
            assert!(band.data.iter().all(|c| c.abs() < 1e-9));
        }
        // Orthonormal 2D low-pass gain is 2.
        assert!(coeffs.approximation.data.iter().all(|c| (c - 200.0).abs() < 1e-9));
    }

    #[test]
    fn test_energy_preserved() {
        let plane = ramp(10, 10);
        let coeffs = decompose(&plane, 10, 10, WaveletBasis::Db3);

        let input: f64 = plane.iter().map(|v| v * v).sum();
        let output: f64 = [
            &coeffs.approximation,
            &coeffs.horizontal,
            &coeffs.vertical,
            &coeffs.diagonal,
        ]
        .iter()
        .flat_map(|band| band.data.iter())
        .map(|c| c * c)
        .sum();
        assert!((input - output).abs() / input < 1e-9);
    }

    #[test]
    fn test_pad_to_even_repeats_edges() {
        let (padded, pw, ph) = pad_to_even(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 2);
        assert_eq!((pw, ph), (4, 2));
        assert_eq!(padded, vec![1.0, 2.0, 3.0, 3.0, 4.0, 5.0, 6.0, 6.0]);

        let (padded, pw, ph) = pad_to_even(&[1.0, 2.0], 2, 1);
        assert_eq!((pw, ph), (2, 2));
        assert_eq!(padded, vec![1.0, 2.0, 1.0, 2.0]);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: decompose then reconstruct is the identity for any size.
        #[test]
        fn prop_reconstruction_is_identity(
            width in 1usize..=24,
            height in 1usize..=24,
            seed in any::<u64>(),
        ) {
            let plane: Vec<f64> = (0..width * height)
                .map(|i| ((seed.wrapping_add(i as u64).wrapping_mul(6_364_136_223_846_793_005) >> 56) as f64))
                .collect();

            let coeffs = decompose(&plane, width, height, WaveletBasis::Db2);
            let back = reconstruct(&coeffs, WaveletBasis::Db2);

            prop_assert_eq!(back.len(), plane.len());
            for (a, b) in plane.iter().zip(&back) {
                prop_assert!((a - b).abs() < 1e-8);
            }
        }
    }
}
