//! Hard thresholding of detail coefficients.

use super::ChannelCoefficients;

/// Zero every coefficient whose magnitude is strictly below `threshold`.
///
/// Coefficients at or above the threshold are left untouched, so applying
/// the same threshold twice changes nothing the second time. Returns the
/// number of coefficients that were non-zero and are now zero.
pub fn hard_threshold(coeffs: &mut [f64], threshold: f64) -> usize {
    let mut zeroed = 0;
    for c in coeffs.iter_mut() {
        if c.abs() < threshold && *c != 0.0 {
            *c = 0.0;
            zeroed += 1;
        }
    }
    zeroed
}

/// Apply [`hard_threshold`] to the three detail subbands of a channel.
/// The approximation subband is never modified.
pub fn threshold_details(coeffs: &mut ChannelCoefficients, threshold: f64) -> usize {
    coeffs
        .details_mut()
        .into_iter()
        .map(|band| hard_threshold(&mut band.data, threshold))
        .sum()
}
