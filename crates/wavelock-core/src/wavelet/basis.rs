//! Orthonormal Daubechies wavelet bases.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// db2 scaling filter (2 vanishing moments).
const DB2: [f64; 4] = [
    0.482_962_913_144_534_16,
    0.836_516_303_737_807_9,
    0.224_143_868_042_013_4,
    -0.129_409_522_551_260_37,
];

/// db3 scaling filter (3 vanishing moments).
const DB3: [f64; 6] = [
    0.332_670_552_950_956_9,
    0.806_891_509_313_338_8,
    0.459_877_502_119_331_3,
    -0.135_011_020_010_390_84,
    -0.085_441_273_882_241_49,
    0.035_226_291_882_100_656,
];

/// db4 scaling filter (4 vanishing moments).
const DB4: [f64; 8] = [
    0.230_377_813_308_855_23,
    0.714_846_570_552_541_5,
    0.630_880_767_929_590_4,
    -0.027_983_769_416_983_85,
    -0.187_034_811_718_881_14,
    0.030_841_381_835_986_965,
    0.032_883_011_666_982_945,
    -0.010_597_401_784_997_278,
];

/// A Daubechies wavelet basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveletBasis {
    /// Daubechies 2 (4 taps).
    #[default]
    Db2,
    /// Daubechies 3 (6 taps).
    Db3,
    /// Daubechies 4 (8 taps).
    Db4,
}

impl WaveletBasis {
    /// Low-pass (scaling) filter taps. Sum is sqrt(2), energy is 1.
    pub fn scaling_filter(self) -> &'static [f64] {
        match self {
            WaveletBasis::Db2 => &DB2,
            WaveletBasis::Db3 => &DB3,
            WaveletBasis::Db4 => &DB4,
        }
    }

    /// High-pass (wavelet) filter: the quadrature mirror of the scaling
    /// filter, `g[n] = (-1)^n h[L-1-n]`.
    pub fn wavelet_filter(self) -> Vec<f64> {
        let h = self.scaling_filter();
        let len = h.len();
        (0..len)
            .map(|n| {
                let tap = h[len - 1 - n];
                if n % 2 == 0 {
                    tap
                } else {
                    -tap
                }
            })
            .collect()
    }

    /// Number of vanishing moments of the wavelet.
    pub fn vanishing_moments(self) -> usize {
        self.scaling_filter().len() / 2
    }

    /// Short name, e.g. `"db2"`.
    pub fn name(self) -> &'static str {
        match self {
            WaveletBasis::Db2 => "db2",
            WaveletBasis::Db3 => "db3",
            WaveletBasis::Db4 => "db4",
        }
    }
}

impl fmt::Display for WaveletBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for an unrecognised basis name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown wavelet basis: {0:?} (expected db2, db3 or db4)")]
pub struct UnknownBasis(pub String);

impl FromStr for WaveletBasis {
    type Err = UnknownBasis;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "db2" => Ok(WaveletBasis::Db2),
            "db3" => Ok(WaveletBasis::Db3),
            "db4" => Ok(WaveletBasis::Db4),
            _ => Err(UnknownBasis(s.to_string())),
        }
    }
}
