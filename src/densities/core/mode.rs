//! Estimation mode — which objective `estimate_parameters` optimizes.
//!
//! The mode is an explicit argument to every estimation call. Accumulation
//! is track-specific by method name (`accumulate_ml` feeds the ML track,
//! `accumulate_mmi_denominator` feeds the denominator track), so a density
//! carries no mode flag that could drift out of sync between calls.
use crate::densities::errors::DensityError;
use std::{fmt, str::FromStr};

/// Objective used when converting accumulated statistics into parameters.
///
/// - `Ml`: maximum likelihood. Only the ML track is read; denominator
///   statistics are ignored.
/// - `Mmi`: maximum mutual information. The ML track acts as the numerator
///   and is combined with the denominator track by an Extended Baum–Welch
///   update.
///
/// Parsing is case-insensitive (`"ml"`, `"MMI"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EstimationMode {
    #[default]
    Ml,
    Mmi,
}

impl FromStr for EstimationMode {
    type Err = DensityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ml" => Ok(EstimationMode::Ml),
            "mmi" => Ok(EstimationMode::Mmi),
            _ => Err(DensityError::UnknownMode { name: s.to_string() }),
        }
    }
}

impl fmt::Display for EstimationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimationMode::Ml => write!(f, "ml"),
            EstimationMode::Mmi => write!(f, "mmi"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // Verify that mode names parse case-insensitively and render back in
    // lower case.
    //
    // Given
    // -----
    // - The strings "ML", "mmi", and "map".
    //
    // Expect
    // ------
    // - `Ml` and `Mmi` for the first two, `UnknownMode` for "map".
    fn mode_parses_and_displays() {
        // Act
        let ml: EstimationMode = "ML".parse().expect("ml parses");
        let mmi: EstimationMode = "mmi".parse().expect("mmi parses");
        let bad = "map".parse::<EstimationMode>();

        // Assert
        assert_eq!(ml, EstimationMode::Ml);
        assert_eq!(mmi.to_string(), "mmi");
        assert_eq!(bad, Err(DensityError::UnknownMode { name: "map".to_string() }));
    }
}
