//! Feature Layout - Centralized Feature Definition
//!
//! **This file controls the feature schema.**
//!
//! The order of [`Feature::ALL`] is the canonical order used by the scaler,
//! the classifier and every attribution vector. Artifacts whose feature
//! names differ from this layout (in content or in order) are rejected at
//! load time.

use serde::{Deserialize, Serialize};

/// Total number of features
pub const FEATURE_COUNT: usize = 22;

/// One voice measurement of the canonical schema.
///
/// Wire names contain characters (`:`, `(`, `%`) that cannot appear in Rust
/// identifiers, so each variant maps explicitly to its wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Feature {
    // === Fundamental frequency (0-2) ===
    #[serde(rename = "MDVP:Fo(Hz)")]
    MdvpFoHz,
    #[serde(rename = "MDVP:Fhi(Hz)")]
    MdvpFhiHz,
    #[serde(rename = "MDVP:Flo(Hz)")]
    MdvpFloHz,

    // === Jitter (3-7) ===
    #[serde(rename = "MDVP:Jitter(%)")]
    MdvpJitterPercent,
    #[serde(rename = "MDVP:Jitter(Abs)")]
    MdvpJitterAbs,
    #[serde(rename = "MDVP:RAP")]
    MdvpRap,
    #[serde(rename = "MDVP:PPQ")]
    MdvpPpq,
    #[serde(rename = "Jitter:DDP")]
    JitterDdp,

    // === Shimmer (8-13) ===
    #[serde(rename = "MDVP:Shimmer")]
    MdvpShimmer,
    #[serde(rename = "MDVP:Shimmer(dB)")]
    MdvpShimmerDb,
    #[serde(rename = "Shimmer:APQ3")]
    ShimmerApq3,
    #[serde(rename = "Shimmer:APQ5")]
    ShimmerApq5,
    #[serde(rename = "MDVP:APQ")]
    MdvpApq,
    #[serde(rename = "Shimmer:DDA")]
    ShimmerDda,

    // === Noise (14-15) ===
    #[serde(rename = "NHR")]
    Nhr,
    #[serde(rename = "HNR")]
    Hnr,

    // === Nonlinear dynamics (16-21) ===
    #[serde(rename = "RPDE")]
    Rpde,
    #[serde(rename = "DFA")]
    Dfa,
    #[serde(rename = "spread1")]
    Spread1,
    #[serde(rename = "spread2")]
    Spread2,
    #[serde(rename = "D2")]
    D2,
    #[serde(rename = "PPE")]
    Ppe,
}

impl Feature {
    /// All features in canonical order
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::MdvpFoHz,
        Feature::MdvpFhiHz,
        Feature::MdvpFloHz,
        Feature::MdvpJitterPercent,
        Feature::MdvpJitterAbs,
        Feature::MdvpRap,
        Feature::MdvpPpq,
        Feature::JitterDdp,
        Feature::MdvpShimmer,
        Feature::MdvpShimmerDb,
        Feature::ShimmerApq3,
        Feature::ShimmerApq5,
        Feature::MdvpApq,
        Feature::ShimmerDda,
        Feature::Nhr,
        Feature::Hnr,
        Feature::Rpde,
        Feature::Dfa,
        Feature::Spread1,
        Feature::Spread2,
        Feature::D2,
        Feature::Ppe,
    ];

    /// Name used on the wire and in artifacts
    pub const fn wire_name(self) -> &'static str {
        match self {
            Feature::MdvpFoHz => "MDVP:Fo(Hz)",
            Feature::MdvpFhiHz => "MDVP:Fhi(Hz)",
            Feature::MdvpFloHz => "MDVP:Flo(Hz)",
            Feature::MdvpJitterPercent => "MDVP:Jitter(%)",
            Feature::MdvpJitterAbs => "MDVP:Jitter(Abs)",
            Feature::MdvpRap => "MDVP:RAP",
            Feature::MdvpPpq => "MDVP:PPQ",
            Feature::JitterDdp => "Jitter:DDP",
            Feature::MdvpShimmer => "MDVP:Shimmer",
            Feature::MdvpShimmerDb => "MDVP:Shimmer(dB)",
            Feature::ShimmerApq3 => "Shimmer:APQ3",
            Feature::ShimmerApq5 => "Shimmer:APQ5",
            Feature::MdvpApq => "MDVP:APQ",
            Feature::ShimmerDda => "Shimmer:DDA",
            Feature::Nhr => "NHR",
            Feature::Hnr => "HNR",
            Feature::Rpde => "RPDE",
            Feature::Dfa => "DFA",
            Feature::Spread1 => "spread1",
            Feature::Spread2 => "spread2",
            Feature::D2 => "D2",
            Feature::Ppe => "PPE",
        }
    }

    /// Position in the canonical vector
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Wire names in canonical order
pub fn wire_names() -> impl Iterator<Item = &'static str> {
    Feature::ALL.iter().map(|f| f.wire_name())
}

/// Error when an artifact's feature list doesn't match the canonical layout
#[derive(Debug, Clone, thiserror::Error)]
#[error("feature layout mismatch: expected {expected} canonical features, got {actual:?}")]
pub struct LayoutMismatchError {
    pub expected: usize,
    pub actual: Vec<String>,
}

/// Validate a feature name list (from a model/scaler artifact) against the layout
pub fn validate_layout(names: &[String]) -> Result<(), LayoutMismatchError> {
    let matches = names.len() == FEATURE_COUNT
        && names.iter().map(String::as_str).eq(wire_names());

    if matches {
        Ok(())
    } else {
        Err(LayoutMismatchError {
            expected: FEATURE_COUNT,
            actual: names.to_vec(),
        })
    }
}
