//! Biometrics genotype comparison results.

pub mod summarize;

/// Outcome of comparing the genotypes of two samples.
#[derive(
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
    strum::EnumString,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
)]
pub enum ComparisonStatus {
    #[serde(rename = "Expected Match")]
    #[strum(serialize = "Expected Match")]
    ExpectedMatch,
    #[serde(rename = "Unexpected Match")]
    #[strum(serialize = "Unexpected Match")]
    UnexpectedMatch,
    #[serde(rename = "Expected Mismatch")]
    #[strum(serialize = "Expected Mismatch")]
    ExpectedMismatch,
    #[serde(rename = "Unexpected Mismatch")]
    #[strum(serialize = "Unexpected Mismatch")]
    UnexpectedMismatch,
}

/// The columns of a biometrics genotype comparison row used here.
#[derive(serde::Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Comparison {
    #[serde(rename = "ReferenceSampleGroup")]
    pub reference_sample_group: String,
    #[serde(rename = "ReferenceSample")]
    pub reference_sample: String,
    /// Kept as text; values outside `ComparisonStatus` only count as comparisons.
    #[serde(rename = "Status")]
    pub status: String,
}

impl Comparison {
    pub fn status(&self) -> Option<ComparisonStatus> {
        self.status.trim().parse().ok()
    }
}
