//! Microsatellite instability scores.

pub mod call;

use crate::{
    common::de,
    patient::{Assay, Source},
};

/// One MSI score of a sample.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MsiRecord {
    pub sample_id: String,
    pub patient_id: String,
    #[serde(default)]
    pub cmo_patient_id: String,
    #[serde(default)]
    pub dmp_patient_id: String,
    #[serde(rename = "MSI_score", default, deserialize_with = "de::opt_f64")]
    pub msi_score: Option<f64>,
    #[serde(rename = "MSI_status", default)]
    pub msi_status: String,
    #[serde(default)]
    pub source: Option<Source>,
    #[serde(default)]
    pub assay: Option<Assay>,
}
