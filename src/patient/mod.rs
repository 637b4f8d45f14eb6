//! Patient and sample metadata.

pub mod infer;

use std::path::Path;

use indexmap::IndexMap;

use crate::err::ParseError;

/// The assay and source a sample was sequenced with.
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
    PartialOrd,
    Ord,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AssayType {
    ResearchAccess,
    ClinicalAccess,
    ClinicalImpact,
}

impl AssayType {
    /// Parse from text, reporting unknown values as `ParseError`.
    pub fn parse(value: &str) -> Result<Self, ParseError> {
        value
            .parse()
            .map_err(|_| ParseError::UnknownAssayType(value.to_string()))
    }

    pub fn source(&self) -> Source {
        match self {
            AssayType::ResearchAccess => Source::Research,
            AssayType::ClinicalAccess | AssayType::ClinicalImpact => Source::Clinical,
        }
    }

    pub fn assay(&self) -> Assay {
        match self {
            AssayType::ResearchAccess | AssayType::ClinicalAccess => Assay::Access,
            AssayType::ClinicalImpact => Assay::Impact,
        }
    }
}

/// Origin of a sample's calls.
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
    PartialOrd,
    Ord,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Source {
    Research,
    Clinical,
}

/// Sequencing assay.
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
    PartialOrd,
    Ord,
)]
pub enum Assay {
    #[serde(rename = "ACCESS")]
    #[strum(serialize = "ACCESS")]
    Access,
    #[serde(rename = "IMPACT")]
    #[strum(serialize = "IMPACT")]
    Impact,
}

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
    PartialOrd,
    Ord,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TumorNormal {
    Tumor,
    Normal,
}

impl TumorNormal {
    /// Infer from a sample id of the form `C-XXXXXX-N001-d01`; the third
    /// `-`-separated field starts with `N` for normal samples.
    pub fn infer(sample_id: &str) -> Self {
        match sample_id.split('-').nth(2) {
            Some(field) if field.starts_with('N') => TumorNormal::Normal,
            Some(_) => TumorNormal::Tumor,
            None => {
                tracing::warn!(
                    "cannot infer tumor/normal from sample id {:?}, assuming tumor",
                    sample_id
                );
                TumorNormal::Tumor
            }
        }
    }
}

/// One sample of a patient.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct Sample {
    /// Taken from the `samples` map key when absent.
    #[serde(default)]
    pub sample_id: String,
    pub tumor_normal: TumorNormal,
    pub assay_type: AssayType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anon_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donor_id: Option<String>,
}

impl Sample {
    pub fn is_access_tumor(&self) -> bool {
        self.assay_type.assay() == Assay::Access && self.tumor_normal == TumorNormal::Tumor
    }

    pub fn is_research_access_tumor(&self) -> bool {
        self.assay_type == AssayType::ResearchAccess && self.tumor_normal == TumorNormal::Tumor
    }

    /// The CMO patient id is the first two `-` fields of a research sample id.
    pub fn cmo_patient_id(&self) -> String {
        self.sample_id.split('-').take(2).collect::<Vec<_>>().join("-")
    }
}

/// The per-patient sample manifest.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PatientData {
    pub combined_id: String,
    pub cmo_id: String,
    pub dmp_id: String,
    #[serde(default)]
    pub sex: String,
    #[serde(default)]
    pub samples: IndexMap<String, Sample>,
}

impl PatientData {
    /// Load patient data from JSON file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let reader = crate::common::io::open_read_maybe_gz(path.as_ref())
            .map_err(|e| anyhow::anyhow!("could not open {:?}: {}", path.as_ref(), e))?;
        let mut result: Self = serde_json::from_reader(reader)
            .map_err(|e| anyhow::anyhow!("could not parse {:?}: {}", path.as_ref(), e))?;
        for (key, sample) in result.samples.iter_mut() {
            if sample.sample_id.is_empty() {
                sample.sample_id = key.clone();
            }
        }
        tracing::debug!(
            "loaded patient {} with {} samples",
            &result.combined_id,
            result.samples.len()
        );
        Ok(result)
    }

    /// Write as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), anyhow::Error> {
        let writer = crate::common::io::open_write_maybe_gz(path.as_ref())?;
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| anyhow::anyhow!("could not write {:?}: {}", path.as_ref(), e))?;
        tracing::info!("Saved {:?}", path.as_ref());
        Ok(())
    }

    /// Samples of the given assay type, in manifest order.
    pub fn samples_of(&self, assay_type: AssayType) -> impl Iterator<Item = &Sample> {
        self.samples
            .values()
            .filter(move |sample| sample.assay_type == assay_type)
    }

    /// Research ACCESS tumor samples.
    pub fn research_access_tumors(&self) -> impl Iterator<Item = &Sample> {
        self.samples
            .values()
            .filter(|sample| sample.is_research_access_tumor())
    }

    /// All clinical samples.
    pub fn clinical_samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples
            .values()
            .filter(|sample| sample.assay_type.source() == Source::Clinical)
    }
}
