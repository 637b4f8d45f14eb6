//! Copy number alteration calls.

pub mod call;

use serde_with::{serde_as, DisplayFromStr};

use crate::{
    common::{de, FilterSet},
    patient::{Assay, Source},
};

/// Direction of a copy number change.
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
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum CnaType {
    Amp,
    Del,
}

impl CnaType {
    /// Type of a fold change; `None` for zero or missing values.
    pub fn of_fold_change(fold_change: Option<f64>) -> Option<Self> {
        match fold_change {
            Some(fc) if fc > 0f64 => Some(CnaType::Amp),
            Some(fc) if fc < 0f64 => Some(CnaType::Del),
            _ => None,
        }
    }
}

/// Reasons a CNA call can be filtered for, in the order they are checked.
#[derive(strum::Display, strum::EnumString, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "snake_case")]
pub enum CnaFilter {
    /// Adjusted p-value above the threshold.
    PvalFilter,
    /// Signed out event with a fold change below the signed out threshold.
    FcFilterSignedout,
    /// De-novo event with a fold change below the de-novo threshold.
    FcFilterDenovo,
    /// De-novo event in a gene outside the ACCESS copy number gene list.
    DenovoNotInGenelist,
    /// Neither amplification nor deletion.
    UnknownEvent,
    /// Gene without any ACCESS call.
    GeneNotInAccess,
}

/// One CNA call of a sample.
#[serde_as]
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CnaRecord {
    #[serde(rename = "Hugo_Symbol")]
    pub hugo_symbol: String,
    pub cna_type: Option<CnaType>,
    /// `{gene}_{cna_type}`.
    #[serde(default)]
    pub variant: String,
    pub sample_id: String,
    pub patient_id: String,
    #[serde(default)]
    pub cmo_patient_id: String,
    #[serde(default)]
    pub dmp_patient_id: String,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub fold_change: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub p_val: Option<f64>,
    /// `Signed Out` if the (gene, type) event is in the clinical calls.
    #[serde(default)]
    pub variant_clinical_status: String,
    #[serde_as(as = "DisplayFromStr")]
    pub filter: FilterSet<CnaFilter>,
    #[serde(default)]
    pub assay: Option<Assay>,
    #[serde(default)]
    pub source: Option<Source>,
}

impl CnaRecord {
    /// The `(gene, type)` event of the call.
    pub fn event(&self) -> (String, Option<CnaType>) {
        (self.hugo_symbol.clone(), self.cna_type)
    }

    /// Text of `cna_type`, empty if unknown.
    pub fn cna_type_str(&self) -> String {
        self.cna_type.map(|t| t.to_string()).unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::{CnaFilter, CnaRecord, CnaType};
    use crate::common::FilterSet;

    #[rstest]
    #[case(Some(1.7), Some(CnaType::Amp))]
    #[case(Some(-0.2), Some(CnaType::Del))]
    #[case(Some(0.0), None)]
    #[case(None, None)]
    fn cna_type_of_fold_change(#[case] fc: Option<f64>, #[case] expected: Option<CnaType>) {
        assert_eq!(CnaType::of_fold_change(fc), expected);
    }

    #[test]
    fn cna_record_header() -> Result<(), anyhow::Error> {
        let header = crate::common::io::header_of::<CnaRecord>()?;
        insta::assert_yaml_snapshot!(header, @r###"
        ---
        - Hugo_Symbol
        - cna_type
        - variant
        - sample_id
        - patient_id
        - cmo_patient_id
        - dmp_patient_id
        - fold_change
        - p_val
        - variant_clinical_status
        - filter
        - assay
        - source
        "###);
        Ok(())
    }

    #[test]
    fn filter_text() {
        let filter: FilterSet<CnaFilter> = [CnaFilter::PvalFilter, CnaFilter::GeneNotInAccess]
            .into_iter()
            .collect();
        assert_eq!(filter.to_string(), "pval_filter;gene_not_in_access");
    }
}
