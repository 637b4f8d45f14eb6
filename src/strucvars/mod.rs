//! Structural variant calls.

pub mod call;

use crate::{
    common::de,
    patient::{Assay, Source},
};

/// Short structural variant type names.
///
/// Parsing also accepts the long class names of the clinical SV files.
#[derive(strum::Display, strum::EnumString, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(ascii_case_insensitive)]
pub enum SvType {
    #[strum(serialize = "DEL", serialize = "DELETION", to_string = "DEL")]
    Del,
    #[strum(serialize = "DUP", serialize = "DUPLICATION", to_string = "DUP")]
    Dup,
    #[strum(serialize = "INV", serialize = "INVERSION", to_string = "INV")]
    Inv,
    #[strum(serialize = "INS", serialize = "INSERTION", to_string = "INS")]
    Ins,
    #[strum(serialize = "TRA", serialize = "TRANSLOCATION", to_string = "TRA")]
    Tra,
}

/// Normalize a class or type name to the short type; unknown values are kept.
pub fn short_sv_type(value: &str) -> String {
    let value = value.trim();
    value
        .parse::<SvType>()
        .map(|sv_type| sv_type.to_string())
        .unwrap_or_else(|_| value.to_string())
}

/// Chromosome rank of the SV table sort order: numeric names by value, then
/// X, Y and M, then everything else.
pub fn sv_chrom_rank(chrom: &str) -> u32 {
    let upper = chrom.trim().to_ascii_uppercase();
    let name = upper.strip_prefix("CHR").unwrap_or(&upper);
    match name {
        "X" => 23,
        "Y" => 24,
        "M" | "MT" => 25,
        _ => de::normalize_chrom(name).parse().unwrap_or(26),
    }
}

/// One structural variant call of a sample.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SvRecord {
    pub sample_id: String,
    pub patient_id: String,
    #[serde(default)]
    pub cmo_patient_id: String,
    #[serde(default)]
    pub dmp_patient_id: String,
    pub sv_type: String,
    pub gene1: String,
    pub gene2: String,
    pub chr1: String,
    #[serde(default, deserialize_with = "de::opt_pos")]
    pub pos1: Option<i64>,
    pub chr2: String,
    #[serde(default, deserialize_with = "de::opt_pos")]
    pub pos2: Option<i64>,
    #[serde(default, deserialize_with = "de::opt_count")]
    pub split_read_count: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_count")]
    pub paired_read_count: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_count")]
    pub total_read_count: Option<u32>,
    #[serde(default)]
    pub info: String,
    #[serde(default)]
    pub source: Option<Source>,
    #[serde(default)]
    pub assay: Option<Assay>,
    /// `{gene1}__{gene2}:{sv_type}`.
    #[serde(default)]
    pub variant: String,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub vaf: Option<f64>,
    #[serde(default)]
    pub variant_clinical_status: String,
}

impl SvRecord {
    /// The `variant` text of the call.
    pub fn variant_name(&self) -> String {
        format!(
            "{}__{}:{}",
            self.gene1.trim(),
            self.gene2.trim(),
            self.sv_type.trim()
        )
    }

    /// Supporting reads over total reads; `None` without a positive total.
    pub fn supporting_fraction(&self) -> Option<f64> {
        match self.total_read_count {
            Some(total) if total > 0 => Some(
                (self.split_read_count.unwrap_or(0) + self.paired_read_count.unwrap_or(0)) as f64
                    / total as f64,
            ),
            _ => None,
        }
    }

    /// Sort key: chromosome and position of both breakends, then sample.
    pub fn sort_key(&self) -> (u32, i64, u32, i64, String) {
        (
            sv_chrom_rank(&self.chr1),
            self.pos1.unwrap_or(i64::MAX),
            sv_chrom_rank(&self.chr2),
            self.pos2.unwrap_or(i64::MAX),
            self.sample_id.clone(),
        )
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::SvRecord;

    #[rstest]
    #[case("INVERSION", "INV")]
    #[case("Translocation", "TRA")]
    #[case("DEL", "DEL")]
    #[case("BND", "BND")]
    fn short_sv_type(#[case] value: &str, #[case] expected: &str) {
        assert_eq!(super::short_sv_type(value), expected);
    }

    #[rstest]
    #[case("1", 1)]
    #[case("chr10", 10)]
    #[case("X", 23)]
    #[case("chrY", 24)]
    #[case("MT", 25)]
    #[case("GL000220.1", 26)]
    fn sv_chrom_rank(#[case] chrom: &str, #[case] expected: u32) {
        assert_eq!(super::sv_chrom_rank(chrom), expected);
    }

    #[test]
    fn supporting_fraction() {
        let record = SvRecord {
            split_read_count: Some(3),
            paired_read_count: None,
            total_read_count: Some(12),
            ..Default::default()
        };
        assert_eq!(record.supporting_fraction(), Some(0.25));
        let record = SvRecord {
            total_read_count: Some(0),
            ..record
        };
        assert_eq!(record.supporting_fraction(), None);
    }
}
