//! Records of the SNV/indel tables.

use serde_with::{serde_as, DisplayFromStr};

use crate::{
    common::{de, io::Table, FilterSet},
    patient::{Assay, Source, TumorNormal},
};

/// Columns identifying a variant in all tables.
pub const VARIANT_KEY_COLUMNS: &[&str] = &[
    "Chromosome",
    "Start_Position",
    "End_Position",
    "Reference_Allele",
    "Tumor_Seq_Allele2",
];

/// Columns the MAF-like inputs must carry.
pub const MAF_REQUIRED_COLUMNS: &[&str] = &[
    "Hugo_Symbol",
    "Chromosome",
    "Start_Position",
    "End_Position",
    "Reference_Allele",
    "Tumor_Seq_Allele2",
    "Variant_Classification",
];

/// Identity of a variant, type-normalized for joins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct VariantKey {
    pub chromosome: String,
    pub start: i64,
    pub end: i64,
    pub reference: String,
    pub alt: String,
}

impl VariantKey {
    /// Build from the identity columns of a loosely typed table row.
    pub fn from_row(table: &Table, row: &csv::StringRecord) -> Option<Self> {
        Some(Self {
            chromosome: de::normalize_chrom(table.get(row, "Chromosome")?),
            start: de::parse_pos(table.get(row, "Start_Position")?)?,
            end: de::parse_pos(table.get(row, "End_Position")?)?,
            reference: table.get(row, "Reference_Allele")?.to_string(),
            alt: table.get(row, "Tumor_Seq_Allele2")?.to_string(),
        })
    }
}

/// Key for de-duplicating raw calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub hugo_symbol: String,
    pub variant_classification: String,
    pub variant: VariantKey,
}

/// One row of the union MAF: a deduplicated call with its provenance.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq)]
pub struct UnionRecord {
    #[serde(rename = "Hugo_Symbol", default)]
    pub hugo_symbol: String,
    #[serde(rename = "Chromosome", deserialize_with = "de::chrom")]
    pub chromosome: String,
    #[serde(rename = "Start_Position", deserialize_with = "de::pos")]
    pub start_position: i64,
    #[serde(rename = "End_Position", deserialize_with = "de::pos")]
    pub end_position: i64,
    #[serde(rename = "Reference_Allele")]
    pub reference_allele: String,
    #[serde(rename = "Tumor_Seq_Allele1", default)]
    pub tumor_seq_allele1: String,
    #[serde(rename = "Tumor_Seq_Allele2")]
    pub tumor_seq_allele2: String,
    #[serde(rename = "Tumor_Sample_Barcode", default)]
    pub tumor_sample_barcode: String,
    #[serde(rename = "Matched_Norm_Sample_Barcode", default)]
    pub matched_norm_sample_barcode: String,
    #[serde(default)]
    pub t_ref_count: String,
    #[serde(default)]
    pub t_alt_count: String,
    #[serde(default)]
    pub n_ref_count: String,
    #[serde(default)]
    pub n_alt_count: String,
    #[serde(rename = "Variant_Classification", default)]
    pub variant_classification: String,
    #[serde(rename = "HGVSp", default)]
    pub hgvsp: String,
    #[serde(rename = "HGVSp_Short", default)]
    pub hgvsp_short: String,
    #[serde(rename = "HGVSc", default)]
    pub hgvsc: String,
    /// `Signed Out` if any clinical sample has the call.
    #[serde(rename = "Clinical", default)]
    pub clinical: String,
    /// Sorted, `;`-joined ids of the samples with the call.
    #[serde(rename = "Called_In", default)]
    pub called_in: String,
}

impl UnionRecord {
    pub fn variant_key(&self) -> VariantKey {
        VariantKey {
            chromosome: self.chromosome.clone(),
            start: self.start_position,
            end: self.end_position,
            reference: self.reference_allele.clone(),
            alt: self.tumor_seq_allele2.clone(),
        }
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            hugo_symbol: self.hugo_symbol.clone(),
            variant_classification: self.variant_classification.clone(),
            variant: self.variant_key(),
        }
    }

    /// Sample ids of `Called_In`.
    pub fn called_in_samples(&self) -> impl Iterator<Item = &str> {
        self.called_in
            .split(';')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

/// Kind of BAM the counts of a call come from.
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
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum BamType {
    SimplexDuplex,
    Unfiltered,
    Standard,
}

/// Evidence status of a (variant, sample) call.
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
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CallStatus {
    /// The sample is among the samples the variant was called in.
    Called,
    /// Coverage below the assay minimum.
    LowCoverage,
    /// Genotyped with non-zero VAF.
    Genotyped,
}

/// Reasons a SNV/indel call can be filtered for, in cascade order.
#[derive(strum::Display, strum::EnumString, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "snake_case")]
pub enum SnvFilter {
    ExcludedGene,
    ExcludedClassification,
    LowAccessCov,
    LowDuplexAltCount,
    LowTumorToNormalVafRatio,
}

/// One (variant, sample) row of the long call table.
///
/// This is the row type of all tables from `snvs aggregate` on; later stages
/// fill the annotation columns.
#[serde_as]
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CallRecord {
    #[serde(rename = "Hugo_Symbol", default)]
    pub hugo_symbol: String,
    #[serde(rename = "Chromosome", deserialize_with = "de::chrom")]
    pub chromosome: String,
    #[serde(rename = "Start_Position", deserialize_with = "de::pos")]
    pub start_position: i64,
    #[serde(rename = "End_Position", deserialize_with = "de::pos")]
    pub end_position: i64,
    #[serde(rename = "Reference_Allele")]
    pub reference_allele: String,
    #[serde(rename = "Tumor_Seq_Allele2")]
    pub tumor_seq_allele2: String,
    #[serde(rename = "Variant_Classification", default)]
    pub variant_classification: String,
    #[serde(rename = "HGVSp", default)]
    pub hgvsp: String,
    #[serde(rename = "HGVSp_Short", default)]
    pub hgvsp_short: String,
    #[serde(rename = "HGVSc", default)]
    pub hgvsc: String,
    #[serde(rename = "Clinical", default)]
    pub clinical: String,

    #[serde(default)]
    pub sample_id: String,
    #[serde(default)]
    pub tumor_normal: Option<TumorNormal>,
    #[serde(default)]
    pub assay: Option<Assay>,
    #[serde(default)]
    pub source: Option<Source>,
    #[serde(default)]
    pub bam_type: Option<BamType>,
    #[serde(default, deserialize_with = "de::opt_count")]
    pub alt_count: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_count")]
    pub total_count: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub vaf: Option<f64>,
    /// Duplex-only alt count of ACCESS tumor samples.
    #[serde(default, deserialize_with = "de::opt_count")]
    pub duplex_alt_count: Option<u32>,
    #[serde(default)]
    pub patient_id: String,
    #[serde(default)]
    pub call_status: Option<CallStatus>,

    #[serde(rename = "Hotspot", default)]
    pub hotspot: String,
    #[serde(rename = "CH", default)]
    pub ch: String,

    #[serde(default)]
    pub clonality: String,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub tcn: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub expected_alt_copies: Option<f64>,
    #[serde(default)]
    pub facets_impact_sample: String,
    #[serde(default)]
    pub facets_fit: String,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub adjusted_vaf: Option<f64>,

    /// Empty before filtering, then `PASS` or the `;`-joined reasons.
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub filter: Option<FilterSet<SnvFilter>>,
}

impl CallRecord {
    pub fn variant_key(&self) -> VariantKey {
        VariantKey {
            chromosome: self.chromosome.clone(),
            start: self.start_position,
            end: self.end_position,
            reference: self.reference_allele.clone(),
            alt: self.tumor_seq_allele2.clone(),
        }
    }

    /// The VAF recorded for the call, else `alt / total` for positive totals.
    pub fn raw_vaf(&self) -> Option<f64> {
        self.vaf.or_else(|| match (self.alt_count, self.total_count) {
            (Some(alt), Some(total)) if total > 0 => Some(alt as f64 / total as f64),
            _ => None,
        })
    }

    /// Whether the call has passed (or not yet run) the filter cascade.
    pub fn is_pass_or_unfiltered(&self) -> bool {
        self.filter.as_ref().map(FilterSet::is_pass).unwrap_or(true)
    }

    pub fn is_signed_out(&self) -> bool {
        self.clinical == crate::snvs::SIGNED_OUT
    }

    pub fn is_access(&self) -> bool {
        self.assay == Some(Assay::Access)
    }

    pub fn is_access_tumor(&self) -> bool {
        self.is_access() && self.tumor_normal == Some(TumorNormal::Tumor)
    }

    /// Copy the union columns of `union` into a new call record.
    pub fn from_union(union: &UnionRecord) -> Self {
        Self {
            hugo_symbol: union.hugo_symbol.clone(),
            chromosome: union.chromosome.clone(),
            start_position: union.start_position,
            end_position: union.end_position,
            reference_allele: union.reference_allele.clone(),
            tumor_seq_allele2: union.tumor_seq_allele2.clone(),
            variant_classification: union.variant_classification.clone(),
            hgvsp: union.hgvsp.clone(),
            hgvsp_short: union.hgvsp_short.clone(),
            hgvsc: union.hgvsc.clone(),
            clinical: union.clinical.clone(),
            ..Default::default()
        }
    }
}
