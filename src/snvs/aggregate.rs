//! Implementation of `snvs aggregate` subcommand.
//!
//! Left-joins the genotyped counts of every sample of a patient onto the
//! union variant list, giving one row per variant and sample.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use crate::{
    common::{
        de,
        io::{load_table, write_records, Table, TableFormat},
    },
    patient::{Assay, PatientData, Sample},
    snvs::{
        schema::{BamType, CallRecord, CallStatus, UnionRecord, VariantKey, VARIANT_KEY_COLUMNS},
        sort_calls,
    },
};

/// Command line arguments for `snvs aggregate` subcommand.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Aggregate allele counts of all samples of a patient", long_about = None)]
pub struct Args {
    /// Path to the patient JSON.
    #[arg(long)]
    pub patient_json: PathBuf,
    /// Genotyped MAF files of the patient's samples.
    #[arg(long, required = true, num_args = 1..)]
    pub genotyped_mafs: Vec<PathBuf>,
    /// Path to the union MAF from `snvs union`.
    #[arg(long)]
    pub union_calls_maf: PathBuf,
    /// Minimum total count for ACCESS samples.
    #[arg(long, default_value_t = 100)]
    pub access_min_cov: u32,
    /// Minimum total count for IMPACT samples.
    #[arg(long, default_value_t = 50)]
    pub impact_min_cov: u32,
    /// Path to the output CSV.
    #[arg(long)]
    pub output: PathBuf,
}

/// Where the counts of a sample come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountSource {
    /// Suffix of the genotyped MAF after the sample id.
    pub suffix: &'static str,
    pub bam_type: BamType,
    pub alt_count_col: &'static str,
    pub total_count_col: &'static str,
}

impl CountSource {
    /// Select the count source for `sample`.
    pub fn for_sample(sample: &Sample) -> Self {
        match (sample.assay_type.assay(), sample.is_access_tumor()) {
            (Assay::Access, true) => CountSource {
                suffix: "-SIMPLEX-DUPLEX_genotyped.maf",
                bam_type: BamType::SimplexDuplex,
                alt_count_col: "t_alt_count_fragment_simplex_duplex",
                total_count_col: "t_total_count_fragment_simplex_duplex",
            },
            (Assay::Access, false) => CountSource {
                suffix: "-STANDARD_genotyped.maf",
                bam_type: BamType::Unfiltered,
                alt_count_col: "t_alt_count_fragment",
                total_count_col: "t_total_count_fragment",
            },
            (Assay::Impact, _) => CountSource {
                suffix: "-STANDARD_genotyped.maf",
                bam_type: BamType::Standard,
                alt_count_col: "t_alt_count_fragment",
                total_count_col: "t_total_count_fragment",
            },
        }
    }
}

/// Suffix of the duplex-only genotyped MAF of ACCESS tumor samples.
pub const DUPLEX_SUFFIX: &str = "-DUPLEX_genotyped.maf";

/// Find the file among `mafs` whose name ends with `{sample_id}{suffix}`.
fn find_maf<'a>(mafs: &'a [PathBuf], sample_id: &str, suffix: &str) -> Option<&'a PathBuf> {
    let expected = format!("{}{}", sample_id, suffix);
    mafs.iter().find(|path| {
        path.file_name()
            .map(|name| name.to_string_lossy().ends_with(&expected))
            .unwrap_or(false)
    })
}

/// Genotyped counts of one sample, by variant, in file order.
type Counts = HashMap<VariantKey, Vec<(Option<u32>, Option<u32>)>>;

/// Read (alt, total) counts from a genotyped MAF table.
fn read_counts(table: &Table, alt_col: &str, total_col: &str) -> Counts {
    let mut result = Counts::new();
    for row in &table.rows {
        match VariantKey::from_row(table, row) {
            Some(key) => result.entry(key).or_default().push((
                table.get(row, alt_col).and_then(de::parse_count),
                table.get(row, total_col).and_then(de::parse_count),
            )),
            None => tracing::warn!("skipping row with invalid identity in {:?}", &table.path),
        }
    }
    result
}

/// Load the counts of `sample`, `None` if its MAF is absent or unusable.
fn load_sample_counts(mafs: &[PathBuf], sample: &Sample, source: &CountSource) -> Option<Counts> {
    let path = match find_maf(mafs, &sample.sample_id, source.suffix) {
        Some(path) => path,
        None => {
            tracing::warn!(
                "MAF file not found for sample {}, skipping (expected *{}{})",
                &sample.sample_id,
                &sample.sample_id,
                source.suffix
            );
            return None;
        }
    };
    let required = VARIANT_KEY_COLUMNS
        .iter()
        .copied()
        .chain([source.alt_count_col, source.total_count_col])
        .collect::<Vec<_>>();
    load_table(path, &TableFormat::TSV.with_comments(), &required)
        .or_warn(&format!("genotyped MAF of {}", &sample.sample_id))
        .map(|table| read_counts(&table, source.alt_count_col, source.total_count_col))
}

/// Load the duplex alt counts of an ACCESS tumor sample, if available.
fn load_duplex_counts(mafs: &[PathBuf], sample: &Sample) -> HashMap<VariantKey, u32> {
    let path = match find_maf(mafs, &sample.sample_id, DUPLEX_SUFFIX) {
        Some(path) => path,
        None => {
            tracing::debug!("no duplex MAF for {}", &sample.sample_id);
            return HashMap::new();
        }
    };
    let required = VARIANT_KEY_COLUMNS
        .iter()
        .copied()
        .chain(["t_alt_count_fragment"])
        .collect::<Vec<_>>();
    load_table(path, &TableFormat::TSV.with_comments(), &required)
        .or_warn(&format!("duplex MAF of {}", &sample.sample_id))
        .map(|table| {
            read_counts(&table, "t_alt_count_fragment", "t_total_count_fragment")
                .into_iter()
                .filter_map(|(key, counts)| {
                    counts
                        .first()
                        .and_then(|(alt, _)| *alt)
                        .map(|alt| (key, alt))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Thresholds of the call status derivation.
#[derive(Debug, Clone, Copy)]
pub struct Coverage {
    pub access_min_cov: u32,
    pub impact_min_cov: u32,
}

impl Default for Coverage {
    fn default() -> Self {
        Self {
            access_min_cov: 100,
            impact_min_cov: 50,
        }
    }
}

/// Derive the call status of a row given the samples the variant was called in.
pub fn call_status(
    record: &CallRecord,
    called_in: &HashSet<&str>,
    coverage: &Coverage,
) -> Option<CallStatus> {
    let min_cov = if record.assay == Some(Assay::Impact) {
        coverage.impact_min_cov
    } else {
        coverage.access_min_cov
    };
    if !record.sample_id.is_empty() && called_in.contains(record.sample_id.as_str()) {
        Some(CallStatus::Called)
    } else if matches!(record.total_count, Some(total) if total < min_cov) {
        Some(CallStatus::LowCoverage)
    } else if matches!(record.vaf, Some(vaf) if vaf > 0f64) {
        Some(CallStatus::Genotyped)
    } else {
        None
    }
}

/// Per-sample input of the aggregation.
pub struct SampleCounts<'a> {
    pub sample: &'a Sample,
    pub bam_type: BamType,
    pub counts: HashMap<VariantKey, Vec<(Option<u32>, Option<u32>)>>,
    pub duplex: HashMap<VariantKey, u32>,
}

/// Left-join every sample's counts onto the union list.
///
/// A variant without counts in a sample yields one row with null counts; a
/// variant with several count rows yields one row per count row.
pub fn aggregate(
    union: &[UnionRecord],
    samples: &[SampleCounts],
    patient_id: &str,
    coverage: &Coverage,
) -> Vec<CallRecord> {
    let mut result = Vec::new();
    if samples.is_empty() {
        for union_record in union {
            result.push(CallRecord {
                patient_id: patient_id.to_string(),
                ..CallRecord::from_union(union_record)
            });
        }
    }

    for sample_counts in samples {
        let sample = sample_counts.sample;
        for union_record in union {
            let key = union_record.variant_key();
            let called_in = union_record.called_in_samples().collect::<HashSet<_>>();
            let counts = sample_counts
                .counts
                .get(&key)
                .cloned()
                .unwrap_or_else(|| vec![(None, None)]);
            for (alt_count, total_count) in counts {
                let vaf = match (alt_count, total_count) {
                    (Some(alt), Some(total)) if total > 0 => Some(alt as f64 / total as f64),
                    _ => None,
                };
                let mut record = CallRecord {
                    sample_id: sample.sample_id.clone(),
                    tumor_normal: Some(sample.tumor_normal),
                    assay: Some(sample.assay_type.assay()),
                    source: Some(sample.assay_type.source()),
                    bam_type: Some(sample_counts.bam_type),
                    alt_count,
                    total_count,
                    vaf,
                    duplex_alt_count: sample_counts.duplex.get(&key).copied(),
                    patient_id: patient_id.to_string(),
                    ..CallRecord::from_union(union_record)
                };
                record.call_status = call_status(&record, &called_in, coverage);
                result.push(record);
            }
        }
    }

    sort_calls(&mut result);
    result
}

/// Read the union MAF; missing identity columns are an error.
pub fn read_union(path: &Path) -> Result<Vec<UnionRecord>, anyhow::Error> {
    let table = Table::read(path, &TableFormat::TSV.with_comments())?;
    table.require_columns(VARIANT_KEY_COLUMNS)?;
    let mut result = Vec::new();
    for (i, row) in table.rows.iter().enumerate() {
        match table.deserialize_row::<UnionRecord>(row) {
            Ok(record) => result.push(record),
            Err(e) => tracing::warn!("skipping row {} of {:?}: {}", i + 1, path, e),
        }
    }
    Ok(result)
}

/// Main entry point for `snvs aggregate` sub command.
pub fn run(common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", &common);
    tracing::info!("args = {:?}", &args);

    let patient = PatientData::load(&args.patient_json)?;
    let union = read_union(&args.union_calls_maf)?;
    tracing::info!("{} union variants", union.len());

    let mut samples = Vec::new();
    for sample in patient.samples.values() {
        let source = CountSource::for_sample(sample);
        if let Some(counts) = load_sample_counts(&args.genotyped_mafs, sample, &source) {
            let duplex = if sample.is_access_tumor() {
                load_duplex_counts(&args.genotyped_mafs, sample)
            } else {
                HashMap::new()
            };
            samples.push(SampleCounts {
                sample,
                bam_type: source.bam_type,
                counts,
                duplex,
            });
        }
    }
    if samples.is_empty() {
        tracing::warn!("no genotyped MAF could be loaded, writing union variants without counts");
    }

    let coverage = Coverage {
        access_min_cov: args.access_min_cov,
        impact_min_cov: args.impact_min_cov,
    };
    let records = aggregate(&union, &samples, &patient.combined_id, &coverage);
    write_records(&args.output, &TableFormat::CSV, &records)?;

    crate::common::trace_rss_now();
    Ok(())
}

#[cfg(test)]
mod test {
    use std::{collections::HashMap, path::PathBuf};

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::{Coverage, SampleCounts, DUPLEX_SUFFIX};
    use crate::{
        patient::{Assay, AssayType, PatientData, Sample, TumorNormal},
        snvs::schema::{BamType, CallRecord, CallStatus, UnionRecord},
    };

    fn union_record(called_in: &str) -> UnionRecord {
        UnionRecord {
            hugo_symbol: String::from("GENE1"),
            chromosome: String::from("1"),
            start_position: 100,
            end_position: 100,
            reference_allele: String::from("A"),
            tumor_seq_allele2: String::from("T"),
            called_in: called_in.to_string(),
            ..Default::default()
        }
    }

    fn sample(sample_id: &str, assay_type: AssayType) -> Sample {
        Sample {
            sample_id: sample_id.to_string(),
            tumor_normal: TumorNormal::Tumor,
            assay_type,
            anon_id: None,
            access_version: None,
            donor_id: None,
        }
    }

    #[rstest]
    #[case("C-ABC123-L001-d01-DUPLEX_genotyped.maf", true)]
    #[case("run1_C-ABC123-L001-d01-DUPLEX_genotyped.maf", true)]
    #[case("C-ABC123-L001-d01-SIMPLEX-DUPLEX_genotyped.maf", false)]
    #[case("C-ABC123-L001-d01-DUPLEX_genotyped.maf.bak", false)]
    fn find_maf(#[case] name: &str, #[case] expected: bool) {
        let mafs = vec![PathBuf::from("genotyped").join(name)];
        assert_eq!(
            super::find_maf(&mafs, "C-ABC123-L001-d01", DUPLEX_SUFFIX).is_some(),
            expected
        );
    }

    #[test]
    fn left_join_example() {
        let union = vec![union_record("")];
        let s1 = sample("S1", AssayType::ClinicalImpact);
        let s2 = sample("S2", AssayType::ClinicalImpact);
        let key = union[0].variant_key();
        let samples = vec![
            SampleCounts {
                sample: &s1,
                bam_type: BamType::Standard,
                counts: vec![(key, vec![(Some(5), Some(50))])].into_iter().collect(),
                duplex: HashMap::new(),
            },
            SampleCounts {
                sample: &s2,
                bam_type: BamType::Standard,
                counts: HashMap::new(),
                duplex: HashMap::new(),
            },
        ];

        let records = super::aggregate(&union, &samples, "P1", &Coverage::default());

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sample_id, "S1");
        assert_eq!(records[0].vaf, Some(0.1));
        assert_eq!(records[0].call_status, Some(CallStatus::Genotyped));
        assert_eq!(records[1].sample_id, "S2");
        assert_eq!(records[1].alt_count, None);
        assert_eq!(records[1].total_count, None);
        assert_eq!(records[1].vaf, None);
        assert_eq!(records[1].call_status, None);
    }

    #[test]
    fn row_count_is_variants_times_samples() {
        let union = (0..3)
            .map(|i| UnionRecord {
                start_position: 100 + i,
                end_position: 100 + i,
                ..union_record("")
            })
            .collect::<Vec<_>>();
        let sample_list = (0..4)
            .map(|i| sample(&format!("S{}", i), AssayType::ResearchAccess))
            .collect::<Vec<_>>();
        let samples = sample_list
            .iter()
            .map(|sample| SampleCounts {
                sample,
                bam_type: BamType::SimplexDuplex,
                counts: HashMap::new(),
                duplex: HashMap::new(),
            })
            .collect::<Vec<_>>();

        let records = super::aggregate(&union, &samples, "P1", &Coverage::default());

        assert_eq!(records.len(), 12);
    }

    #[test]
    fn no_samples_keeps_union_rows() {
        let union = vec![union_record("S1")];
        let records = super::aggregate(&union, &[], "P1", &Coverage::default());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].patient_id, "P1");
        assert_eq!(records[0].sample_id, "");
        assert_eq!(records[0].call_status, None);
    }

    #[rstest]
    #[case("S1;S2", Some(Assay::Access), Some(10), Some(0.5), Some(CallStatus::Called))]
    #[case("S2", Some(Assay::Access), Some(99), Some(0.5), Some(CallStatus::LowCoverage))]
    #[case("S2", Some(Assay::Impact), Some(99), Some(0.5), Some(CallStatus::Genotyped))]
    #[case("S2", Some(Assay::Impact), Some(49), Some(0.5), Some(CallStatus::LowCoverage))]
    #[case("S2", Some(Assay::Access), Some(100), Some(0.0), None)]
    #[case("", Some(Assay::Access), None, None, None)]
    fn call_status(
        #[case] called_in: &str,
        #[case] assay: Option<Assay>,
        #[case] total_count: Option<u32>,
        #[case] vaf: Option<f64>,
        #[case] expected: Option<CallStatus>,
    ) {
        let record = CallRecord {
            sample_id: String::from("S1"),
            assay,
            total_count,
            vaf,
            ..Default::default()
        };
        let called_in = called_in
            .split(';')
            .filter(|s| !s.is_empty())
            .collect();
        assert_eq!(
            super::call_status(&record, &called_in, &Coverage::default()),
            expected
        );
    }

    #[test]
    fn count_source_for_sample() {
        let mut normal = sample("C-1-N001-d01", AssayType::ResearchAccess);
        normal.tumor_normal = TumorNormal::Normal;
        assert_eq!(
            super::CountSource::for_sample(&normal).bam_type,
            BamType::Unfiltered
        );
        assert_eq!(
            super::CountSource::for_sample(&sample("P-1-T01-XS2", AssayType::ClinicalAccess))
                .alt_count_col,
            "t_alt_count_fragment_simplex_duplex"
        );
        assert_eq!(
            super::CountSource::for_sample(&sample("P-1-T01-IM7", AssayType::ClinicalImpact))
                .suffix,
            "-STANDARD_genotyped.maf"
        );
    }

    #[test]
    fn run_smoke() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let dir = PathBuf::from("tests/snvs/aggregate");
        let args = super::Args {
            patient_json: PathBuf::from("tests/patient/C-ABC123_P-0000001_all_samples.json"),
            genotyped_mafs: vec![
                dir.join("C-ABC123-L001-d01-SIMPLEX-DUPLEX_genotyped.maf"),
                dir.join("C-ABC123-L001-d01-DUPLEX_genotyped.maf"),
                dir.join("C-ABC123-N001-d01-STANDARD_genotyped.maf"),
                dir.join("P-0000001-T02-IM7-STANDARD_genotyped.maf"),
            ],
            union_calls_maf: dir.join("union.maf"),
            access_min_cov: 100,
            impact_min_cov: 50,
            output: tmp_dir.join("aggregated.csv"),
        };

        super::run(&crate::common::Args::default(), &args)?;

        let records = crate::snvs::read_calls(tmp_dir.join("aggregated.csv"))?;
        // 2 variants x 3 samples with a MAF; the clinical ACCESS sample has none.
        assert_eq!(records.len(), 6);
        // sorted by chromosome rank: 12 before 17
        assert_eq!(records[0].hugo_symbol, "KRAS");

        let tp53_l001 = records
            .iter()
            .find(|r| r.hugo_symbol == "TP53" && r.sample_id == "C-ABC123-L001-d01")
            .ok_or_else(|| anyhow::anyhow!("missing TP53 row"))?;
        assert_eq!(tp53_l001.alt_count, Some(5));
        assert_eq!(tp53_l001.total_count, Some(500));
        assert_eq!(tp53_l001.duplex_alt_count, Some(2));
        assert_eq!(tp53_l001.call_status, Some(CallStatus::Called));
        assert_eq!(tp53_l001.bam_type, Some(BamType::SimplexDuplex));

        let kras_normal = records
            .iter()
            .find(|r| r.hugo_symbol == "KRAS" && r.sample_id == "C-ABC123-N001-d01")
            .ok_or_else(|| anyhow::anyhow!("missing KRAS row"))?;
        assert_eq!(kras_normal.call_status, Some(CallStatus::LowCoverage));
        assert_eq!(kras_normal.tumor_normal, Some(TumorNormal::Normal));

        let kras_impact = records
            .iter()
            .find(|r| r.hugo_symbol == "KRAS" && r.sample_id == "P-0000001-T02-IM7")
            .ok_or_else(|| anyhow::anyhow!("missing KRAS IMPACT row"))?;
        assert_eq!(kras_impact.alt_count, None);
        assert_eq!(kras_impact.call_status, None);

        let patient = PatientData::load(&args.patient_json)?;
        assert!(records.iter().all(|r| r.patient_id == patient.combined_id));

        Ok(())
    }
}
