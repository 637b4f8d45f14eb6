//! Implementation of `snvs union` subcommand.

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    path::{Path, PathBuf},
};

use crate::{
    common::io::{is_valid_path, write_records, Table, TableFormat},
    patient::{PatientData, Source},
    snvs::{
        schema::{UnionRecord, VariantKey, MAF_REQUIRED_COLUMNS},
        SIGNED_OUT,
    },
};

/// Command line arguments for `snvs union` subcommand.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Union of research and clinical SNV/indel calls", long_about = None)]
pub struct Args {
    /// Path to the patient JSON.
    #[arg(long)]
    pub patient_json: PathBuf,
    /// Template of the research ACCESS MAF paths; `{cmo_patient_id}`,
    /// `{sample_id}` and `{donor_id}` are substituted.
    #[arg(long)]
    pub research_access_mutations_maf_template: String,
    /// Path to the clinical (DMP) mutations MAF.
    #[arg(long)]
    pub dmp_mutations_file: PathBuf,
    /// Path to the output MAF.
    #[arg(long)]
    pub output: PathBuf,
}

/// A call parsed from an input MAF together with the sample it was called in.
#[derive(Debug, Clone)]
pub struct SampleCall {
    pub record: UnionRecord,
    pub sample_id: String,
    pub source: Source,
}

/// Parse the calls of one MAF.
///
/// Germline calls are dropped; research calls with a non-empty `Status`
/// failed QC; clinical MAFs are restricted to barcodes containing `dmp_id`.
/// A missing file yields no calls; missing identity columns are an error.
pub fn parse_mutation_file(
    path: &Path,
    source: Source,
    dmp_id: Option<&str>,
) -> Result<Vec<SampleCall>, anyhow::Error> {
    if !is_valid_path(path) {
        tracing::warn!("skipping MAF, file not found: {:?}", path);
        return Ok(Vec::new());
    }
    let format = match source {
        Source::Clinical => TableFormat::TSV
            .with_comments()
            .dropping_lines_with("sequenced_samples:"),
        Source::Research => TableFormat::TSV.with_comments(),
    };
    let table = Table::read(path, &format)?;
    table.require_columns(MAF_REQUIRED_COLUMNS)?;
    table.require_columns(&["Tumor_Sample_Barcode"])?;

    let mut result = Vec::new();
    for (i, row) in table.rows.iter().enumerate() {
        if table.get_or_empty(row, "Mutation_Status") == "GERMLINE" {
            continue;
        }
        let sample_id = table.get_or_empty(row, "Tumor_Sample_Barcode");
        match (source, dmp_id) {
            (Source::Research, _) if !table.get_or_empty(row, "Status").is_empty() => continue,
            (Source::Clinical, Some(dmp_id)) if !sample_id.contains(dmp_id) => continue,
            _ => (),
        }
        match table.deserialize_row::<UnionRecord>(row) {
            Ok(record) => result.push(SampleCall {
                record: UnionRecord {
                    clinical: String::new(),
                    called_in: String::new(),
                    ..record
                },
                sample_id: sample_id.to_string(),
                source,
            }),
            Err(e) => tracing::warn!("skipping row {} of {:?}: {}", i + 1, path, e),
        }
    }
    tracing::debug!("{} calls from {:?}", result.len(), path);
    Ok(result)
}

/// Research ACCESS calls of all research tumor samples of `patient`.
fn research_calls(patient: &PatientData, template: &str) -> Result<Vec<SampleCall>, anyhow::Error> {
    if patient.cmo_id.is_empty() {
        return Ok(Vec::new());
    }
    let mut result = Vec::new();
    for sample in patient.research_access_tumors() {
        let path = template
            .replace("{cmo_patient_id}", &patient.cmo_id)
            .replace("{sample_id}", &sample.sample_id)
            .replace("{donor_id}", sample.donor_id.as_deref().unwrap_or_default());
        result.append(&mut parse_mutation_file(
            Path::new(&path),
            Source::Research,
            None,
        )?);
    }
    Ok(result)
}

/// Union the calls: de-duplicate by gene, classification and variant
/// (first occurrence wins) and derive `Clinical` and `Called_In` from all
/// samples carrying the variant.
pub fn merge_calls(calls: Vec<SampleCall>) -> Vec<UnionRecord> {
    let mut called_in: HashMap<VariantKey, BTreeSet<String>> = HashMap::new();
    let mut clinical: HashSet<VariantKey> = HashSet::new();
    for call in &calls {
        let key = call.record.variant_key();
        if call.source == Source::Clinical {
            clinical.insert(key.clone());
        }
        called_in
            .entry(key)
            .or_default()
            .insert(call.sample_id.clone());
    }

    let mut seen = HashSet::new();
    calls
        .into_iter()
        .filter(|call| seen.insert(call.record.dedup_key()))
        .map(|call| {
            let key = call.record.variant_key();
            UnionRecord {
                clinical: if clinical.contains(&key) {
                    SIGNED_OUT.to_string()
                } else {
                    String::new()
                },
                called_in: called_in
                    .get(&key)
                    .map(|samples| samples.iter().cloned().collect::<Vec<_>>().join(";"))
                    .unwrap_or_default(),
                ..call.record
            }
        })
        .collect()
}

/// Main entry point for `snvs union` sub command.
pub fn run(common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", &common);
    tracing::info!("args = {:?}", &args);

    let patient = PatientData::load(&args.patient_json)?;
    let mut calls = research_calls(&patient, &args.research_access_mutations_maf_template)?;
    if !patient.dmp_id.is_empty() {
        calls.append(&mut parse_mutation_file(
            &args.dmp_mutations_file,
            Source::Clinical,
            Some(&patient.dmp_id),
        )?);
    }
    tracing::info!("collected {} raw calls", calls.len());

    let union = merge_calls(calls);
    if union.is_empty() {
        tracing::warn!("no mutations to write for {}", &patient.combined_id);
    }
    write_records(&args.output, &TableFormat::TSV, &union)?;

    crate::common::trace_rss_now();
    Ok(())
}

#[cfg(test)]
mod test {
    use std::path::{Path, PathBuf};

    use pretty_assertions::assert_eq;

    use crate::{
        patient::Source,
        snvs::{schema::UnionRecord, SIGNED_OUT},
    };

    fn call(gene: &str, start: i64, barcode: &str, hgvsc: &str, source: Source) -> super::SampleCall {
        super::SampleCall {
            record: UnionRecord {
                hugo_symbol: gene.to_string(),
                chromosome: String::from("1"),
                start_position: start,
                end_position: start,
                reference_allele: String::from("A"),
                tumor_seq_allele2: String::from("T"),
                tumor_sample_barcode: barcode.to_string(),
                variant_classification: String::from("Missense_Mutation"),
                hgvsc: hgvsc.to_string(),
                ..Default::default()
            },
            sample_id: barcode.to_string(),
            source,
        }
    }

    #[test]
    fn merge_keeps_first_and_tracks_samples() {
        let calls = vec![
            call("GENE1", 100, "S2", "first", Source::Research),
            call("GENE1", 100, "S1", "second", Source::Clinical),
            call("GENE2", 200, "S1", "third", Source::Research),
        ];

        let union = super::merge_calls(calls);

        assert_eq!(union.len(), 2);
        assert_eq!(union[0].tumor_sample_barcode, "S2");
        assert_eq!(union[0].hgvsc, "first");
        assert_eq!(union[0].called_in, "S1;S2");
        assert_eq!(union[0].clinical, SIGNED_OUT);
        assert_eq!(union[1].called_in, "S1");
        assert_eq!(union[1].clinical, "");
    }

    #[test]
    fn parse_research_maf() -> Result<(), anyhow::Error> {
        let calls = super::parse_mutation_file(
            Path::new("tests/snvs/union/C-ABC123-L001-d01.maf"),
            Source::Research,
            None,
        )?;
        assert_eq!(
            calls
                .iter()
                .map(|c| c.record.hugo_symbol.as_str())
                .collect::<Vec<_>>(),
            vec!["TP53", "KRAS"]
        );
        Ok(())
    }

    #[test]
    fn parse_clinical_maf() -> Result<(), anyhow::Error> {
        let calls = super::parse_mutation_file(
            Path::new("tests/snvs/union/dmp_mutations.maf"),
            Source::Clinical,
            Some("P-0000001"),
        )?;
        assert_eq!(
            calls
                .iter()
                .map(|c| (c.record.hugo_symbol.as_str(), c.sample_id.as_str()))
                .collect::<Vec<_>>(),
            vec![("TP53", "P-0000001-T02-IM7"), ("EGFR", "P-0000001-T02-IM7")]
        );
        Ok(())
    }

    #[test]
    fn parse_missing_identity_columns_fails() {
        let result = super::parse_mutation_file(
            Path::new("tests/snvs/union/broken.maf"),
            Source::Research,
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn parse_maf_without_classification_fails() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let path = tmp_dir.join("no_classification.maf");
        std::fs::write(
            &path,
            "Hugo_Symbol\tChromosome\tStart_Position\tEnd_Position\tReference_Allele\t\
             Tumor_Seq_Allele2\tTumor_Sample_Barcode\n\
             TP53\t17\t7577120\t7577120\tC\tT\tC-ABC123-L001-d01\n",
        )?;

        let err = super::parse_mutation_file(&path, Source::Research, None)
            .expect_err("missing Variant_Classification must be rejected");
        assert!(err.to_string().contains("Variant_Classification"));

        Ok(())
    }

    #[test]
    #[tracing_test::traced_test]
    fn parse_missing_file_warns() -> Result<(), anyhow::Error> {
        let calls = super::parse_mutation_file(
            Path::new("tests/snvs/union/does-not-exist.maf"),
            Source::Research,
            None,
        )?;
        assert!(calls.is_empty());
        assert!(logs_contain("file not found"));
        Ok(())
    }

    #[test]
    fn run_smoke() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let args = super::Args {
            patient_json: PathBuf::from("tests/patient/C-ABC123_P-0000001_all_samples.json"),
            research_access_mutations_maf_template: String::from(
                "tests/snvs/union/{sample_id}.maf",
            ),
            dmp_mutations_file: PathBuf::from("tests/snvs/union/dmp_mutations.maf"),
            output: tmp_dir.join("union.maf"),
        };

        super::run(&crate::common::Args::default(), &args)?;

        let union: Vec<UnionRecord> = crate::common::io::read_records(
            tmp_dir.join("union.maf"),
            &crate::common::io::TableFormat::TSV,
        )?;
        assert_eq!(
            union
                .iter()
                .map(|r| (
                    r.hugo_symbol.as_str(),
                    r.start_position,
                    r.clinical.as_str(),
                    r.called_in.as_str()
                ))
                .collect::<Vec<_>>(),
            vec![
                (
                    "TP53",
                    7577120,
                    SIGNED_OUT,
                    "C-ABC123-L001-d01;P-0000001-T02-IM7"
                ),
                ("KRAS", 25398284, "", "C-ABC123-L001-d01"),
                ("EGFR", 55259515, SIGNED_OUT, "P-0000001-T02-IM7"),
            ]
        );

        Ok(())
    }
}
