//! Implementation of `svs call` subcommand.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use regex::Regex;
use thousands::Separable;

use crate::{
    common::{
        de,
        io::{load_table, write_records, Table, TableFormat},
        parse_list,
    },
    patient::{PatientData, Sample},
    snvs::SIGNED_OUT,
    strucvars::{short_sv_type, SvRecord},
};

/// Command line arguments for `svs call` subcommand.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Compile clinical and research SV calls of a patient", long_about = None)]
pub struct Args {
    /// Path to the patient JSON.
    #[arg(long)]
    pub patient_json: PathBuf,
    /// Template of the research ACCESS SV files; `{cmo_patient_id}` and
    /// `{sample_id}` are substituted.
    #[arg(long)]
    pub research_access_sv_template: String,
    /// Clinical SV file.
    #[arg(long)]
    pub clinical_sv_file: PathBuf,
    /// Genes covered by ACCESS SV calling, comma separated or `@file`.
    #[arg(long)]
    pub access_structural_variant_gene_list: String,
    /// Path to the output CSV.
    #[arg(long)]
    pub output: PathBuf,
}

/// Columns a research SV file must have.
pub const RESEARCH_COLUMNS: &[&str] = &[
    "TumorId",
    "SV_Type",
    "Gene1",
    "Gene2",
    "Chr1",
    "Pos1",
    "Chr2",
    "Pos2",
    "SplitReadSupport",
    "PairEndReadSupport",
    "TumorReadCount",
];

/// Pulls the gene pair out of fusion annotations like
/// `Protein Fusion: in frame {EML4:ALK}`.
#[derive(Debug, Clone)]
pub struct FusionParser {
    re: Regex,
}

impl FusionParser {
    pub fn new() -> Result<Self, anyhow::Error> {
        Ok(Self {
            re: Regex::new(r"\{([^:]+):([^}]+)\}")?,
        })
    }

    /// The `(gene1, gene2)` pair of `text`, if any.
    pub fn genes(&self, text: &str) -> Option<(String, String)> {
        let captures = self.re.captures(text.trim())?;
        Some((
            captures.get(1)?.as_str().trim().to_string(),
            captures.get(2)?.as_str().trim().to_string(),
        ))
    }
}

fn in_gene_list(gene_list: &HashSet<String>, gene1: &str, gene2: &str) -> bool {
    gene_list.contains(gene1) || gene_list.contains(gene2)
}

/// Research ACCESS SV calls of one tumor sample in the gene list.
pub fn sample_research_calls(
    table: &Table,
    sample: &Sample,
    gene_list: &HashSet<String>,
    fusions: &FusionParser,
) -> Vec<SvRecord> {
    table
        .rows
        .iter()
        .filter(|row| {
            in_gene_list(
                gene_list,
                table.get_or_empty(row, "Gene1"),
                table.get_or_empty(row, "Gene2"),
            )
        })
        .map(|row| {
            let info = table.get_or_empty(row, "Fusion").trim();
            let (gene1, gene2) = fusions.genes(info).unwrap_or_else(|| {
                (
                    table.get_or_empty(row, "Gene1").to_string(),
                    table.get_or_empty(row, "Gene2").to_string(),
                )
            });
            SvRecord {
                sample_id: table.get_or_empty(row, "TumorId").to_string(),
                sv_type: table.get_or_empty(row, "SV_Type").to_string(),
                gene1,
                gene2,
                chr1: de::normalize_chrom(table.get_or_empty(row, "Chr1")),
                pos1: de::parse_pos(table.get_or_empty(row, "Pos1")),
                chr2: de::normalize_chrom(table.get_or_empty(row, "Chr2")),
                pos2: de::parse_pos(table.get_or_empty(row, "Pos2")),
                split_read_count: de::parse_count(table.get_or_empty(row, "SplitReadSupport")),
                paired_read_count: de::parse_count(table.get_or_empty(row, "PairEndReadSupport")),
                total_read_count: de::parse_count(table.get_or_empty(row, "TumorReadCount")),
                info: info.to_string(),
                source: Some(sample.assay_type.source()),
                assay: Some(sample.assay_type.assay()),
                ..Default::default()
            }
        })
        .collect()
}

/// Research ACCESS SV calls of all research tumor samples.
pub fn research_calls(
    template: &str,
    patient: &PatientData,
    gene_list: &HashSet<String>,
    fusions: &FusionParser,
) -> Vec<SvRecord> {
    let mut result = Vec::new();
    for sample in patient.research_access_tumors() {
        let path = template
            .replace("{cmo_patient_id}", &patient.cmo_id)
            .replace("{sample_id}", &sample.sample_id);
        if let Some(table) = load_table(&path, &TableFormat::TSV, RESEARCH_COLUMNS)
            .or_warn(&format!("SV file of {}", &sample.sample_id))
        {
            result.append(&mut sample_research_calls(&table, sample, gene_list, fusions));
        }
    }
    tracing::debug!("{} research SV calls", result.len().separate_with_commas());
    result
}

/// Calls of the clinical SV file for clinical samples of the patient.
pub fn clinical_calls(
    path: &Path,
    patient: &PatientData,
    gene_list: &HashSet<String>,
) -> Vec<SvRecord> {
    let table = match load_table(path, &TableFormat::TSV, &["Sample_ID"]).or_warn("clinical SV file")
    {
        Some(table) => table,
        None => return Vec::new(),
    };

    let mut result = Vec::new();
    for row in &table.rows {
        let sample_id = table.get_or_empty(row, "Sample_ID").trim();
        let sample = match patient.clinical_samples().find(|s| s.sample_id == sample_id) {
            Some(sample) => sample,
            None => continue,
        };
        let gene1 = table.get_or_empty(row, "Site1_Hugo_Symbol");
        let gene2 = table.get_or_empty(row, "Site2_Hugo_Symbol");
        if !in_gene_list(gene_list, gene1, gene2) {
            continue;
        }
        result.push(SvRecord {
            sample_id: sample_id.to_string(),
            sv_type: short_sv_type(table.get_or_empty(row, "Class")),
            gene1: gene1.to_string(),
            gene2: gene2.to_string(),
            chr1: de::normalize_chrom(table.get_or_empty(row, "Site1_Chromosome")),
            pos1: de::parse_pos(table.get_or_empty(row, "Site1_Position")),
            chr2: de::normalize_chrom(table.get_or_empty(row, "Site2_Chromosome")),
            pos2: de::parse_pos(table.get_or_empty(row, "Site2_Position")),
            split_read_count: de::parse_count(table.get_or_empty(row, "Tumor_Split_Read_Count")),
            paired_read_count: de::parse_count(
                table.get_or_empty(row, "Tumor_Paired_End_Read_Count"),
            ),
            total_read_count: None,
            info: table.get_or_empty(row, "Event_Info").to_string(),
            source: Some(sample.assay_type.source()),
            assay: Some(sample.assay_type.assay()),
            ..Default::default()
        });
    }
    tracing::debug!("{} clinical SV calls", result.len().separate_with_commas());
    result
}

/// Fill the patient, `variant`, `vaf` and signed out columns and sort.
///
/// A call is signed out when its variant text occurs among `clinical`.
pub fn finalize(
    research: Vec<SvRecord>,
    clinical: Vec<SvRecord>,
    patient: &PatientData,
) -> Vec<SvRecord> {
    let mut records = research.into_iter().chain(clinical).collect::<Vec<_>>();
    for record in records.iter_mut() {
        record.patient_id = patient.combined_id.clone();
        record.cmo_patient_id = patient.cmo_id.clone();
        record.dmp_patient_id = patient.dmp_id.clone();
        record.variant = record.variant_name();
        record.vaf = record.supporting_fraction();
    }

    let clinical_variants = records
        .iter()
        .filter(|record| record.source == Some(crate::patient::Source::Clinical))
        .map(|record| record.variant.clone())
        .collect::<HashSet<_>>();
    for record in records.iter_mut() {
        let blank_genes = record.gene1.trim().is_empty() && record.gene2.trim().is_empty();
        if !blank_genes && clinical_variants.contains(&record.variant) {
            record.variant_clinical_status = SIGNED_OUT.to_string();
        }
    }

    records.sort_by_key(SvRecord::sort_key);
    records
}

/// Main entry point for `svs call` sub command.
pub fn run(common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", &common);
    tracing::info!("args = {:?}", &args);

    let patient = PatientData::load(&args.patient_json)?;
    let gene_list = parse_list(&args.access_structural_variant_gene_list)?
        .into_iter()
        .collect::<HashSet<_>>();
    let fusions = FusionParser::new()?;

    let research = research_calls(
        &args.research_access_sv_template,
        &patient,
        &gene_list,
        &fusions,
    );
    let clinical = clinical_calls(&args.clinical_sv_file, &patient, &gene_list);
    let records = finalize(research, clinical, &patient);
    tracing::info!(
        "writing {} SV calls to {:?}",
        records.len().separate_with_commas(),
        &args.output
    );
    write_records(&args.output, &TableFormat::CSV, &records)?;

    Ok(())
}
