//! Implementation of `bams genotyping-input` subcommand.

use std::path::PathBuf;

use crate::{
    bams::resolve_bam,
    common::io::{write_records, TableFormat},
    patient::{AssayType, PatientData, Sample, TumorNormal},
};

/// Command line arguments for `bams genotyping-input` subcommand.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Build the genotyping input table", long_about = None)]
pub struct Args {
    /// Path to the patient JSON.
    #[arg(long)]
    pub patient_json: PathBuf,
    /// Path to the union MAF that is to be genotyped.
    #[arg(long)]
    pub maf: PathBuf,
    /// Directory to write the output table to.
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Research ACCESS duplex BAM template.
    #[arg(long)]
    pub research_duplex_bam: String,
    /// Research ACCESS duplex BAM index template.
    #[arg(long)]
    pub research_duplex_bai: String,
    /// Research ACCESS simplex BAM template.
    #[arg(long)]
    pub research_simplex_bam: String,
    /// Research ACCESS simplex BAM index template.
    #[arg(long)]
    pub research_simplex_bai: String,

    /// Clinical ACCESS duplex BAM template.
    #[arg(long)]
    pub clinical_access_duplex_bam: String,
    /// Clinical ACCESS duplex BAM index template.
    #[arg(long)]
    pub clinical_duplex_bai: String,
    /// Clinical ACCESS simplex BAM template.
    #[arg(long)]
    pub clinical_simplex_bam: String,
    /// Clinical ACCESS simplex BAM index template.
    #[arg(long)]
    pub clinical_simplex_bai: String,

    /// Clinical IMPACT (and ACCESS normal) standard BAM template.
    #[arg(long)]
    pub impact_standard_bam: String,
    /// Clinical IMPACT (and ACCESS normal) standard BAM index template.
    #[arg(long)]
    pub impact_standard_bai: String,
}

/// One row of the genotyping input table.
#[derive(serde::Serialize, Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub sample_id: String,
    pub duplex_bam: String,
    pub duplex_bai: String,
    pub simplex_bam: String,
    pub simplex_bai: String,
    pub standard_bam: String,
    pub standard_bai: String,
    pub patient_id: String,
    pub maf: String,
}

/// Build the table row for one sample.
fn build_record(args: &Args, sample: &Sample, patient_id: &str, maf: &str) -> Record {
    let (duplex, simplex) = match (sample.assay_type, sample.tumor_normal) {
        (AssayType::ResearchAccess, _) => (
            Some((&args.research_duplex_bam, &args.research_duplex_bai)),
            Some((&args.research_simplex_bam, &args.research_simplex_bai)),
        ),
        (AssayType::ClinicalAccess, TumorNormal::Tumor) => (
            Some((&args.clinical_access_duplex_bam, &args.clinical_duplex_bai)),
            Some((&args.clinical_simplex_bam, &args.clinical_simplex_bai)),
        ),
        _ => (None, None),
    };
    let standard = match (sample.assay_type, sample.tumor_normal) {
        (AssayType::ClinicalAccess, TumorNormal::Normal) | (AssayType::ClinicalImpact, _) => {
            Some((&args.impact_standard_bam, &args.impact_standard_bai))
        }
        _ => None,
    };

    let resolve = |pair: Option<(&String, &String)>| match pair {
        Some((bam, bai)) => (resolve_bam(bam, sample), resolve_bam(bai, sample)),
        None => (String::new(), String::new()),
    };
    let (duplex_bam, duplex_bai) = resolve(duplex);
    let (simplex_bam, simplex_bai) = resolve(simplex);
    let (standard_bam, standard_bai) = resolve(standard);

    Record {
        sample_id: sample.sample_id.clone(),
        duplex_bam,
        duplex_bai,
        simplex_bam,
        simplex_bai,
        standard_bam,
        standard_bai,
        patient_id: patient_id.to_string(),
        maf: maf.to_string(),
    }
}

/// Build the genotyping input rows for all samples of `patient`.
pub fn build_table(args: &Args, patient: &PatientData) -> Vec<Record> {
    let maf = std::fs::canonicalize(&args.maf)
        .unwrap_or_else(|_| args.maf.clone())
        .to_string_lossy()
        .to_string();
    patient
        .samples
        .values()
        .map(|sample| build_record(args, sample, &patient.combined_id, &maf))
        .collect()
}

/// Main entry point for `bams genotyping-input` sub command.
pub fn run(common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", &common);
    tracing::info!("args = {:?}", &args);

    let patient = PatientData::load(&args.patient_json)?;
    let records = build_table(args, &patient);
    write_records(
        args.output_dir
            .join(format!("{}_genotyping_input.tsv", &patient.combined_id)),
        &TableFormat::TSV,
        &records,
    )?;

    Ok(())
}
