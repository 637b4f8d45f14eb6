//! Implementation of `msi call` subcommand.

use std::path::{Path, PathBuf};

use thousands::Separable;

use crate::{
    common::{
        de,
        io::{load_table, write_records, Table, TableFormat},
    },
    msi::MsiRecord,
    patient::{AssayType, PatientData, Sample},
};

/// Command line arguments for `msi call` subcommand.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Compile clinical and research MSI scores of a patient", long_about = None)]
pub struct Args {
    /// Path to the patient JSON.
    #[arg(long)]
    pub patient_json: PathBuf,
    /// Template of the research ACCESS MSI files; `{cmo_patient_id}` and
    /// `{sample_id}` are substituted.
    #[arg(long)]
    pub research_access_msi_template: String,
    /// Clinical ACCESS MSI file (comma separated).
    #[arg(long)]
    pub clinical_access_msi_file: PathBuf,
    /// Clinical IMPACT MSI file (tab separated, `#` comments).
    #[arg(long)]
    pub clinical_impact_msi_file: PathBuf,
    /// Path to the output CSV.
    #[arg(long)]
    pub output: PathBuf,
}

/// Where sample id, score and status live in one kind of MSI file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsiColumns {
    pub sample_id: &'static str,
    pub score: &'static str,
    pub status: &'static str,
}

impl MsiColumns {
    pub const RESEARCH_ACCESS: MsiColumns = MsiColumns {
        sample_id: "Tumor_Sample_ID",
        score: "Distance_from_boundary",
        status: "MSI_Status",
    };
    pub const CLINICAL_ACCESS: MsiColumns = MsiColumns {
        sample_id: "DMP_ASSAY_ID",
        score: "distance_from_boundary",
        status: "msi_status",
    };
    pub const CLINICAL_IMPACT: MsiColumns = MsiColumns {
        sample_id: "SAMPLE_ID",
        score: "MSI_SCORE",
        status: "MSI_TYPE",
    };

    fn required(&self) -> [&'static str; 3] {
        [self.sample_id, self.score, self.status]
    }
}

/// Scores of `table`; `sample_of` picks the sample metadata of a row's
/// sample id and rows without one are dropped.
pub fn scores_of<'a, F>(
    table: &Table,
    columns: &MsiColumns,
    patient: &PatientData,
    sample_of: F,
) -> Vec<MsiRecord>
where
    F: Fn(&str) -> Option<&'a Sample>,
{
    table
        .rows
        .iter()
        .filter_map(|row| {
            let sample_id = table.get_or_empty(row, columns.sample_id).trim();
            let sample = sample_of(sample_id)?;
            Some(MsiRecord {
                sample_id: sample_id.to_string(),
                patient_id: patient.combined_id.clone(),
                cmo_patient_id: patient.cmo_id.clone(),
                dmp_patient_id: patient.dmp_id.clone(),
                msi_score: de::parse_f64(table.get_or_empty(row, columns.score)),
                msi_status: table.get_or_empty(row, columns.status).trim().to_string(),
                source: Some(sample.assay_type.source()),
                assay: Some(sample.assay_type.assay()),
            })
        })
        .collect()
}

/// Scores of the research ACCESS tumor samples, one file per sample.
pub fn research_scores(template: &str, patient: &PatientData) -> Vec<MsiRecord> {
    let columns = MsiColumns::RESEARCH_ACCESS;
    let mut result = Vec::new();
    for sample in patient.research_access_tumors() {
        let path = template
            .replace("{cmo_patient_id}", &patient.cmo_id)
            .replace("{sample_id}", &sample.sample_id);
        if let Some(table) = load_table(&path, &TableFormat::TSV, &columns.required())
            .or_warn(&format!("MSI file of {}", &sample.sample_id))
        {
            // The file belongs to `sample`, whatever id its rows carry.
            result.append(&mut scores_of(&table, &columns, patient, |_| Some(sample)));
        }
    }
    result
}

/// Scores of a clinical file restricted to samples of `assay_type`.
pub fn clinical_scores(
    path: &Path,
    format: &TableFormat,
    columns: &MsiColumns,
    assay_type: AssayType,
    patient: &PatientData,
) -> Vec<MsiRecord> {
    if patient.dmp_id.is_empty() {
        return Vec::new();
    }
    match load_table(path, format, &columns.required()).or_warn(&format!("{} MSI file", assay_type))
    {
        Some(table) => scores_of(&table, columns, patient, |sample_id| {
            patient
                .samples
                .get(sample_id)
                .filter(|sample| sample.assay_type == assay_type)
        }),
        None => Vec::new(),
    }
}

/// Main entry point for `msi call` sub command.
pub fn run(common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", &common);
    tracing::info!("args = {:?}", &args);

    let patient = PatientData::load(&args.patient_json)?;

    let mut records = research_scores(&args.research_access_msi_template, &patient);
    records.append(&mut clinical_scores(
        &args.clinical_access_msi_file,
        &TableFormat::CSV,
        &MsiColumns::CLINICAL_ACCESS,
        AssayType::ClinicalAccess,
        &patient,
    ));
    records.append(&mut clinical_scores(
        &args.clinical_impact_msi_file,
        &TableFormat::TSV.with_comments(),
        &MsiColumns::CLINICAL_IMPACT,
        AssayType::ClinicalImpact,
        &patient,
    ));

    tracing::info!(
        "writing {} MSI scores to {:?}",
        records.len().separate_with_commas(),
        &args.output
    );
    write_records(&args.output, &TableFormat::CSV, &records)?;

    Ok(())
}
