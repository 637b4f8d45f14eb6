//! Implementation of `bams biometrics-input` subcommand.

use std::path::PathBuf;

use crate::{
    bams::resolve_bam,
    common::io::{write_records, TableFormat},
    patient::{AssayType, PatientData},
};

/// Command line arguments for `bams biometrics-input` subcommand.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Build the biometrics input table", long_about = None)]
pub struct Args {
    /// Path to the patient JSON.
    #[arg(long)]
    pub patient_json: PathBuf,
    /// Directory to write the output table to.
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
    /// Standard BAM template for research ACCESS samples.
    #[arg(long)]
    pub research_access_standard_bam_template: String,
    /// Standard BAM template for clinical ACCESS samples.
    #[arg(long)]
    pub clinical_access_standard_bam_template: String,
    /// Standard BAM template for clinical IMPACT samples.
    #[arg(long)]
    pub clinical_impact_standard_bam_template: String,
}

/// One row of the biometrics input table.
#[derive(serde::Serialize, Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub sample_name: String,
    pub sample_group: String,
    pub sample_type: String,
    pub sample_sex: String,
    pub sample_bam: String,
}

/// Replace empty values by `NA`.
fn or_na(value: &str) -> String {
    if value.is_empty() {
        String::from("NA")
    } else {
        value.to_string()
    }
}

/// Build the biometrics input rows for all samples of `patient`.
pub fn build_table(args: &Args, patient: &PatientData) -> Vec<Record> {
    patient
        .samples
        .values()
        .map(|sample| {
            let template = match sample.assay_type {
                AssayType::ResearchAccess => &args.research_access_standard_bam_template,
                AssayType::ClinicalAccess => &args.clinical_access_standard_bam_template,
                AssayType::ClinicalImpact => &args.clinical_impact_standard_bam_template,
            };
            let sample_type = match sample.tumor_normal {
                crate::patient::TumorNormal::Tumor => "Tumor",
                crate::patient::TumorNormal::Normal => "Normal",
            };
            Record {
                sample_name: sample.sample_id.clone(),
                sample_group: or_na(&patient.combined_id),
                sample_type: sample_type.to_string(),
                sample_sex: or_na(&patient.sex),
                sample_bam: resolve_bam(template, sample),
            }
        })
        .collect()
}

/// Main entry point for `bams biometrics-input` sub command.
pub fn run(common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", &common);
    tracing::info!("args = {:?}", &args);

    let patient = PatientData::load(&args.patient_json)?;
    let records = build_table(args, &patient);
    write_records(
        args.output_dir
            .join(format!("{}.biometrics_input.csv", &patient.combined_id)),
        &TableFormat::CSV,
        &records,
    )?;

    Ok(())
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use pretty_assertions::assert_eq;

    use crate::{
        common::MISSING_PATH,
        patient::{PatientData, Sample},
    };

    fn args() -> super::Args {
        super::Args {
            patient_json: PathBuf::from("tests/patient/C-ABC123_P-0000001_all_samples.json"),
            output_dir: PathBuf::from("."),
            research_access_standard_bam_template: String::from(
                "tests/bams/research/{sample_id}-standard.bam",
            ),
            clinical_access_standard_bam_template: String::from(
                "tests/bams/clinical/{anon_id}-standard.bam",
            ),
            clinical_impact_standard_bam_template: String::from(
                "tests/bams/clinical/{anon_id}-standard.bam",
            ),
        }
    }

    #[test]
    fn build_table() -> Result<(), anyhow::Error> {
        let patient = PatientData::load("tests/patient/C-ABC123_P-0000001_all_samples.json")?;
        let records = super::build_table(&args(), &patient);

        assert_eq!(records.len(), 4);
        assert_eq!(records[0].sample_type, "Tumor");
        assert_eq!(records[0].sample_sex, "F");
        assert!(records[0]
            .sample_bam
            .ends_with("C-ABC123-L001-d01-standard.bam"));
        assert_eq!(records[1].sample_type, "Normal");
        assert_eq!(records[1].sample_bam, MISSING_PATH);
        assert_eq!(records[2].sample_bam, MISSING_PATH);
        assert!(records[3].sample_bam.ends_with("GhIjKl-standard.bam"));

        Ok(())
    }

    #[test]
    fn missing_sex_is_na() {
        let patient = PatientData {
            combined_id: String::from("P-0000001"),
            dmp_id: String::from("P-0000001"),
            samples: vec![(
                String::from("P-0000001-T02-IM7"),
                Sample {
                    sample_id: String::from("P-0000001-T02-IM7"),
                    tumor_normal: crate::patient::TumorNormal::Tumor,
                    assay_type: crate::patient::AssayType::ClinicalImpact,
                    anon_id: Some(String::from("GhIjKl")),
                    access_version: None,
                    donor_id: None,
                },
            )]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        let records = super::build_table(&args(), &patient);
        assert_eq!(records[0].sample_sex, "NA");
    }

    #[test]
    fn run_writes_csv() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let args = super::Args {
            output_dir: tmp_dir.to_path_buf(),
            ..args()
        };
        super::run(&crate::common::Args::default(), &args)?;

        let text = std::fs::read_to_string(tmp_dir.join("C-ABC123_P-0000001.biometrics_input.csv"))?;
        assert!(text.starts_with("sample_name,sample_group,sample_type,sample_sex,sample_bam\n"));
        assert_eq!(text.lines().count(), 5);

        Ok(())
    }
}
