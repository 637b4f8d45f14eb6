//! Implementation of `samples infer` subcommand.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::{
    common::{self, io::read_lines},
    patient::{AssayType, PatientData, Sample, TumorNormal},
};

/// Command line arguments for `samples infer` subcommand.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Infer per-patient sample manifests", long_about = None)]
pub struct Args {
    /// CSV file with `cmo_patient_id`, `dmp_patient_id` and optional `sex` columns.
    #[arg(long)]
    pub id_mapping_file: PathBuf,
    /// Optional CSV file whose first column lists research samples to include.
    #[arg(long)]
    pub include_samples_file: Option<PathBuf>,
    /// Optional CSV file whose first column lists samples to exclude.
    #[arg(long)]
    pub exclude_samples_file: Option<PathBuf>,
    /// Key file of clinical ACCESS samples (sample id, anon id).
    #[arg(long)]
    pub clinical_access_key_file: PathBuf,
    /// Key file of clinical IMPACT samples (sample id, anon id).
    #[arg(long)]
    pub clinical_impact_key_file: PathBuf,
    /// Template of research BAM directories, e.g. `/data/{cmo_patient_id}/{sample_id}/current`.
    #[arg(long)]
    pub research_access_bam_dir_template: String,
    /// Regular expression following `{dmp_id}-` for clinical ACCESS samples.
    #[arg(long)]
    pub clinical_access_sample_regex_pattern: String,
    /// Regular expression following `{dmp_id}-` for clinical IMPACT samples.
    #[arg(long)]
    pub clinical_impact_sample_regex_pattern: String,
    /// Directory to write the `{combined_id}_all_samples.json` files to.
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
}

/// One row of the ID mapping file.
#[derive(serde::Deserialize, Debug, Clone, Default)]
struct IdMappingRecord {
    #[serde(default)]
    cmo_patient_id: String,
    #[serde(default)]
    dmp_patient_id: String,
    #[serde(default)]
    sex: Option<String>,
}

/// Combined id, `"{cmo}_{dmp}"` if both exist, else whichever exists.
pub fn combined_patient_id(cmo_id: &str, dmp_id: &str) -> String {
    match (cmo_id.is_empty(), dmp_id.is_empty()) {
        (false, false) => format!("{}_{}", cmo_id, dmp_id),
        (false, true) => cmo_id.to_string(),
        (true, false) => dmp_id.to_string(),
        (true, true) => String::new(),
    }
}

/// Read the ID mapping file into empty patient manifests.
fn load_id_mapping(path: &Path) -> Result<Vec<PatientData>, anyhow::Error> {
    let records: Vec<IdMappingRecord> =
        common::io::read_records(path, &common::io::TableFormat::CSV)?;
    Ok(records
        .into_iter()
        .filter_map(|record| {
            let cmo_id = record.cmo_patient_id.trim().to_string();
            let dmp_id = record.dmp_patient_id.trim().to_string();
            if cmo_id.is_empty() && dmp_id.is_empty() {
                None
            } else {
                Some(PatientData {
                    combined_id: combined_patient_id(&cmo_id, &dmp_id),
                    cmo_id,
                    dmp_id,
                    sex: record.sex.unwrap_or_default().trim().to_string(),
                    samples: IndexMap::new(),
                })
            }
        })
        .collect())
}

/// Sample ids from the first CSV column of `path` that belong to `patient_id`.
fn load_sample_list(path: Option<&Path>, patient_id: &str) -> Result<Vec<String>, anyhow::Error> {
    let path = if let Some(path) = path {
        path
    } else {
        return Ok(Vec::new());
    };
    let prefix = format!("{}-", patient_id);
    let mut result = Vec::new();
    for line in read_lines(path)
        .map_err(|e| anyhow::anyhow!("could not open sample list {:?}: {}", path, e))?
    {
        let line = line?;
        let sample_id = line.split(',').next().unwrap_or_default().trim();
        if !sample_id.is_empty() && sample_id.starts_with(&prefix) {
            result.push(sample_id.to_string());
        }
    }
    Ok(result)
}

/// Whether `dir` has a `current` sub directory with at least one BAM file.
fn is_valid_research_sample(dir: &Path) -> bool {
    let current = dir.join("current");
    if !current.is_dir() {
        tracing::debug!("{:?} missing current directory", dir);
        return false;
    }
    let has_bam = walkdir::WalkDir::new(&current)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .any(|entry| entry.file_name().to_string_lossy().ends_with(".bam"));
    if !has_bam {
        tracing::debug!("{:?} has no bam files in current directory", dir);
    }
    has_bam
}

/// Root of the research BAM directories of one patient.
fn research_bam_root(template: &str, cmo_id: &str) -> PathBuf {
    let root = template.split("/{sample_id}").next().unwrap_or(template);
    PathBuf::from(root.replace("{cmo_patient_id}", cmo_id))
}

/// Discover the research ACCESS samples of a patient, applying include/exclude lists.
fn find_research_samples(
    root: &Path,
    include: &[String],
    exclude: &[String],
) -> Result<Vec<String>, anyhow::Error> {
    let mut samples = Vec::new();
    if root.is_dir() {
        for entry in walkdir::WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry?;
            if entry.file_type().is_dir() && is_valid_research_sample(entry.path()) {
                samples.push(entry.file_name().to_string_lossy().to_string());
            }
        }
    } else {
        tracing::warn!("research BAM directory {:?} does not exist", root);
    }

    for sample in include {
        if !samples.contains(sample) {
            tracing::info!("Including sample {}", sample);
            samples.push(sample.clone());
        }
    }

    Ok(samples
        .into_iter()
        .filter(|sample| {
            let excluded = exclude.contains(sample);
            if excluded {
                tracing::info!("Excluded sample: {}", sample);
            }
            !excluded
        })
        .collect())
}

/// Search a clinical key file for samples of `dmp_id` matching `pattern`.
fn find_clinical_samples(
    key_file: &Path,
    assay_type: AssayType,
    dmp_id: &str,
    pattern: &str,
    exclude: &[String],
) -> Result<Vec<Sample>, anyhow::Error> {
    let re = regex::Regex::new(&format!("{}-{}", regex::escape(dmp_id), pattern))
        .map_err(|e| anyhow::anyhow!("invalid sample pattern {:?}: {}", pattern, e))?;
    let mut result = Vec::new();
    for line in read_lines(key_file)
        .map_err(|e| anyhow::anyhow!("could not open key file {:?}: {}", key_file, e))?
    {
        let line = line?;
        if !re.is_match(&line) {
            continue;
        }
        let mut cols = line.split(',').map(|s| s.trim());
        let (sample_id, anon_id) = match (cols.next(), cols.next()) {
            (Some(sample_id), Some(anon_id)) if !sample_id.is_empty() => (sample_id, anon_id),
            _ => {
                tracing::warn!("malformed line in key file {:?}: {:?}", key_file, &line);
                continue;
            }
        };
        if exclude.iter().any(|s| s == sample_id) {
            tracing::info!("Excluded sample: {}", sample_id);
            continue;
        }
        let anon_id = if sample_id.contains("-XS") {
            anon_id.strip_suffix("-standard").unwrap_or(anon_id)
        } else {
            anon_id
        };
        result.push(Sample {
            sample_id: sample_id.to_string(),
            tumor_normal: TumorNormal::infer(sample_id),
            assay_type,
            anon_id: Some(anon_id.to_string()),
            access_version: None,
            donor_id: None,
        });
    }
    Ok(result)
}

/// Collect the samples of one patient.
fn infer_patient(args: &Args, patient: &mut PatientData) -> Result<(), anyhow::Error> {
    if !patient.cmo_id.is_empty() {
        let include = load_sample_list(args.include_samples_file.as_deref(), &patient.cmo_id)?;
        let exclude = load_sample_list(args.exclude_samples_file.as_deref(), &patient.cmo_id)?;
        let root = research_bam_root(&args.research_access_bam_dir_template, &patient.cmo_id);
        for sample_id in find_research_samples(&root, &include, &exclude)? {
            patient.samples.insert(
                sample_id.clone(),
                Sample {
                    tumor_normal: TumorNormal::infer(&sample_id),
                    sample_id,
                    assay_type: AssayType::ResearchAccess,
                    anon_id: Some(String::from("NA")),
                    access_version: None,
                    donor_id: None,
                },
            );
        }
    }

    if !patient.dmp_id.is_empty() {
        let exclude = load_sample_list(args.exclude_samples_file.as_deref(), &patient.dmp_id)?;
        let sources = [
            (
                &args.clinical_access_key_file,
                AssayType::ClinicalAccess,
                &args.clinical_access_sample_regex_pattern,
            ),
            (
                &args.clinical_impact_key_file,
                AssayType::ClinicalImpact,
                &args.clinical_impact_sample_regex_pattern,
            ),
        ];
        for (key_file, assay_type, pattern) in sources {
            for sample in
                find_clinical_samples(key_file, assay_type, &patient.dmp_id, pattern, &exclude)?
            {
                patient.samples.insert(sample.sample_id.clone(), sample);
            }
        }
    }

    Ok(())
}

/// Main entry point for `samples infer` sub command.
pub fn run(common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", &common);
    tracing::info!("args = {:?}", &args);

    let patients = load_id_mapping(&args.id_mapping_file)?;
    if patients.is_empty() {
        tracing::warn!("No samples found in input file.");
    }

    for mut patient in patients {
        infer_patient(args, &mut patient)?;
        tracing::info!(
            "patient {} has {} samples",
            &patient.combined_id,
            patient.samples.len()
        );
        patient.save(
            args.output_dir
                .join(format!("{}_all_samples.json", &patient.combined_id)),
        )?;
    }

    Ok(())
}
