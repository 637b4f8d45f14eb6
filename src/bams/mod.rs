//! BAM path inference from templates and the derived input tables.

pub mod biometrics_input;
pub mod genotyping;

use std::path::Path;

use crate::{
    common::{io::is_valid_path, MISSING_PATH},
    patient::{AssayType, Sample},
};

/// Substitute the sample's identifiers into a path `template`.
///
/// Research samples fill `{sample_id}`, `{cmo_patient_id}` and `{donor_id}`;
/// clinical samples fill `{anon_id}` and its first/second letter
/// `{anon_id_fl}`/`{anon_id_sl}`.  Placeholders not applicable to the sample
/// are replaced by the empty string.
pub fn fill_template(template: &str, sample: &Sample) -> String {
    let (sample_id, cmo_patient_id, donor_id, anon_id) =
        if sample.assay_type == AssayType::ResearchAccess {
            (
                sample.sample_id.clone(),
                sample.cmo_patient_id(),
                sample.donor_id.clone().unwrap_or_default(),
                String::new(),
            )
        } else {
            (
                String::new(),
                String::new(),
                String::new(),
                sample.anon_id.clone().unwrap_or_default(),
            )
        };
    let mut letters = anon_id.chars();
    let first = letters.next().map(String::from).unwrap_or_default();
    let second = letters.next().map(String::from).unwrap_or_default();

    template
        .replace("{sample_id}", &sample_id)
        .replace("{cmo_patient_id}", &cmo_patient_id)
        .replace("{donor_id}", &donor_id)
        .replace("{anon_id_fl}", &first)
        .replace("{anon_id_sl}", &second)
        .replace("{anon_id}", &anon_id)
}

/// Whether `path` exists and, for `.bam` paths, has an index, either
/// `x.bam.bai` or `x.bai`.  Other paths (index templates) only need to exist.
pub fn validate_bam(path: &str) -> bool {
    if !is_valid_path(path) {
        tracing::warn!("BAM file not found: {}", path);
        return false;
    }
    let stem = if let Some(stem) = path.strip_suffix(".bam") {
        stem
    } else {
        return true;
    };
    let bai_1 = format!("{}.bai", path);
    let bai_2 = format!("{}.bai", stem);
    if Path::new(&bai_1).is_file() || Path::new(&bai_2).is_file() {
        true
    } else {
        tracing::warn!("BAM index file (.bai) not found for: {}", path);
        false
    }
}

/// Resolve `template` for `sample` to a canonical path, or `MISSING_PATH`.
pub fn resolve_bam(template: &str, sample: &Sample) -> String {
    let path = fill_template(template, sample);
    if validate_bam(&path) {
        std::fs::canonicalize(&path)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or(path)
    } else {
        MISSING_PATH.to_string()
    }
}
